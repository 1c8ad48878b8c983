//! Per-domain lookup dispatch: pick a backend from `(queryType, tld)`,
//! apply the proxy TLD policy, and wrap registry lookups in linear-backoff
//! retry on the transient error classes.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error};

use crate::config::{self, Config};
use crate::custom_api::customize_lookup;
use crate::dns_resolver::ns_check;
use crate::domain_tools::{tld_and_suffix, trim_and_get_main_domain};
use crate::errors::LookupError;
use crate::rdap::rdap_query;
use crate::record::{DomainInfo, LookupOutcome, LookupType};
use crate::tld_tables::{rdap_supported, whois_supported};
use crate::whois::whois_query;

pub const WHOIS_QUERY: &str = "whoisQuery";
pub const WHOIS_QUERY_WITH_PROXY: &str = "whoisQueryWithProxy";
pub const DNS_QUERY: &str = "dnsQuery";
pub const MIXED_QUERY: &str = "mixedQuery";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    WhoisOrRdap { use_proxy: bool },
    Dns,
    Custom,
    NotSupported,
}

fn list_contains(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item == value)
}

fn registry_supported(tld: &str) -> bool {
    rdap_supported(tld) || whois_supported(tld)
}

/// The backend decision for `(query_type, tld, suffix)` under the current
/// configuration. Pure so the policy matrix is testable in isolation.
fn route(query_type: &str, tld: &str, suffix: &str, cfg: &Config) -> Route {
    match query_type {
        WHOIS_QUERY => {
            if !registry_supported(tld) {
                return Route::NotSupported;
            }
            let use_proxy = list_contains(&cfg.global_proxy_tlds, tld)
                || list_contains(&cfg.global_proxy_tlds, suffix);
            Route::WhoisOrRdap { use_proxy }
        }
        WHOIS_QUERY_WITH_PROXY => {
            if !registry_supported(tld) {
                return Route::NotSupported;
            }
            Route::WhoisOrRdap { use_proxy: true }
        }
        DNS_QUERY => Route::Dns,
        MIXED_QUERY => {
            // DNS wins over the proxy lists when a TLD appears in both.
            if list_contains(&cfg.mixed_dns_tlds, tld) || list_contains(&cfg.mixed_dns_tlds, suffix)
            {
                Route::Dns
            } else if !registry_supported(tld) {
                Route::Dns
            } else if list_contains(&cfg.mixed_proxy_tlds, tld)
                || list_contains(&cfg.mixed_proxy_tlds, suffix)
                || list_contains(&cfg.global_proxy_tlds, tld)
                || list_contains(&cfg.global_proxy_tlds, suffix)
            {
                Route::WhoisOrRdap { use_proxy: true }
            } else {
                Route::WhoisOrRdap { use_proxy: false }
            }
        }
        _ => Route::Custom,
    }
}

/// Dispatch one lookup. `query_type` is one of the four built-in modes or
/// the name of a configured custom API.
pub async fn lookup(domain: &str, query_type: &str) -> LookupOutcome {
    let err_info = DomainInfo {
        domain_name: domain.to_string(),
        ..DomainInfo::default()
    };

    let cfg = config::get();

    let (tld, suffix) = match tld_and_suffix(domain) {
        Ok(parts) => parts,
        Err(err) => {
            error!("Invalid domain name: {}", domain);
            return LookupOutcome::err(err_info, err);
        }
    };

    let main_domain = match trim_and_get_main_domain(domain) {
        Ok(main_domain) => main_domain,
        Err(err) => {
            error!("Invalid domain name: {}", domain);
            return LookupOutcome::err(err_info, err);
        }
    };

    let started = std::time::Instant::now();
    let outcome = match route(query_type, &tld, &suffix, &cfg) {
        Route::NotSupported => {
            error!("Not supported TLD: {}", tld);
            LookupOutcome::err(err_info, LookupError::NotSupportedTld(tld))
        }
        Route::Dns => ns_check(&main_domain).await,
        Route::WhoisOrRdap { use_proxy } => whois_or_rdap(&main_domain, &tld, use_proxy).await,
        Route::Custom => customize_lookup(&main_domain, query_type).await,
    };

    metrics::counter!("typoscout_lookup_total", "query_type" => query_type.to_string())
        .increment(1);
    metrics::histogram!("typoscout_lookup_duration_seconds")
        .record(started.elapsed().as_secs_f64());

    outcome
}

/// Registry lookup for a domain whose TLD is known to RDAP or WHOIS,
/// preferring RDAP. With `RetryOnTimeout` set, transient failures are
/// re-issued up to `RetryMax` times with linearly growing spacing.
pub async fn whois_or_rdap(domain: &str, tld: &str, use_proxy: bool) -> LookupOutcome {
    let cfg = config::get();

    if rdap_supported(tld) {
        let outcome = if cfg.retry_on_timeout {
            retry_lookup(cfg.retry_max, Duration::from_secs(cfg.retry_interval), || {
                rdap_query(domain, tld, use_proxy)
            })
            .await
        } else {
            rdap_query(domain, tld, use_proxy).await
        };
        debug!("RDAP query result for {}: {:?}", domain, outcome.error);
        outcome
    } else if whois_supported(tld) {
        let outcome = if cfg.retry_on_timeout {
            retry_lookup(cfg.retry_max, Duration::from_secs(cfg.retry_interval), || {
                whois_query(domain, tld, use_proxy)
            })
            .await
        } else {
            whois_query(domain, tld, use_proxy).await
        };
        debug!("WHOIS query result for {}: {:?}", domain, outcome.error);
        outcome
    } else {
        error!("No RDAP or WHOIS server known for TLD: {}", tld);
        let info = DomainInfo {
            lookup_type: LookupType::Whois,
            via_proxy: use_proxy,
            domain_name: domain.to_string(),
            ..DomainInfo::default()
        };
        LookupOutcome::err(info, LookupError::NoWhoisServerForTld(tld.to_string()))
    }
}

/// Re-issue `operation` on transient errors only, up to `retry_max` extra
/// attempts, sleeping `interval * n` before the n-th re-issue. Success and
/// non-transient errors short-circuit.
async fn retry_lookup<F, Fut>(retry_max: u32, interval: Duration, mut operation: F) -> LookupOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LookupOutcome>,
{
    let mut attempt: u32 = 0;
    loop {
        let outcome = operation().await;
        match &outcome.error {
            Some(err) if err.is_transient() && attempt < retry_max => {
                attempt += 1;
                debug!("Transient lookup error ({}), retry {}", err, attempt);
                tokio::time::sleep(interval * attempt).await;
            }
            _ => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn cfg_with(
        global_proxy: &[&str],
        mixed_proxy: &[&str],
        mixed_dns: &[&str],
    ) -> Config {
        Config {
            global_proxy_tlds: global_proxy.iter().map(|s| s.to_string()).collect(),
            mixed_proxy_tlds: mixed_proxy.iter().map(|s| s.to_string()).collect(),
            mixed_dns_tlds: mixed_dns.iter().map(|s| s.to_string()).collect(),
            ..Config::default()
        }
    }

    #[test]
    fn whois_query_requires_registry_support() {
        let cfg = cfg_with(&[], &[], &[]);
        assert_eq!(route(WHOIS_QUERY, "zz", "zz", &cfg), Route::NotSupported);
        assert_eq!(
            route(WHOIS_QUERY, "com", "com", &cfg),
            Route::WhoisOrRdap { use_proxy: false }
        );
    }

    #[test]
    fn global_proxy_tlds_force_the_proxy_by_tld_or_suffix() {
        let cfg = cfg_with(&["cn", "com.cn"], &[], &[]);
        assert_eq!(
            route(WHOIS_QUERY, "cn", "com.cn", &cfg),
            Route::WhoisOrRdap { use_proxy: true }
        );
        assert_eq!(
            route(WHOIS_QUERY, "com", "com", &cfg),
            Route::WhoisOrRdap { use_proxy: false }
        );
        assert_eq!(
            route(WHOIS_QUERY_WITH_PROXY, "com", "com", &cfg),
            Route::WhoisOrRdap { use_proxy: true }
        );
    }

    #[test]
    fn dns_query_never_rejects_unsupported_tlds() {
        // An unsupported TLD routes to DNS untouched, not to NotSupportedTld.
        let cfg = cfg_with(&[], &[], &[]);
        assert_eq!(route(DNS_QUERY, "test", "test", &cfg), Route::Dns);
        assert_eq!(route(DNS_QUERY, "com", "com", &cfg), Route::Dns);
    }

    #[test]
    fn mixed_query_precedence_is_dns_then_proxy_then_direct() {
        // A TLD listed for both DNS and proxy resolves via DNS.
        let cfg = cfg_with(&["uk"], &["de"], &["de", "cn"]);
        assert_eq!(route(MIXED_QUERY, "de", "de", &cfg), Route::Dns);
        assert_eq!(route(MIXED_QUERY, "cn", "cn", &cfg), Route::Dns);
        assert_eq!(
            route(MIXED_QUERY, "uk", "co.uk", &cfg),
            Route::WhoisOrRdap { use_proxy: true }
        );
        assert_eq!(
            route(MIXED_QUERY, "com", "com", &cfg),
            Route::WhoisOrRdap { use_proxy: false }
        );
        // Unsupported TLDs fall back to DNS before any proxy consideration.
        assert_eq!(route(MIXED_QUERY, "zz", "zz", &cfg), Route::Dns);
    }

    #[test]
    fn unknown_query_types_route_to_the_custom_backend() {
        let cfg = cfg_with(&[], &[], &[]);
        assert_eq!(route("someCustomApi", "com", "com", &cfg), Route::Custom);
    }

    fn transient_outcome(domain: &str) -> LookupOutcome {
        LookupOutcome::err(
            DomainInfo::default(),
            LookupError::WhoisTimeout(domain.to_string()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn retry_reissues_transient_errors_up_to_the_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = retry_lookup(2, Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { transient_outcome("example.com") }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(outcome.error, Some(LookupError::WhoisTimeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_returns_non_transient_errors_after_exactly_one_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = retry_lookup(5, Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                LookupOutcome::err(
                    DomainInfo::default(),
                    LookupError::WhoisNotFound("example.com".into()),
                )
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome.error, Some(LookupError::WhoisNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_short_circuits_on_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = retry_lookup(5, Duration::from_secs(1), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    transient_outcome("example.com")
                } else {
                    LookupOutcome::ok(DomainInfo::default())
                }
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn invalid_domains_fail_before_any_backend() {
        let outcome = lookup("not-a-domain", WHOIS_QUERY).await;
        assert!(matches!(
            outcome.error,
            Some(LookupError::InvalidDomainName(_))
        ));
    }
}
