//! Domain string normalization and derivation helpers shared by the
//! dispatcher, the schedulers and the typo generators.

use crate::errors::LookupError;
use crate::record::{DomainStatus, QueryResult};
use crate::tld_tables::DOMAIN_SUFFIXES;

const STRIPPED_CHARS: &[char] = &[
    '~', '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '_', '+', '=', '[', ']', '{', '}',
    '\\', '|', ':', ';', '\'', '`', '<', '>', ',', '/', '?', '"',
];

/// Normalize a raw user-supplied domain string: strip whitespace and
/// punctuation, lowercase, trim stray dashes. Fails when nothing that looks
/// like a dotted name remains.
pub fn trim_domain(domain: &str) -> Result<String, LookupError> {
    if domain.is_empty() {
        return Err(LookupError::InvalidDomainName("empty domain".into()));
    }

    let cleaned: String = domain
        .chars()
        .filter(|c| !c.is_whitespace() && !STRIPPED_CHARS.contains(c))
        .collect();
    if cleaned.is_empty() {
        return Err(LookupError::InvalidDomainName(domain.to_string()));
    }

    let lowered = cleaned.to_lowercase();
    let trimmed = lowered.trim_matches('-');
    if trimmed.contains('.') {
        Ok(trimmed.to_string())
    } else {
        Err(LookupError::InvalidDomainName(domain.to_string()))
    }
}

/// Longest dot-joined suffix of `domain` present in the public-suffix set,
/// considering at most the rightmost three labels.
pub fn domain_suffix(domain: &str) -> Result<String, LookupError> {
    let parts: Vec<&str> = domain
        .split('.')
        .filter(|part| !part.is_empty())
        .collect();

    let max_len = parts.len().min(3);
    for n in (1..=max_len).rev() {
        let suffix = parts[parts.len() - n..].join(".");
        if DOMAIN_SUFFIXES.contains(suffix.as_str()) {
            return Ok(suffix);
        }
    }

    Err(LookupError::InvalidDomainName(format!(
        "domain suffix not found: {domain}"
    )))
}

/// The registrable part of a name: public suffix plus exactly one label to
/// its left. A bare suffix is invalid.
pub fn main_domain(domain: &str) -> Result<String, LookupError> {
    let suffix = domain_suffix(domain)?;
    if domain == suffix {
        return Err(LookupError::InvalidDomainName(domain.to_string()));
    }

    let prefix = domain
        .strip_suffix(suffix.as_str())
        .unwrap_or("")
        .trim_matches('.');
    if prefix.is_empty() {
        return Err(LookupError::InvalidDomainName(domain.to_string()));
    }

    let label = prefix.rsplit('.').next().unwrap_or(prefix);
    Ok(format!("{label}.{suffix}"))
}

/// Normalize then reduce to the registrable domain in one step.
pub fn trim_and_get_main_domain(raw: &str) -> Result<String, LookupError> {
    let trimmed = trim_domain(raw)?;
    main_domain(&trimmed)
}

/// `(tld, suffix)` for a domain: the public suffix and its rightmost label
/// (for `com.cn` the TLD is `cn`).
pub fn tld_and_suffix(domain: &str) -> Result<(String, String), LookupError> {
    let suffix = domain_suffix(domain)?;
    let tld = suffix
        .rsplit('.')
        .next()
        .unwrap_or(suffix.as_str())
        .to_string();
    Ok((tld, suffix))
}

/// First label of the registrable domain; empty when the name is invalid.
pub fn sld(domain: &str) -> String {
    match trim_and_get_main_domain(domain) {
        Ok(main) => main.split('.').next().unwrap_or("").to_string(),
        Err(_) => String::new(),
    }
}

/// The registrable slice of the first nameserver; empty when there is none
/// or it does not parse.
pub fn dns_lite(name_servers: &[String]) -> String {
    let Some(first) = name_servers.first() else {
        return String::new();
    };
    trim_and_get_main_domain(first.trim_matches('.')).unwrap_or_default()
}

/// Map raw registry status tokens to the human life-cycle state.
pub fn human_domain_status(raw_status: &[String]) -> DomainStatus {
    if raw_status.is_empty() {
        return DomainStatus::Unknown;
    }

    let normalized: Vec<String> = raw_status
        .iter()
        .map(|status| {
            status
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase()
        })
        .collect();

    if normalized.iter().any(|s| s == "registrarhold") {
        DomainStatus::Expired
    } else if normalized
        .iter()
        .any(|s| s == "pendingdelete" || s == "delegated")
    {
        DomainStatus::PendingDelete
    } else if normalized.iter().any(|s| s == "redemptionperiod") {
        DomainStatus::RedemptionPeriod
    } else {
        DomainStatus::Active
    }
}

/// Decode stored result JSON lines and sort ascending by original upload
/// position. Undecodable lines are skipped.
pub fn ordered_query_results(stored: &[String]) -> Vec<QueryResult> {
    let mut results: Vec<QueryResult> = stored
        .iter()
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::error!("Error decoding stored query result: {}", err);
                None
            }
        })
        .collect();

    results.sort_by_key(|result| result.order);
    results
}

/// Trim whitespace and surrounding dots from a user-supplied TLD list.
pub fn format_tlds(tlds: &[String]) -> Vec<String> {
    tlds.iter()
        .map(|tld| {
            tld.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .trim_matches('.')
                .to_string()
        })
        .filter(|tld| !tld.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_domain_strips_noise_and_lowercases() {
        assert_eq!(trim_domain("  eXample.COM  ").unwrap(), "example.com");
        assert_eq!(trim_domain("exa mple.com").unwrap(), "example.com");
        assert_eq!(trim_domain("(example).com").unwrap(), "example.com");
        assert!(trim_domain("").is_err());
        assert!(trim_domain("   ").is_err());
        assert!(trim_domain("nodots").is_err());
    }

    #[test]
    fn main_domain_reduces_to_suffix_plus_one() {
        assert_eq!(main_domain("example.com").unwrap(), "example.com");
        assert_eq!(main_domain("www.example.com").unwrap(), "example.com");
        assert_eq!(main_domain("a.b.example.co.uk").unwrap(), "example.co.uk");
        assert_eq!(main_domain("shop.example.com.cn").unwrap(), "example.com.cn");
        assert!(main_domain("com").is_err());
        assert!(main_domain("co.uk").is_err());
    }

    #[test]
    fn trim_and_get_main_domain_is_idempotent_and_case_insensitive() {
        for raw in ["Example.COM", "  eXample.com ", "www.EXAMPLE.com"] {
            let once = trim_and_get_main_domain(raw).unwrap();
            let twice = trim_and_get_main_domain(&once).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once, "example.com");
        }
    }

    #[test]
    fn tld_and_suffix_splits_multi_label_suffixes() {
        assert_eq!(
            tld_and_suffix("example.com").unwrap(),
            ("com".to_string(), "com".to_string())
        );
        assert_eq!(
            tld_and_suffix("example.com.cn").unwrap(),
            ("cn".to_string(), "com.cn".to_string())
        );
        assert!(tld_and_suffix("example.notatld").is_err());
    }

    #[test]
    fn dns_lite_takes_the_registrable_part_of_the_first_ns() {
        let ns = vec![
            "ns1.dns.example.net.".to_string(),
            "ns2.dns.example.net.".to_string(),
        ];
        assert_eq!(dns_lite(&ns), "example.net");
        assert_eq!(dns_lite(&[]), "");
    }

    #[test]
    fn human_status_mapping() {
        assert_eq!(human_domain_status(&[]), DomainStatus::Unknown);
        assert_eq!(
            human_domain_status(&["clientTransferProhibited".into()]),
            DomainStatus::Active
        );
        assert_eq!(
            human_domain_status(&["Redemption Period".into()]),
            DomainStatus::RedemptionPeriod
        );
        assert_eq!(
            human_domain_status(&["ok".into(), "pendingDelete".into()]),
            DomainStatus::PendingDelete
        );
        assert_eq!(
            human_domain_status(&["Registrar Hold".into()]),
            DomainStatus::Expired
        );
    }

    #[test]
    fn ordered_query_results_sorts_by_order_and_skips_garbage() {
        let stored = vec![
            r#"{"order":2,"domain":"b.com"}"#.to_string(),
            "not json".to_string(),
            r#"{"order":0,"domain":"a.com"}"#.to_string(),
            r#"{"order":1,"domain":"c.com"}"#.to_string(),
        ];
        let results = ordered_query_results(&stored);
        let domains: Vec<&str> = results.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, ["a.com", "c.com", "b.com"]);
    }

    #[test]
    fn format_tlds_trims_dots_and_whitespace() {
        let input = vec![" .com.".to_string(), "net ".to_string(), " ".to_string()];
        assert_eq!(format_tlds(&input), vec!["com", "net"]);
    }
}
