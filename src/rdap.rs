//! RDAP (Registration Data Access Protocol) client.
//!
//! HTTPS lookup against the bootstrapped per-TLD base URL, flattened into
//! the same common record the WHOIS path produces.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config;
use crate::errors::LookupError;
use crate::record::{DomainInfo, LookupOutcome, LookupType};
use crate::tld_tables::RDAP_TLD_SERVERS;
use crate::whois_parser::normalize_date;

const DOMAIN_FREE_STATUS: &str = "free";

#[derive(Debug, Clone, Deserialize)]
struct RdapDomain {
    #[serde(rename = "ldhName")]
    ldh_name: Option<String>,
    status: Option<Vec<String>>,
    entities: Option<Vec<RdapEntity>>,
    events: Option<Vec<RdapEvent>>,
    #[serde(rename = "nameservers")]
    name_servers: Option<Vec<RdapNameserver>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RdapEntity {
    handle: Option<String>,
    roles: Option<Vec<String>>,
    #[serde(rename = "vcardArray")]
    vcard_array: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    event_action: Option<String>,
    #[serde(rename = "eventDate")]
    event_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RdapNameserver {
    #[serde(rename = "ldhName")]
    ldh_name: Option<String>,
}

/// Query the RDAP record for `domain` against the bootstrap server of `tld`.
pub async fn rdap_query(domain: &str, tld: &str, use_proxy: bool) -> LookupOutcome {
    debug!("Querying RDAP for domain: {}", domain);

    let mut info = DomainInfo {
        lookup_type: LookupType::Rdap,
        via_proxy: use_proxy,
        domain_name: domain.to_string(),
        ..DomainInfo::default()
    };

    let Some(&base) = RDAP_TLD_SERVERS.get(tld) else {
        return LookupOutcome::err(info, LookupError::NotSupportedTld(tld.to_string()));
    };

    let cfg = config::get();

    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.whois_timeout))
        .danger_accept_invalid_certs(true)
        .gzip(true);

    if use_proxy {
        let proxy_url = format!(
            "socks5h://{}:{}",
            cfg.socket_proxy_host, cfg.socket_proxy_port
        );
        let proxy = match reqwest::Proxy::all(&proxy_url) {
            Ok(proxy) if cfg.socket_proxy_auth => {
                proxy.basic_auth(&cfg.socket_proxy_user, &cfg.socket_proxy_password)
            }
            Ok(proxy) => proxy,
            Err(err) => {
                warn!("Failed to create proxy dialer: {}", err);
                return LookupOutcome::err(info, LookupError::ConnectToProxy(err.to_string()));
            }
        };
        builder = builder.proxy(proxy);
    }

    let client = match builder.build() {
        Ok(client) => client,
        Err(err) => {
            return LookupOutcome::err(info, LookupError::WhoisServerFailed(err.to_string()))
        }
    };

    let url = match Url::parse(base).and_then(|base| base.join(&format!("domain/{domain}"))) {
        Ok(url) => url,
        Err(err) => {
            return LookupOutcome::err(info, LookupError::WhoisServerFailed(err.to_string()))
        }
    };

    debug!("Querying RDAP server: {}", url);

    let response = match client
        .get(url)
        .header("Accept", "application/rdap+json, application/json")
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            debug!("Failed to query RDAP for domain {}: {}", domain, err);
            info.raw_response = err.to_string();
            let classified = if err.is_timeout() {
                LookupError::WhoisTimeout(err.to_string())
            } else if use_proxy && err.is_connect() {
                LookupError::ConnectToProxy(err.to_string())
            } else {
                LookupError::WhoisServerFailed(err.to_string())
            };
            return LookupOutcome::err(info, classified);
        }
    };

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return LookupOutcome::err(info, LookupError::WhoisNotFound(domain.to_string()));
    }
    if !status.is_success() {
        return LookupOutcome::err(
            info,
            LookupError::WhoisServerFailed(format!("RDAP server returned {status}")),
        );
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            return LookupOutcome::err(info, LookupError::WhoisServerFailed(err.to_string()))
        }
    };

    let domain_object: RdapDomain = match serde_json::from_str(&body) {
        Ok(object) => object,
        Err(err) => {
            info.raw_response = body;
            return LookupOutcome::err(
                info,
                LookupError::WhoisServerFailed(format!("unexpected RDAP response: {err}")),
            );
        }
    };

    let mut parsed = flatten_rdap(domain_object, domain);
    parsed.via_proxy = use_proxy;

    if let Some(err) = not_found_check(&parsed) {
        return LookupOutcome::err(parsed, err);
    }

    LookupOutcome::ok(parsed)
}

/// Flatten the RDAP domain object into the common record, synthesizing a
/// key:value plaintext rendering as the raw response for user display.
fn flatten_rdap(object: RdapDomain, domain: &str) -> DomainInfo {
    let mut info = DomainInfo {
        lookup_type: LookupType::Rdap,
        domain_name: object
            .ldh_name
            .map(|name| name.to_lowercase())
            .unwrap_or_else(|| domain.to_string()),
        ..DomainInfo::default()
    };

    info.domain_status = object.status.unwrap_or_default();

    if let Some(entities) = &object.entities {
        info.registrar = registrar_from_entities(entities);
    }

    for event in object.events.unwrap_or_default() {
        let (Some(action), Some(date)) = (event.event_action, event.event_date) else {
            continue;
        };
        match action.to_lowercase().as_str() {
            "registration" => info.creation_date = normalize_date(&date, None),
            "expiration" => info.expiry_date = normalize_date(&date, None),
            _ => {}
        }
    }

    for ns in object.name_servers.unwrap_or_default() {
        if let Some(name) = ns.ldh_name {
            info.name_server
                .push(name.trim_matches('.').to_lowercase());
        }
    }

    info.raw_response = whois_style_rendering(&info);
    info
}

/// The `fn` vcard property of the first entity holding the registrar role,
/// falling back to the entity handle.
fn registrar_from_entities(entities: &[RdapEntity]) -> String {
    for entity in entities {
        let roles = entity.roles.clone().unwrap_or_default();
        if !roles.iter().any(|role| role.to_lowercase() == "registrar") {
            continue;
        }

        if let Some(vcard) = &entity.vcard_array {
            if let Some(name) = vcard_fn(vcard) {
                return name;
            }
        }
        if let Some(handle) = &entity.handle {
            return handle.clone();
        }
    }
    String::new()
}

// vcardArray = ["vcard", [[name, params, type, value], ...]]
fn vcard_fn(vcard: &serde_json::Value) -> Option<String> {
    let properties = vcard.get(1)?.as_array()?;
    for property in properties {
        let items = property.as_array()?;
        if items.first()?.as_str()? == "fn" {
            return items.get(3)?.as_str().map(|s| s.to_string());
        }
    }
    None
}

fn whois_style_rendering(info: &DomainInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!("Domain Name: {}\n", info.domain_name));
    if !info.registrar.is_empty() {
        out.push_str(&format!("Registrar: {}\n", info.registrar));
    }
    for status in &info.domain_status {
        out.push_str(&format!("Domain Status: {status}\n"));
    }
    if !info.creation_date.is_empty() {
        out.push_str(&format!("Creation Date: {}\n", info.creation_date));
    }
    if !info.expiry_date.is_empty() {
        out.push_str(&format!("Expiry Date: {}\n", info.expiry_date));
    }
    for ns in &info.name_server {
        out.push_str(&format!("Name Server: {ns}\n"));
    }
    out
}

/// Some bootstrap servers answer 200 with a placeholder object for free
/// names instead of 404; both placeholder shapes classify as not-found.
fn not_found_check(info: &DomainInfo) -> Option<LookupError> {
    if info
        .domain_status
        .iter()
        .any(|status| status == DOMAIN_FREE_STATUS)
        && info.name_server.is_empty()
    {
        return Some(LookupError::WhoisNotFound(info.domain_name.clone()));
    }

    if info.registrar.is_empty()
        && info.creation_date.is_empty()
        && info.expiry_date.is_empty()
        && info.name_server.is_empty()
    {
        return Some(LookupError::WhoisNotFound(info.domain_name.clone()));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const RDAP_FIXTURE: &str = r#"{
        "objectClassName": "domain",
        "ldhName": "EXAMPLE.COM",
        "status": ["client delete prohibited", "client transfer prohibited"],
        "entities": [
            {
                "objectClassName": "entity",
                "handle": "376",
                "roles": ["registrar"],
                "vcardArray": ["vcard", [
                    ["version", {}, "text", "4.0"],
                    ["fn", {}, "text", "RESERVED-Internet Assigned Numbers Authority"]
                ]]
            }
        ],
        "events": [
            {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
            {"eventAction": "expiration", "eventDate": "2026-08-13T04:00:00Z"},
            {"eventAction": "last changed", "eventDate": "2025-08-14T07:01:34Z"}
        ],
        "nameservers": [
            {"objectClassName": "nameserver", "ldhName": "A.IANA-SERVERS.NET."},
            {"objectClassName": "nameserver", "ldhName": "B.IANA-SERVERS.NET"}
        ]
    }"#;

    #[test]
    fn flattens_the_domain_object_into_the_common_record() {
        let object: RdapDomain = serde_json::from_str(RDAP_FIXTURE).unwrap();
        let info = flatten_rdap(object, "example.com");

        assert_eq!(info.lookup_type, LookupType::Rdap);
        assert_eq!(info.domain_name, "example.com");
        assert_eq!(info.registrar, "RESERVED-Internet Assigned Numbers Authority");
        assert_eq!(info.creation_date, "1995-08-14 04:00:00");
        assert_eq!(info.expiry_date, "2026-08-13 04:00:00");
        assert_eq!(
            info.name_server,
            vec!["a.iana-servers.net", "b.iana-servers.net"]
        );
        assert_eq!(info.domain_status.len(), 2);
        assert!(info.raw_response.contains("Name Server: a.iana-servers.net"));
        assert!(not_found_check(&info).is_none());
    }

    #[test]
    fn registrar_falls_back_to_the_entity_handle() {
        let entities = vec![RdapEntity {
            handle: Some("R-42".into()),
            roles: Some(vec!["Registrar".into()]),
            vcard_array: None,
        }];
        assert_eq!(registrar_from_entities(&entities), "R-42");
    }

    #[test]
    fn free_status_without_nameservers_is_not_found() {
        let info = DomainInfo {
            lookup_type: LookupType::Rdap,
            domain_name: "free-example.top".into(),
            domain_status: vec!["free".into()],
            ..DomainInfo::default()
        };
        assert_eq!(
            not_found_check(&info),
            Some(LookupError::WhoisNotFound("free-example.top".into()))
        );
    }

    #[test]
    fn empty_object_is_not_found() {
        let info = DomainInfo {
            lookup_type: LookupType::Rdap,
            domain_name: "blank.example".into(),
            ..DomainInfo::default()
        };
        assert!(not_found_check(&info).is_some());
    }
}
