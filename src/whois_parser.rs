//! Regex-driven extraction of the common lookup record from raw WHOIS text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::record::{DomainInfo, LookupType};
use crate::tld_tables::WhoisMatcher;

/// Canonical rendering of every normalized registry date.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, PartialEq, Eq)]
pub enum WhoisParseError {
    /// The registry answered with its "no such domain" phrasing.
    DomainNotFound,
    /// The body matched nothing at all: no registrar, no dates, no NS.
    NoDomainInfo,
}

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)(st|nd|rd|th)\b").expect("valid static regex"));

/// Apply a TLD matcher to a WHOIS response body.
///
/// `re_free` short-circuits to `DomainNotFound`; otherwise registrar, status
/// tokens, dates and nameservers are extracted field by field, each matcher
/// being optional per registry.
pub fn parse_whois_response(
    response: &str,
    domain: &str,
    matcher: &WhoisMatcher,
) -> Result<DomainInfo, WhoisParseError> {
    let mut info = DomainInfo {
        lookup_type: LookupType::Whois,
        domain_name: domain.to_string(),
        raw_response: response.to_string(),
        ..DomainInfo::default()
    };

    let body = response.replace("\r\n", "\n");

    if let Some(re_free) = &matcher.re_free {
        if re_free.is_match(&body) {
            return Err(WhoisParseError::DomainNotFound);
        }
    }

    if let Some(re_registrar) = &matcher.re_registrar {
        if let Some(captures) = re_registrar.captures(&body) {
            if let Some(registrar) = captures.get(1) {
                info.registrar = registrar.as_str().trim().to_string();
            }
        }
    }

    if let Some(re_status) = &matcher.re_domain_status {
        for captures in re_status.captures_iter(&body) {
            let Some(token) = captures.get(1) else { continue };
            let token = token.as_str().trim();
            if token.contains(',') {
                info.domain_status
                    .extend(token.split(',').map(|s| s.trim().to_string()));
            } else if token.contains("http") {
                // Registry status lines append the EPP reference URL.
                if let Some(left) = token.split("http").next() {
                    info.domain_status.push(left.trim().to_string());
                }
            } else if token.contains('-') {
                if let Some(left) = token.split('-').next() {
                    info.domain_status.push(left.trim().to_string());
                }
            } else {
                info.domain_status.push(token.to_string());
            }
        }
    }

    if let Some(re_creation) = &matcher.re_creation_date {
        if let Some(captures) = re_creation.captures(&body) {
            if let Some(value) = captures.get(1) {
                info.creation_date = normalize_date(
                    value.as_str(),
                    matcher.creation_layout.or(matcher.datetime_layout),
                );
            }
        }
    }

    if let Some(re_expiry) = &matcher.re_expiry_date {
        if let Some(captures) = re_expiry.captures(&body) {
            if let Some(value) = captures.get(1) {
                info.expiry_date = normalize_date(
                    value.as_str(),
                    matcher.expiry_layout.or(matcher.datetime_layout),
                );
            }
        }
    }

    if let Some(re_ns) = &matcher.re_name_server {
        for captures in re_ns.captures_iter(&body) {
            let Some(block) = captures.get(1) else { continue };
            for line in block.as_str().trim().split('\n') {
                // A capture may hold one host, a "host ip" atom list, or a
                // whole indented block of hosts.
                let host = line.trim().split_whitespace().next().unwrap_or("");
                if host.contains('.') {
                    info.name_server
                        .push(host.trim_matches('.').to_lowercase());
                }
            }
        }
    }

    if info.registrar.is_empty()
        && info.creation_date.is_empty()
        && info.expiry_date.is_empty()
        && info.name_server.is_empty()
    {
        return Err(WhoisParseError::NoDomainInfo);
    }

    Ok(info)
}

/// Normalize a captured registry date to the canonical UTC string. Ordinal
/// day suffixes are stripped first; the per-field layout wins over the
/// shared layout, which wins over best-effort parsing.
pub fn normalize_date(value: &str, layout: Option<&str>) -> String {
    let cleaned = ORDINAL_SUFFIX.replace_all(value.trim(), "$1").to_string();

    if let Some(layout) = layout {
        if let Some(parsed) = parse_with_layout(&cleaned, layout) {
            return parsed.format(DATE_TIME_FORMAT).to_string();
        }
    }

    if let Some(parsed) = auto_parse(&cleaned) {
        return parsed.format(DATE_TIME_FORMAT).to_string();
    }

    // Last resort for layouts like "2003-03-17 12:20:05 +0800 CST": drop the
    // timezone tail and retry.
    if let Some((head, _)) = cleaned.split_once('+') {
        if let Some(parsed) = auto_parse(head.trim()) {
            return parsed.format(DATE_TIME_FORMAT).to_string();
        }
    }

    String::new()
}

fn parse_with_layout(value: &str, layout: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, layout) {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(value, layout) {
        return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

fn auto_parse(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y.%m.%d %H:%M:%S",
        "%d-%b-%Y %H:%M:%S",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }

    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%d-%b-%Y",
        "%d %b %Y",
        "%d %B %Y",
        "%Y/%m/%d",
        "%Y.%m.%d",
        "%d.%m.%Y",
        "%Y%m%d",
    ];
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tld_tables::WHOIS_MATCHERS;

    const VERISIGN_TAKEN: &str = "   Domain Name: EXAMPLE.COM\r\n   Registrar: RESERVED-Internet Assigned Numbers Authority\r\n   Creation Date: 1995-08-14T04:00:00Z\r\n   Registry Expiry Date: 2026-08-13T04:00:00Z\r\n   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited\r\n   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited\r\n   Name Server: A.IANA-SERVERS.NET.\r\n   Name Server: B.IANA-SERVERS.NET\r\n";

    #[test]
    fn parses_a_verisign_taken_response() {
        let matcher = &WHOIS_MATCHERS["com"];
        let info = parse_whois_response(VERISIGN_TAKEN, "example.com", matcher).unwrap();

        assert_eq!(info.lookup_type, LookupType::Whois);
        assert_eq!(info.registrar, "RESERVED-Internet Assigned Numbers Authority");
        assert_eq!(info.creation_date, "1995-08-14 04:00:00");
        assert_eq!(info.expiry_date, "2026-08-13 04:00:00");
        assert_eq!(
            info.domain_status,
            vec!["clientDeleteProhibited", "clientTransferProhibited"]
        );
        assert_eq!(
            info.name_server,
            vec!["a.iana-servers.net", "b.iana-servers.net"]
        );
    }

    #[test]
    fn free_response_short_circuits() {
        let matcher = &WHOIS_MATCHERS["com"];
        let result = parse_whois_response(
            "No match for \"SURELY-FREE-EXAMPLE.COM\".\r\n>>> Last update of whois database <<<\r\n",
            "surely-free-example.com",
            matcher,
        );
        assert_eq!(result.unwrap_err(), WhoisParseError::DomainNotFound);
    }

    #[test]
    fn body_without_any_fields_is_a_parse_failure() {
        let matcher = &WHOIS_MATCHERS["com"];
        let result = parse_whois_response(
            "% This registry is feeling uncooperative today.\r\n",
            "example.com",
            matcher,
        );
        assert_eq!(result.unwrap_err(), WhoisParseError::NoDomainInfo);
    }

    #[test]
    fn comma_separated_status_tokens_are_split() {
        let matcher = &WHOIS_MATCHERS["ru"];
        let body = "domain: EXAMPLE.RU\nstate: REGISTERED, DELEGATED, VERIFIED\nnserver: ns1.example.ru.\ncreated: 2001-03-22T12:00:00Z\npaid-till: 2026-03-22T21:00:00Z\nregistrar: EXAMPLE-RU\n";
        let info = parse_whois_response(body, "example.ru", matcher).unwrap();
        assert_eq!(info.domain_status, vec!["REGISTERED", "DELEGATED", "VERIFIED"]);
    }

    #[test]
    fn nameserver_atom_lists_keep_only_the_host() {
        let matcher = &WHOIS_MATCHERS["ru"];
        let body = "nserver: ns1.example.ru. 192.0.2.1\nnserver: ns2.example.ru.\nregistrar: X\n";
        let info = parse_whois_response(body, "example.ru", matcher).unwrap();
        assert_eq!(info.name_server, vec!["ns1.example.ru", "ns2.example.ru"]);
    }

    #[test]
    fn uk_block_style_nameservers_are_split_per_line() {
        let matcher = &WHOIS_MATCHERS["uk"];
        let body = "    Domain name:\n        example.co.uk\n\n    Registrar:\n        Example Registrar Ltd\n\n    Registered on: 11-Feb-1996\n    Expiry date: 11-Feb-2027\n\n    Name servers:\n        ns1.example.net\n        ns2.example.net 192.0.2.53\n\n    WHOIS lookup made at 10:21:11 22-Jul-2025\n";
        let info = parse_whois_response(body, "example.co.uk", matcher).unwrap();
        assert_eq!(info.name_server, vec!["ns1.example.net", "ns2.example.net"]);
        assert_eq!(info.creation_date, "1996-02-11 00:00:00");
        assert_eq!(info.expiry_date, "2027-02-11 00:00:00");
    }

    #[test]
    fn ordinal_suffixes_are_stripped_before_parsing() {
        assert_eq!(normalize_date("14th August 1995", None), "1995-08-14 00:00:00");
        assert_eq!(normalize_date("1st May 2020", None), "2020-05-01 00:00:00");
    }

    #[test]
    fn timezone_tails_fall_back_to_the_plus_split() {
        assert_eq!(
            normalize_date("2003-03-17 12:20:05 +0800 CST", None),
            "2003-03-17 12:20:05"
        );
    }

    #[test]
    fn unparseable_dates_become_empty_strings() {
        assert_eq!(normalize_date("soon", None), "");
    }
}
