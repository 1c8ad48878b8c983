//! Common records produced by the lookup backends and consumed by the
//! schedulers, the websocket surface and the CSV export.

use serde::{Deserialize, Serialize};

use crate::errors::LookupError;

/// Which backend produced a record. Custom carries the configured API name
/// used as the query type; the empty custom value is the unclassified zero
/// state of a lookup that failed before backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LookupType {
    Whois,
    Rdap,
    Dns,
    Custom(String),
}

impl LookupType {
    pub fn as_str(&self) -> &str {
        match self {
            LookupType::Whois => "whois",
            LookupType::Rdap => "rdap",
            LookupType::Dns => "dns",
            LookupType::Custom(name) => name,
        }
    }

    /// WHOIS and RDAP results share one classification path.
    pub fn is_registry(&self) -> bool {
        matches!(self, LookupType::Whois | LookupType::Rdap)
    }
}

impl Default for LookupType {
    fn default() -> Self {
        LookupType::Custom(String::new())
    }
}

impl From<String> for LookupType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "whois" => LookupType::Whois,
            "rdap" => LookupType::Rdap,
            "dns" => LookupType::Dns,
            _ => LookupType::Custom(value),
        }
    }
}

impl From<LookupType> for String {
    fn from(value: LookupType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for LookupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized registration state across all four backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterStatus {
    Taken,
    Free,
    Error,
}

impl RegisterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterStatus::Taken => "Taken",
            RegisterStatus::Free => "Free",
            RegisterStatus::Error => "Error",
        }
    }
}

/// Human-readable life-cycle state derived from the raw registry status
/// tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainStatus {
    Active,
    Expired,
    RedemptionPeriod,
    PendingDelete,
    Unknown,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Active => "Active",
            DomainStatus::Expired => "Expired",
            DomainStatus::RedemptionPeriod => "RedemptionPeriod",
            DomainStatus::PendingDelete => "PendingDelete",
            DomainStatus::Unknown => "Unknown",
        }
    }
}

/// The common lookup record produced by the WHOIS, RDAP, DNS and custom
/// backends before classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DomainInfo {
    pub lookup_type: LookupType,
    pub via_proxy: bool,
    pub domain_name: String,
    pub registrar: String,
    pub domain_status: Vec<String>,
    pub creation_date: String,
    pub expiry_date: String,
    pub name_server: Vec<String>,
    pub raw_response: String,
    pub customized_result: Option<RegisterStatus>,
}

/// A lookup always yields the (possibly partial) record: the raw response
/// and routing facts stay attached even when the query failed, so the
/// classifiers and the web surface can show them.
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    pub info: DomainInfo,
    pub error: Option<LookupError>,
}

impl LookupOutcome {
    pub fn ok(info: DomainInfo) -> Self {
        Self { info, error: None }
    }

    pub fn err(info: DomainInfo, error: LookupError) -> Self {
        Self {
            info,
            error: Some(error),
        }
    }
}

/// Post-classification record stored in the durable result lists and
/// broadcast over the websocket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResult {
    pub order: usize,
    pub domain: String,
    pub lookup_type: LookupType,
    pub via_proxy: bool,
    pub query_error: String,
    pub register_status: Option<RegisterStatus>,
    pub created_date: String,
    pub expiry_date: String,
    pub name_server: Vec<String>,
    pub dns_lite: String,
    pub raw_domain_status: Vec<String>,
    pub domain_status: Option<DomainStatus>,
    pub raw_response: String,
}

/// Entry of the bulk pending hash, keyed by domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PendingDomain {
    pub domain: String,
    pub order: usize,
}

/// Result of a registrar API call for one domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterInfo {
    pub register_type: String,
    pub domain_name: String,
    pub register_status: String,
    pub raw_response: String,
}

pub const REGISTER_STATUS_SUCCESS: &str = "success";
pub const REGISTER_STATUS_FAILED: &str = "failed";
pub const REGISTER_STATUS_ERROR: &str = "error";

/// Life cycle of the bulk check task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkStatus {
    Idle,
    Init,
    Uniquing,
    Running,
    Paused,
    Done,
    Canceled,
    Error,
}

impl BulkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkStatus::Idle => "idle",
            BulkStatus::Init => "init",
            BulkStatus::Uniquing => "uniquing",
            BulkStatus::Running => "running",
            BulkStatus::Paused => "paused",
            BulkStatus::Done => "done",
            BulkStatus::Canceled => "canceled",
            BulkStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(BulkStatus::Idle),
            "init" => Some(BulkStatus::Init),
            "uniquing" => Some(BulkStatus::Uniquing),
            "running" => Some(BulkStatus::Running),
            "paused" => Some(BulkStatus::Paused),
            "done" => Some(BulkStatus::Done),
            "canceled" => Some(BulkStatus::Canceled),
            "error" => Some(BulkStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for BulkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_type_round_trips_through_strings() {
        for (ty, s) in [
            (LookupType::Whois, "\"whois\""),
            (LookupType::Rdap, "\"rdap\""),
            (LookupType::Dns, "\"dns\""),
            (LookupType::Custom("myApi".into()), "\"myApi\""),
        ] {
            assert_eq!(serde_json::to_string(&ty).unwrap(), s);
            assert_eq!(serde_json::from_str::<LookupType>(s).unwrap(), ty);
        }
    }

    #[test]
    fn query_result_json_round_trip_is_structurally_equal() {
        let result = QueryResult {
            order: 7,
            domain: "example.com".into(),
            lookup_type: LookupType::Rdap,
            via_proxy: true,
            register_status: Some(RegisterStatus::Taken),
            created_date: "1995-08-14 04:00:00".into(),
            expiry_date: "2026-08-13 04:00:00".into(),
            name_server: vec!["a.iana-servers.net".into(), "b.iana-servers.net".into()],
            dns_lite: "iana-servers.net".into(),
            raw_domain_status: vec!["client delete prohibited".into()],
            domain_status: Some(DomainStatus::Active),
            ..Default::default()
        };

        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: QueryResult = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.order, result.order);
        assert_eq!(decoded.domain, result.domain);
        assert_eq!(decoded.lookup_type, result.lookup_type);
        assert_eq!(decoded.register_status, result.register_status);
        assert_eq!(decoded.name_server, result.name_server);
        assert_eq!(decoded.domain_status, result.domain_status);
        assert_eq!(serde_json::to_string(&decoded).unwrap(), encoded);
    }

    #[test]
    fn pending_domain_uses_pascal_case_fields() {
        let entry = PendingDomain {
            domain: "example.com".into(),
            order: 3,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"Domain":"example.com","Order":3}"#);
    }

    #[test]
    fn bulk_status_string_forms_are_stable() {
        for status in [
            BulkStatus::Idle,
            BulkStatus::Init,
            BulkStatus::Uniquing,
            BulkStatus::Running,
            BulkStatus::Paused,
            BulkStatus::Done,
            BulkStatus::Canceled,
            BulkStatus::Error,
        ] {
            assert_eq!(BulkStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BulkStatus::parse("bogus"), None);
    }
}
