#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
#[cfg(feature = "server")]
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the lookup pipeline.
///
/// Classification happens at the lowest protocol layer (WHOIS socket, RDAP
/// HTTP client, DNS resolver, custom API client); the dispatcher and the
/// schedulers only branch on the variant, never on message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("not supported tld: {0}")]
    NotSupportedTld(String),

    #[error("no whois server for tld: {0}")]
    NoWhoisServerForTld(String),

    #[error("no parsing rule for tld: {0}")]
    NoParseRuleForTld(String),

    #[error("whois query timeout: {0}")]
    WhoisTimeout(String),

    #[error("whois server failed: {0}")]
    WhoisServerFailed(String),

    #[error("no content in whois response: {0}")]
    NoContentInWhoisResponse(String),

    #[error("parse whois response failed: {0}")]
    ParseWhoisResponse(String),

    #[error("whois not found: {0}")]
    WhoisNotFound(String),

    #[error("dns query timeout: {0}")]
    DnsTimeout(String),

    #[error("dns server failed: {0}")]
    DnsServerFailed(String),

    #[error("dns ns record not found: {0}")]
    NsNotFound(String),

    #[error("connect to proxy failed: {0}")]
    ConnectToProxy(String),

    #[error("invalid query type: {0}")]
    InvalidQueryType(String),

    #[error("invalid lookup type: {0}")]
    InvalidLookupType(String),

    #[error("customize api server response error: {0}")]
    CustomizeApiServerResponse(String),

    #[error("customize api whois result error: {0}")]
    CustomizeApiWhoisResult(String),
}

impl LookupError {
    /// The subset of error classes the dispatcher is allowed to re-issue on.
    /// Everything else propagates immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LookupError::ConnectToProxy(_)
                | LookupError::WhoisTimeout(_)
                | LookupError::WhoisServerFailed(_)
                | LookupError::NoContentInWhoisResponse(_)
        )
    }

    /// `WhoisNotFound` / `NsNotFound` are classified as the Free bucket by
    /// the schedulers, not as errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LookupError::WhoisNotFound(_) | LookupError::NsNotFound(_)
        )
    }

    /// Translate the taxonomy to the human surface string shown to clients.
    pub fn human_message(&self) -> &'static str {
        match self {
            LookupError::InvalidDomainName(_) => "域名无效",
            LookupError::WhoisTimeout(_) => "Whois查询超时",
            LookupError::NotSupportedTld(_) => "后缀不支持",
            LookupError::WhoisServerFailed(_) => "Whois查询失败",
            LookupError::ConnectToProxy(_) => "代理连接失败",
            LookupError::NoContentInWhoisResponse(_) => "Whois响应无内容",
            LookupError::NoParseRuleForTld(_) => "无法解析查询结果",
            LookupError::ParseWhoisResponse(_) => "解析Whois结果失败",
            LookupError::WhoisNotFound(_) => "域名未注册",
            LookupError::DnsTimeout(_) => "DNS查询超时",
            LookupError::DnsServerFailed(_) => "DNS服务器返回异常",
            LookupError::NsNotFound(_) => "没有NS记录",
            LookupError::InvalidQueryType(_) => "查询类型错误",
            LookupError::InvalidLookupType(_) => "查询类型错误",
            LookupError::NoWhoisServerForTld(_) => "没有Whois服务器",
            LookupError::CustomizeApiServerResponse(_) => "自定义Whois API服务器返回异常",
            LookupError::CustomizeApiWhoisResult(_) => "自定义Whois API结果解析错误",
        }
    }
}

/// Errors raised by the service outside the lookup pipeline: configuration,
/// durable store, authentication and request handling.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "server")]
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServiceError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServiceError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "status": "error",
            "message": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_set_is_exactly_four_classes() {
        assert!(LookupError::ConnectToProxy("x".into()).is_transient());
        assert!(LookupError::WhoisTimeout("x".into()).is_transient());
        assert!(LookupError::WhoisServerFailed("x".into()).is_transient());
        assert!(LookupError::NoContentInWhoisResponse("x".into()).is_transient());

        assert!(!LookupError::WhoisNotFound("x".into()).is_transient());
        assert!(!LookupError::NsNotFound("x".into()).is_transient());
        assert!(!LookupError::NotSupportedTld("x".into()).is_transient());
        assert!(!LookupError::ParseWhoisResponse("x".into()).is_transient());
        assert!(!LookupError::InvalidDomainName("x".into()).is_transient());
    }

    #[test]
    fn not_found_classes_map_to_free() {
        assert!(LookupError::WhoisNotFound("a.com".into()).is_not_found());
        assert!(LookupError::NsNotFound("a.com".into()).is_not_found());
        assert!(!LookupError::WhoisTimeout("a.com".into()).is_not_found());
    }

    #[test]
    fn every_class_has_a_human_message() {
        assert_eq!(
            LookupError::WhoisTimeout("x".into()).human_message(),
            "Whois查询超时"
        );
        assert_eq!(
            LookupError::NotSupportedTld("zz".into()).human_message(),
            "后缀不支持"
        );
    }
}
