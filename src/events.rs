//! Websocket protocol event names, shared by the socket surface and the
//! schedulers that broadcast frames.

// Client -> server
pub const EVENT_PING: &str = "ping";
pub const EVENT_ADMIN_AUTH: &str = "adminAuth";
pub const EVENT_BULK_CHECK_START: &str = "bulkCheckStart";
pub const EVENT_BULK_CHECK_PAUSE: &str = "bulkCheckPause";
pub const EVENT_BULK_CHECK_RESUME: &str = "bulkCheckResume";
pub const EVENT_BULK_CHECK_CANCEL: &str = "bulkCheckCancel";
pub const EVENT_BULK_CHECK_CLEAR: &str = "bulkCheckClear";
pub const EVENT_BULK_RECHECK_ERROR_DOMAINS: &str = "bulkRecheckErrorDomains";
pub const EVENT_WEB_CHECK: &str = "webCheck";
pub const EVENT_TYPO_CHECK: &str = "typoCheck";
pub const EVENT_REGISTER: &str = "register";

// Server -> client
pub const EVENT_PONG: &str = "pong";
pub const EVENT_BULK_CHECK_INFO: &str = "bulkCheckInfo";
pub const EVENT_BULK_CHECK_ERROR: &str = "bulkCheckError";
pub const EVENT_WEB_CHECK_DOMAINS: &str = "webCheckDomains";
pub const EVENT_WEB_CHECK_RESULT: &str = "webCheckResult";
pub const EVENT_WEB_CHECK_ERROR: &str = "webCheckError";
pub const EVENT_TYPO_RESULT: &str = "typoResult";
pub const EVENT_TYPO_CHECK_ERROR: &str = "typoCheckError";
pub const EVENT_REGISTER_RESULT: &str = "registerResult";
pub const EVENT_REGISTER_ERROR: &str = "registerError";

/// Render one protocol frame: `{"event": ..., "data": ...}`.
pub fn frame(event: &str, data: serde_json::Value) -> String {
    serde_json::json!({ "event": event, "data": data }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_event_and_data() {
        let frame = frame(EVENT_PONG, serde_json::Value::Null);
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "pong");
    }
}
