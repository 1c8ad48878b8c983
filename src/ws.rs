//! Websocket surface: one JSON frame protocol (`{event, data}`) covering
//! the bulk check controls, ad-hoc web checks, typo generation and domain
//! registration. Admin events require a valid token, supplied either as the
//! upgrade request's `token` query parameter or via a later `adminAuth`
//! frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::AppState;
use crate::auth;
use crate::domain_tools::trim_and_get_main_domain;
use crate::events;
use crate::register_task::RegisterTask;
use crate::typo::{self, TypoGenerator};
use crate::web_check::WebCheckTask;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const ACCESS_DENIED_BULK: &str = "拒绝访问批量任务, 请先登录";
const ACCESS_DENIED_TYPO: &str = "拒绝访问拼写检查任务, 请先登录";
const ACCESS_DENIED_REGISTER: &str = "拒绝访问注册任务, 请先登录";

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WebCheckRequest {
    #[serde(rename = "queryType")]
    query_type: String,
    #[serde(default)]
    domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BulkCheckStartRequest {
    #[serde(rename = "queryType")]
    query_type: String,
}

#[derive(Debug, Deserialize)]
struct TypoCheckRequest {
    domain: String,
    #[serde(rename = "typoType", default)]
    typo_type: Vec<String>,
    #[serde(rename = "ccTlds", default)]
    cc_tlds: Vec<String>,
    #[serde(rename = "queryType")]
    query_type: String,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(rename = "registerType")]
    register_type: String,
    #[serde(default)]
    domains: Vec<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

struct Session {
    id: u64,
    is_admin: bool,
    sender: mpsc::UnboundedSender<String>,
    state: AppState,
    web_check: Option<Arc<WebCheckTask>>,
    register: Option<Arc<RegisterTask>>,
}

async fn handle_socket(socket: WebSocket, state: AppState, token: Option<String>) {
    let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);

    let is_admin = token
        .as_deref()
        .map(auth::validate_token)
        .unwrap_or(false);

    if is_admin {
        info!("Admin user connected. ID: {}", id);
    } else {
        info!("Public user connected. ID: {}", id);
    }

    let (sender, mut outbound) = mpsc::unbounded_channel::<String>();
    let (mut ws_sink, mut ws_stream) = socket.split();

    // One writer task per connection drains the outbound frame channel.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if ws_sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session {
        id,
        is_admin,
        sender,
        state,
        web_check: None,
        register: None,
    };

    if session.is_admin {
        session
            .state
            .scheduler
            .clone()
            .add_subscriber(id, session.sender.clone());
    }

    while let Some(message) = ws_stream.next().await {
        match message {
            Ok(Message::Text(text)) => session.handle_frame(&text).await,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // Disconnect: drop the subscription and stop the session tasks.
    if session.is_admin {
        info!("Admin user disconnected. ID: {}", id);
        session.state.scheduler.remove_subscriber(id);
    } else {
        info!("Public user disconnected. ID: {}", id);
    }
    if let Some(task) = &session.web_check {
        info!("Stop web check task for user {}", id);
        task.stop();
    }
    if let Some(task) = &session.register {
        info!("Stop register task for user {}", id);
        task.stop();
    }
    writer.abort();
}

impl Session {
    fn emit(&self, event: &str, data: serde_json::Value) {
        let _ = self.sender.send(events::frame(event, data));
    }

    fn emit_error(&self, event: &str, message: &str) {
        self.emit(event, serde_json::Value::String(message.to_string()));
    }

    async fn handle_frame(&mut self, text: &str) {
        debug!("New message from user {} is: {}", self.id, text);

        let frame: MessageFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Error decoding websocket message from user {}: {}", self.id, err);
                return;
            }
        };

        if frame.event.is_empty() {
            error!("Invalid websocket message from user {}", self.id);
            return;
        }

        match frame.event.as_str() {
            events::EVENT_PING => self.on_ping(),
            events::EVENT_ADMIN_AUTH => self.on_admin_auth(&frame.data),
            events::EVENT_BULK_CHECK_START => self.on_bulk_check_start(&frame.data).await,
            events::EVENT_BULK_CHECK_PAUSE => self.on_bulk_check_pause().await,
            events::EVENT_BULK_CHECK_RESUME => self.on_bulk_check_resume(),
            events::EVENT_BULK_CHECK_CANCEL => self.on_bulk_check_cancel().await,
            events::EVENT_BULK_CHECK_CLEAR => self.on_bulk_check_clear().await,
            events::EVENT_BULK_RECHECK_ERROR_DOMAINS => self.on_bulk_recheck().await,
            events::EVENT_WEB_CHECK => self.on_web_check(&frame.data),
            events::EVENT_TYPO_CHECK => self.on_typo_check(&frame.data),
            events::EVENT_REGISTER => self.on_register(&frame.data),
            other => debug!("Unhandled websocket event '{}' from user {}", other, self.id),
        }
    }

    fn on_ping(&self) {
        debug!("New ping message from user {}", self.id);
        self.emit(events::EVENT_PONG, serde_json::Value::Null);
    }

    fn on_admin_auth(&mut self, data: &serde_json::Value) {
        info!("Admin auth message from user {}", self.id);

        // The token arrives as a raw quoted JSON scalar.
        let token = data
            .as_str()
            .map(|token| token.to_string())
            .unwrap_or_else(|| data.to_string().trim_matches('"').to_string());

        if auth::validate_token(&token) {
            self.is_admin = true;
            self.state
                .scheduler
                .clone()
                .add_subscriber(self.id, self.sender.clone());
            info!("Valid token from user {}, and now as admin", self.id);
        } else {
            warn!("Invalid token from user {}", self.id);
        }
    }

    async fn on_bulk_check_start(&self, data: &serde_json::Value) {
        if !self.is_admin {
            warn!("Public user {} not allowed to start bulk check task", self.id);
            self.emit_error(events::EVENT_WEB_CHECK_ERROR, ACCESS_DENIED_BULK);
            return;
        }

        info!("Admin user {} start bulk check task", self.id);

        let request: BulkCheckStartRequest = match serde_json::from_value(data.clone()) {
            Ok(request) => request,
            Err(err) => {
                warn!("Error decoding bulk check start message from user {}: {}", self.id, err);
                self.emit_error(events::EVENT_BULK_CHECK_ERROR, &format!("出现错误: {err}"));
                return;
            }
        };

        if let Err(err) = self
            .state
            .scheduler
            .set_query_type(&request.query_type)
            .await
        {
            warn!("Error setting bulk check query type for user {}: {}", self.id, err);
            self.emit_error(events::EVENT_BULK_CHECK_ERROR, &format!("出现错误: {err}"));
            return;
        }

        let scheduler = self.state.scheduler.clone();
        tokio::spawn(async move {
            scheduler.create_task().await;
        });
    }

    async fn on_bulk_check_pause(&self) {
        if !self.is_admin {
            warn!("Public user {} not allowed to pause bulk check task", self.id);
            self.emit_error(events::EVENT_WEB_CHECK_ERROR, ACCESS_DENIED_BULK);
            return;
        }
        info!("Admin user {} pause bulk check task", self.id);
        self.state.scheduler.pause().await;
    }

    fn on_bulk_check_resume(&self) {
        if !self.is_admin {
            warn!("Public user {} not allowed to resume bulk check task", self.id);
            self.emit_error(events::EVENT_WEB_CHECK_ERROR, ACCESS_DENIED_BULK);
            return;
        }
        info!("Admin user {} resume bulk check task", self.id);
        self.state.scheduler.clone().resume();
    }

    async fn on_bulk_check_cancel(&self) {
        if !self.is_admin {
            warn!("Public user {} not allowed to cancel bulk check task", self.id);
            self.emit_error(events::EVENT_WEB_CHECK_ERROR, ACCESS_DENIED_BULK);
            return;
        }
        info!("Admin user {} cancel bulk check task", self.id);
        self.state.scheduler.cancel_task().await;
    }

    async fn on_bulk_check_clear(&self) {
        if !self.is_admin {
            warn!("Public user {} not allowed to clear bulk check task", self.id);
            self.emit_error(events::EVENT_WEB_CHECK_ERROR, ACCESS_DENIED_BULK);
            return;
        }
        info!("Admin user {} clear bulk check task", self.id);
        self.state.scheduler.clear().await;
    }

    async fn on_bulk_recheck(&self) {
        if !self.is_admin {
            warn!(
                "Public user {} not allowed to requery bulk check error domains",
                self.id
            );
            self.emit_error(events::EVENT_WEB_CHECK_ERROR, ACCESS_DENIED_BULK);
            return;
        }
        info!("Admin user {} requery bulk check task error domains", self.id);
        self.state.scheduler.clone().recheck_error_domains().await;
    }

    fn on_web_check(&mut self, data: &serde_json::Value) {
        debug!("Web check message from user {}", self.id);

        let request: WebCheckRequest = match serde_json::from_value(data.clone()) {
            Ok(request) => request,
            Err(err) => {
                warn!("Error decoding web check message from user {}: {}", self.id, err);
                return;
            }
        };

        let unique_domains = normalize_unique(&request.domains);

        self.emit(events::EVENT_WEB_CHECK_DOMAINS, json!(unique_domains));

        self.start_web_check(unique_domains, request.query_type);
    }

    fn on_typo_check(&mut self, data: &serde_json::Value) {
        if !self.is_admin {
            warn!("Public user {} not allowed to request typo check", self.id);
            self.emit_error(events::EVENT_TYPO_CHECK_ERROR, ACCESS_DENIED_TYPO);
            return;
        }

        info!("Admin user {} request typo check", self.id);

        let request: TypoCheckRequest = match serde_json::from_value(data.clone()) {
            Ok(request) => request,
            Err(err) => {
                warn!("Error decoding typo check message from user {}: {}", self.id, err);
                self.emit_error(events::EVENT_TYPO_CHECK_ERROR, "服务端错误, 格式化请求数据失败");
                return;
            }
        };

        let main_domain = match trim_and_get_main_domain(&request.domain) {
            Ok(main_domain) => main_domain,
            Err(err) => {
                error!(
                    "Error getting main domain for typo check domain {}: {}",
                    request.domain, err
                );
                self.emit_error(events::EVENT_TYPO_CHECK_ERROR, "域名格式错误，请重新输入");
                return;
            }
        };

        let generator = TypoGenerator::new(&main_domain);
        let mut all_typo_domains: Vec<String> = Vec::new();

        for typo_type in &request.typo_type {
            let domains = match typo_type.as_str() {
                typo::TYPO_TYPE_WWW => generator.www(),
                typo::TYPO_TYPE_SKIP_LETTER => generator.skip_letter(),
                typo::TYPO_TYPE_DOUBLE_LETTER => generator.double_letter(),
                typo::TYPO_TYPE_REVERSE_LETTER => generator.reverse_letter(),
                typo::TYPO_TYPE_INSERTED_LETTER => generator.inserted_letter(),
                typo::TYPO_TYPE_WRONG_HORIZONTAL_KEY => generator.wrong_horizontal_key(),
                typo::TYPO_TYPE_WRONG_VERTICAL_KEY => generator.wrong_vertical_key(),
                typo::TYPO_TYPE_CUSTOMIZED_REPLACE => generator.customized_replace(),
                _ => Vec::new(),
            };

            if !domains.is_empty() {
                all_typo_domains.extend(domains.iter().cloned());
                self.emit(
                    events::EVENT_TYPO_RESULT,
                    json!({ "typoType": typo_type, "domains": domains }),
                );
            }
        }

        if !request.cc_tlds.is_empty() {
            let domains = generator.wrong_tlds(&request.cc_tlds);
            if !domains.is_empty() {
                all_typo_domains.extend(domains.iter().cloned());
                self.emit(
                    events::EVENT_TYPO_RESULT,
                    json!({ "typoType": typo::TYPO_TYPE_WRONG_TLDS, "domains": domains }),
                );
            }
        }

        if !all_typo_domains.is_empty() {
            let unique_domains = dedup_preserving_order(all_typo_domains);
            self.start_web_check(unique_domains, request.query_type);
        }
    }

    fn on_register(&mut self, data: &serde_json::Value) {
        if !self.is_admin {
            warn!("Public user {} not allowed to request register domains", self.id);
            self.emit_error(events::EVENT_REGISTER_ERROR, ACCESS_DENIED_REGISTER);
            return;
        }

        info!("Admin user {} request register domains", self.id);

        let request: RegisterRequest = match serde_json::from_value(data.clone()) {
            Ok(request) => request,
            Err(err) => {
                warn!("Error decoding register message from user {}: {}", self.id, err);
                self.emit_error(events::EVENT_REGISTER_ERROR, "服务端错误, 格式化请求数据失败");
                return;
            }
        };

        let task = self
            .register
            .get_or_insert_with(|| {
                info!("Create new register task for user {}", self.id);
                RegisterTask::new(&self.id.to_string(), self.sender.clone())
            })
            .clone();

        task.set_domains(request.domains);
        tokio::spawn(task.run(request.register_type));
        debug!("Start register task for user {}", self.id);
    }

    fn start_web_check(&mut self, domains: Vec<String>, query_type: String) {
        let task = self
            .web_check
            .get_or_insert_with(|| {
                info!("Create new web check task for user {}", self.id);
                WebCheckTask::new(&self.id.to_string(), self.sender.clone())
            })
            .clone();

        task.set_domains(domains);
        tokio::spawn(task.run(query_type));
        debug!("Start web check task for user {}", self.id);
    }
}

/// Normalize raw domains to their registrable form, dropping invalid lines
/// and duplicates while keeping first-seen order.
fn normalize_unique(domains: &[String]) -> Vec<String> {
    let mut unique = Vec::new();
    for domain in domains {
        if domain.is_empty() {
            continue;
        }
        match trim_and_get_main_domain(domain) {
            Ok(main_domain) if !main_domain.is_empty() => {
                if !unique.contains(&main_domain) {
                    unique.push(main_domain);
                }
            }
            _ => error!("Skip invalid domain name: {}", domain),
        }
    }
    unique
}

fn dedup_preserving_order(domains: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    domains
        .into_iter()
        .filter(|domain| seen.insert(domain.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unique_folds_case_and_duplicates() {
        let input = vec![
            "Example.COM".to_string(),
            "example.com".to_string(),
            "  eXample.com ".to_string(),
            "not-a-domain".to_string(),
            "other.net".to_string(),
        ];
        assert_eq!(normalize_unique(&input), vec!["example.com", "other.net"]);
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let input = vec![
            "b.com".to_string(),
            "a.com".to_string(),
            "b.com".to_string(),
        ];
        assert_eq!(dedup_preserving_order(input), vec!["b.com", "a.com"]);
    }

    #[test]
    fn message_frames_tolerate_missing_data() {
        let frame: MessageFrame = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(frame.event, "ping");
        assert!(frame.data.is_null());
    }
}
