//! Ephemeral per-websocket check task: a small worker pool over an ad-hoc
//! domain list, emitting one `webCheckResult` frame per domain straight to
//! the owning socket. Nothing is persisted; disconnect cancels the pool.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bulk::classify_outcome;
use crate::config;
use crate::dispatcher;
use crate::events;
use crate::record::{PendingDomain, QueryResult};

const MIN_WEB_CHECK_CONCURRENCY: usize = 1;

pub struct WebCheckTask {
    user_id: String,
    sender: mpsc::UnboundedSender<String>,
    cancel: Mutex<Option<CancellationToken>>,
    domains: Mutex<Vec<String>>,
}

impl WebCheckTask {
    pub fn new(user_id: &str, sender: mpsc::UnboundedSender<String>) -> Arc<Self> {
        Arc::new(Self {
            user_id: user_id.to_string(),
            sender,
            cancel: Mutex::new(None),
            domains: Mutex::new(Vec::new()),
        })
    }

    pub fn set_domains(&self, domains: Vec<String>) {
        *self.domains.lock().expect("domains lock poisoned") = domains;
    }

    /// Cancel the running pool (socket disconnect or explicit stop).
    pub fn stop(&self) {
        if let Some(token) = self
            .cancel
            .lock()
            .expect("cancel lock poisoned")
            .as_ref()
        {
            info!("Going to stop web check task for user {}", self.user_id);
            token.cancel();
        }
        self.domains.lock().expect("domains lock poisoned").clear();
    }

    fn emit(&self, frame: String) {
        let _ = self.sender.send(frame);
    }

    pub async fn run(self: Arc<Self>, query_type: String) {
        let domains: Vec<String> = {
            let mut guard = self.domains.lock().expect("domains lock poisoned");
            std::mem::take(&mut *guard)
        };

        if domains.is_empty() {
            error!("Empty domains, do nothing");
            self.emit(events::frame(
                events::EVENT_WEB_CHECK_ERROR,
                serde_json::Value::String("未输入查询域名".into()),
            ));
            return;
        }

        info!(
            "Web check task for user {} domain count: {}",
            self.user_id,
            domains.len()
        );

        let cfg = config::get();
        let configured = cfg.web_check_domain_limit;
        let concurrency = if domains.len() as i64 > configured {
            if configured > 0 {
                configured as usize
            } else {
                MIN_WEB_CHECK_CONCURRENCY
            }
        } else {
            domains.len()
        };

        let token = CancellationToken::new();
        {
            let mut guard = self.cancel.lock().expect("cancel lock poisoned");
            *guard = Some(token.clone());
        }

        let (tx, rx) = mpsc::channel::<String>(concurrency);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        info!(
            "Going to create total {} web query workers for user {}",
            concurrency, self.user_id
        );

        let mut workers = Vec::with_capacity(concurrency);
        for seq in 0..concurrency {
            let task = self.clone();
            let worker_rx = rx.clone();
            let worker_token = token.clone();
            let worker_query_type = query_type.clone();
            workers.push(tokio::spawn(async move {
                task.worker(seq + 1, worker_rx, worker_token, worker_query_type)
                    .await;
            }));
        }

        for domain in domains {
            if token.is_cancelled() {
                info!("Force stop web check task for user {}", self.user_id);
                break;
            }
            if tx.send(domain).await.is_err() {
                break;
            }
        }
        drop(tx);

        for worker in workers {
            let _ = worker.await;
        }

        info!("Web check task for user {} finished", self.user_id);
    }

    async fn worker(
        &self,
        seq: usize,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
        token: CancellationToken,
        query_type: String,
    ) {
        debug!(
            "Start web check handler {} for user {}",
            seq, self.user_id
        );

        loop {
            let domain = tokio::select! {
                _ = token.cancelled() => {
                    info!(
                        "Force stop web check task handler {} for user {}",
                        seq, self.user_id
                    );
                    return;
                }
                domain = async { rx.lock().await.recv().await } => domain,
            };

            let Some(domain) = domain else {
                debug!(
                    "Web check task handler {} for user {} finished",
                    seq, self.user_id
                );
                return;
            };

            debug!(
                "Web check task handler {} for user {}, query domain {}",
                seq, self.user_id, domain
            );

            let outcome = dispatcher::lookup(&domain, &query_type).await;
            let result = web_result(&domain, &outcome);

            debug!("Web lookup of domain {} result: {:?}", domain, result);

            match serde_json::to_value(&result) {
                Ok(data) => self.emit(events::frame(events::EVENT_WEB_CHECK_RESULT, data)),
                Err(err) => error!("Failed to encode web check result: {}", err),
            }
        }
    }
}

/// The web surface reuses the bulk classification but keeps the raw lookup
/// payload attached for display.
fn web_result(domain: &str, outcome: &crate::record::LookupOutcome) -> QueryResult {
    let pending = PendingDomain {
        domain: domain.to_string(),
        order: 0,
    };
    let (mut result, _) = classify_outcome(&pending, outcome);
    result.raw_response = outcome.info.raw_response.clone();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LookupError;
    use crate::record::{DomainInfo, LookupOutcome, LookupType, RegisterStatus};

    #[test]
    fn web_results_keep_the_raw_response_even_for_free_domains() {
        let outcome = LookupOutcome::err(
            DomainInfo {
                lookup_type: LookupType::Whois,
                raw_response: "No match for \"X.COM\"".into(),
                ..DomainInfo::default()
            },
            LookupError::WhoisNotFound("x.com".into()),
        );
        let result = web_result("x.com", &outcome);
        assert_eq!(result.register_status, Some(RegisterStatus::Free));
        assert_eq!(result.raw_response, "No match for \"X.COM\"");
    }

    #[tokio::test]
    async fn empty_domain_list_emits_an_error_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = WebCheckTask::new("user-1", tx);
        task.clone().run("whoisQuery".into()).await;

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], events::EVENT_WEB_CHECK_ERROR);
        assert_eq!(value["data"], "未输入查询域名");
    }

    #[tokio::test]
    async fn stop_cancels_an_idle_task_without_panicking() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let task = WebCheckTask::new("user-2", tx);
        task.set_domains(vec!["example.com".into()]);
        task.stop();
        assert!(task.domains.lock().unwrap().is_empty());
    }
}
