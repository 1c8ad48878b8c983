//! Ephemeral per-websocket register task, mirroring the web check pool but
//! driving a configured registrar API instead of the lookup dispatcher.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config;
use crate::events;
use crate::registrar;

const MIN_REGISTER_CONCURRENCY: usize = 1;

pub struct RegisterTask {
    user_id: String,
    sender: mpsc::UnboundedSender<String>,
    cancel: Mutex<Option<CancellationToken>>,
    domains: Mutex<Vec<String>>,
}

impl RegisterTask {
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

    pub fn stop(&self) {
        if let Some(token) = self
            .cancel
            .lock()
            .expect("cancel lock poisoned")
            .as_ref()
        {
            info!("Going to stop register task for user {}", self.user_id);
            token.cancel();
        }
        self.domains.lock().expect("domains lock poisoned").clear();
    }

    fn emit(&self, frame: String) {
        let _ = self.sender.send(frame);
    }

    pub async fn run(self: Arc<Self>, register_type: String) {
        let domains: Vec<String> = {
            let mut guard = self.domains.lock().expect("domains lock poisoned");
            std::mem::take(&mut *guard)
        };

        if domains.is_empty() {
            error!("Empty domains, do nothing");
            self.emit(events::frame(
                events::EVENT_REGISTER_ERROR,
                serde_json::Value::String("未提供注册域名".into()),
            ));
            return;
        }

        info!(
            "Register task for user {} domain count: {}",
            self.user_id,
            domains.len()
        );

        let cfg = config::get();
        let Some(api) = cfg
            .register_apis
            .iter()
            .find(|api| api.api_name == register_type)
        else {
            debug!("Invalid register type: {}, no register api found", register_type);
            self.emit(events::frame(
                events::EVENT_REGISTER_ERROR,
                serde_json::Value::String(format!("未找到注册名称为{register_type}的API")),
            ));
            return;
        };

        let configured = api.concurrency_limit;
        let concurrency = if domains.len() > configured {
            if configured > 0 {
                configured
            } else {
                MIN_REGISTER_CONCURRENCY
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
            "Going to create total {} register workers for user {}",
            concurrency, self.user_id
        );

        let mut workers = Vec::with_capacity(concurrency);
        for seq in 0..concurrency {
            let task = self.clone();
            let worker_rx = rx.clone();
            let worker_token = token.clone();
            let worker_register_type = register_type.clone();
            workers.push(tokio::spawn(async move {
                task.worker(seq + 1, worker_rx, worker_token, worker_register_type)
                    .await;
            }));
        }

        for domain in domains {
            if token.is_cancelled() {
                info!("Force stop register task for user {}", self.user_id);
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

        info!("Register task for user {} finished", self.user_id);
    }

    async fn worker(
        &self,
        seq: usize,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
        token: CancellationToken,
        register_type: String,
    ) {
        debug!("Start register handler {} for user {}", seq, self.user_id);

        loop {
            let domain = tokio::select! {
                _ = token.cancelled() => {
                    info!(
                        "Force stop register task handler {} for user {}",
                        seq, self.user_id
                    );
                    return;
                }
                domain = async { rx.lock().await.recv().await } => domain,
            };

            let Some(domain) = domain else {
                debug!(
                    "Register task handler {} for user {} finished",
                    seq, self.user_id
                );
                return;
            };

            debug!(
                "Register task handler {} for user {}, register domain {}",
                seq, self.user_id, domain
            );

            let result = registrar::register(&domain, &register_type).await;
            debug!("Register domain {} result: {:?}", domain, result);

            match serde_json::to_value(&result) {
                Ok(data) => self.emit(events::frame(events::EVENT_REGISTER_RESULT, data)),
                Err(err) => error!("Failed to encode register result: {}", err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_register_api_emits_an_error_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = RegisterTask::new("user-1", tx);
        task.set_domains(vec!["example.com".into()]);
        task.clone().run("noSuchApi".into()).await;

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], events::EVENT_REGISTER_ERROR);
        assert!(value["data"].as_str().unwrap().contains("noSuchApi"));
    }

    #[tokio::test]
    async fn empty_domain_list_emits_an_error_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = RegisterTask::new("user-2", tx);
        task.clone().run("anyApi".into()).await;

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], events::EVENT_REGISTER_ERROR);
    }
}
