//! The bulk check scheduler: a process-wide, resumable worker pool over a
//! durable pending set.
//!
//! Pending work lives in a store hash (`domain -> {Domain, Order}`), results
//! in three lists (taken / free / error). A worker appends the classified
//! result first and deletes the pending entry second, so a crash between the
//! two re-queries the domain on resume instead of losing it; consumers dedup
//! by `Order`. Status snapshots are broadcast to subscribed websockets every
//! second while any subscriber is connected.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config;
use crate::dispatcher;
use crate::domain_tools::{
    dns_lite, human_domain_status, ordered_query_results, trim_and_get_main_domain,
};
use crate::errors::ServiceError;
use crate::events;
use crate::fanout::Fanout;
use crate::record::{
    BulkStatus, LookupOutcome, PendingDomain, QueryResult, RegisterStatus,
};
use crate::store::RedisStore;

pub const BULK_QUERY_TYPE_KEY: &str = "bulkCheckQueryType";
pub const BULK_RAW_DOMAINS_KEY: &str = "bulkCheckRawDomains";
pub const BULK_UNIQUE_DOMAINS_KEY: &str = "bulkCheckUniqueDomains";
pub const BULK_UNIQUE_COUNT_KEY: &str = "bulkCheckUniqueDomainsCount";
pub const BULK_TAKEN_RESULT_KEY: &str = "bulkCheckTakenResult";
pub const BULK_FREE_RESULT_KEY: &str = "bulkCheckFreeResult";
pub const BULK_ERROR_RESULT_KEY: &str = "bulkCheckErrorResult";
pub const BULK_STATUS_KEY: &str = "bulkCheckStatus";

const MIN_BULK_CONCURRENCY: usize = 3;
const INFO_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The periodic status snapshot broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BulkCheckInfo {
    pub status: String,
    pub query_type: String,
    pub total_domains: i64,
    pub remain_domains: i64,
    pub taken_domains: i64,
    pub free_domains: i64,
    pub error_domains: i64,
}

/// Which result list a classified lookup lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Taken,
    Free,
    Error,
}

impl Bucket {
    fn key(&self) -> &'static str {
        match self {
            Bucket::Taken => BULK_TAKEN_RESULT_KEY,
            Bucket::Free => BULK_FREE_RESULT_KEY,
            Bucket::Error => BULK_ERROR_RESULT_KEY,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Bucket::Taken => "taken",
            Bucket::Free => "free",
            Bucket::Error => "error",
        }
    }
}

/// Classify a finished lookup into its bucket and the stored record. Bulk
/// results do not carry the raw response; only the web surface shows it.
pub fn classify_outcome(pending: &PendingDomain, outcome: &LookupOutcome) -> (QueryResult, Bucket) {
    let info = &outcome.info;
    let mut result = QueryResult {
        order: pending.order,
        domain: pending.domain.clone(),
        lookup_type: info.lookup_type.clone(),
        via_proxy: info.via_proxy,
        ..QueryResult::default()
    };

    if info.lookup_type.is_registry() {
        match &outcome.error {
            None => {
                result.register_status = Some(RegisterStatus::Taken);
                result.created_date = info.creation_date.clone();
                result.expiry_date = info.expiry_date.clone();
                result.name_server = info.name_server.iter().map(|ns| ns.to_lowercase()).collect();
                result.dns_lite = dns_lite(&info.name_server);
                result.raw_domain_status = info.domain_status.clone();
                result.domain_status = Some(human_domain_status(&info.domain_status));
                (result, Bucket::Taken)
            }
            Some(err) if err.is_not_found() => {
                result.register_status = Some(RegisterStatus::Free);
                (result, Bucket::Free)
            }
            Some(err) => {
                result.register_status = Some(RegisterStatus::Error);
                result.query_error = err.human_message().to_string();
                (result, Bucket::Error)
            }
        }
    } else if info.lookup_type == crate::record::LookupType::Dns {
        match &outcome.error {
            None if !info.name_server.is_empty() => {
                result.register_status = Some(RegisterStatus::Taken);
                result.name_server = info.name_server.iter().map(|ns| ns.to_lowercase()).collect();
                result.dns_lite = dns_lite(&info.name_server);
                (result, Bucket::Taken)
            }
            None => {
                result.register_status = Some(RegisterStatus::Free);
                (result, Bucket::Free)
            }
            Some(err) if err.is_not_found() => {
                result.register_status = Some(RegisterStatus::Free);
                (result, Bucket::Free)
            }
            Some(err) => {
                result.register_status = Some(RegisterStatus::Error);
                result.query_error = err.human_message().to_string();
                (result, Bucket::Error)
            }
        }
    } else {
        match &outcome.error {
            Some(err) => {
                result.register_status = Some(RegisterStatus::Error);
                result.query_error = err.human_message().to_string();
                (result, Bucket::Error)
            }
            None => match info.customized_result {
                Some(RegisterStatus::Taken) => {
                    result.register_status = Some(RegisterStatus::Taken);
                    (result, Bucket::Taken)
                }
                Some(RegisterStatus::Free) => {
                    result.register_status = Some(RegisterStatus::Free);
                    (result, Bucket::Free)
                }
                _ => {
                    result.register_status = Some(RegisterStatus::Error);
                    result.query_error =
                        crate::errors::LookupError::InvalidLookupType(pending.domain.clone())
                            .human_message()
                            .to_string();
                    (result, Bucket::Error)
                }
            },
        }
    }
}

pub struct BulkScheduler {
    store: RedisStore,
    fanout: Fanout,
    cancel: Mutex<Option<CancellationToken>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl BulkScheduler {
    pub fn new(store: RedisStore) -> Arc<Self> {
        Arc::new(Self {
            store,
            fanout: Fanout::new(),
            cancel: Mutex::new(None),
            ticker: Mutex::new(None),
        })
    }

    /// Ensure the status and counter keys exist (fresh store -> `idle` / 0).
    pub async fn init(&self) -> Result<(), ServiceError> {
        match self.store.get(BULK_STATUS_KEY).await? {
            Some(status) => info!("Get bulk check task status: {}", status),
            None => self.set_status(BulkStatus::Idle).await?,
        }

        if self.store.get(BULK_UNIQUE_COUNT_KEY).await?.is_none() {
            info!("Key {} does not exist, create it", BULK_UNIQUE_COUNT_KEY);
            self.store.set(BULK_UNIQUE_COUNT_KEY, "0").await?;
        }

        Ok(())
    }

    /// Resume a run that was interrupted by a process restart.
    pub async fn startup_recovery(self: Arc<Self>) {
        match self.status().await {
            Ok(BulkStatus::Running) => {
                info!("Previous bulk check task running, restart it");
                self.spawn_run();
            }
            Ok(_) => {}
            Err(err) => error!("Failed to get bulk check task status: {}", err),
        }
    }

    // ---- subscribers & status snapshots ----

    pub fn add_subscriber(self: Arc<Self>, id: u64, sender: mpsc::UnboundedSender<String>) {
        if self.fanout.add(id, sender) {
            info!("New admin websocket connected, start bulk check info timer");
            self.start_ticker();
        }
    }

    pub fn remove_subscriber(&self, id: u64) {
        if self.fanout.remove(id) {
            info!("No admin websocket connected, stop bulk check info timer");
            if let Some(handle) = self.ticker.lock().expect("ticker lock poisoned").take() {
                handle.abort();
            }
        }
    }

    fn start_ticker(self: Arc<Self>) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(INFO_TICK_INTERVAL);
            loop {
                interval.tick().await;
                if scheduler.fanout.is_empty() {
                    continue;
                }
                match scheduler.info().await {
                    Ok(snapshot) => {
                        let frame = events::frame(
                            events::EVENT_BULK_CHECK_INFO,
                            serde_json::to_value(&snapshot).unwrap_or_default(),
                        );
                        scheduler.fanout.broadcast(&frame);
                    }
                    Err(err) => warn!("Failed to get bulk check task info: {}", err),
                }
            }
        });

        let mut ticker = self.ticker.lock().expect("ticker lock poisoned");
        if let Some(old) = ticker.replace(handle) {
            old.abort();
        }
    }

    fn broadcast_error(&self, message: &str) {
        let frame = events::frame(
            events::EVENT_BULK_CHECK_ERROR,
            serde_json::Value::String(message.to_string()),
        );
        self.fanout.broadcast(&frame);
    }

    pub async fn info(&self) -> Result<BulkCheckInfo, ServiceError> {
        let status = self.status().await?;
        let query_type = self.query_type().await;

        let total = self
            .store
            .get(BULK_UNIQUE_COUNT_KEY)
            .await?
            .and_then(|count| count.parse::<i64>().ok())
            .unwrap_or(0);

        Ok(BulkCheckInfo {
            status: status.as_str().to_string(),
            query_type,
            total_domains: total,
            remain_domains: self.store.hlen(BULK_UNIQUE_DOMAINS_KEY).await? as i64,
            taken_domains: self.store.llen(BULK_TAKEN_RESULT_KEY).await? as i64,
            free_domains: self.store.llen(BULK_FREE_RESULT_KEY).await? as i64,
            error_domains: self.store.llen(BULK_ERROR_RESULT_KEY).await? as i64,
        })
    }

    pub async fn status(&self) -> Result<BulkStatus, ServiceError> {
        let raw = self
            .store
            .get(BULK_STATUS_KEY)
            .await?
            .unwrap_or_default();
        BulkStatus::parse(&raw)
            .ok_or_else(|| ServiceError::Internal("bulk check task status not found".into()))
    }

    async fn set_status(&self, status: BulkStatus) -> Result<(), ServiceError> {
        let result = self.store.set(BULK_STATUS_KEY, status.as_str()).await;
        match &result {
            Ok(()) => info!("Set bulk check task status to: {}", status),
            Err(err) => error!("Failed to set bulk check task status to {}: {}", status, err),
        }
        result
    }

    pub async fn query_type(&self) -> String {
        self.store
            .get(BULK_QUERY_TYPE_KEY)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    pub async fn set_query_type(&self, query_type: &str) -> Result<(), ServiceError> {
        self.store.set(BULK_QUERY_TYPE_KEY, query_type).await?;
        info!("Set bulk check query type to: {}", query_type);
        Ok(())
    }

    // ---- operations ----

    /// Store a freshly uploaded raw domain list and mark the task `init`.
    pub async fn upload_raw_domains(&self, content: &[u8]) -> Result<(), ServiceError> {
        self.store.del(BULK_RAW_DOMAINS_KEY).await?;
        self.store.set_bytes(BULK_RAW_DOMAINS_KEY, content).await?;
        debug!("Add raw domain to store: {}", BULK_RAW_DOMAINS_KEY);
        self.set_status(BulkStatus::Init).await
    }

    /// Clear previous task data, uniquify the raw upload into the pending
    /// hash and start the run.
    pub async fn create_task(self: Arc<Self>) {
        if self.clear_task_data().await.is_err() {
            error!("Failed to clean bulk check task data");
            return;
        }

        info!("Start to unique raw domains");
        if let Err(err) = self.unique_raw_domains().await {
            error!("Failed to unique raw domains: {}", err);
            let _ = self.set_status(BulkStatus::Error).await;
            self.broadcast_error("域名去重失败, 请检查服务端日志");
            return;
        }
        info!("Unique raw domains completed");

        self.spawn_run();
    }

    pub async fn pause(&self) {
        info!("Pause bulk check task");
        self.cancel_current();
        let _ = self.set_status(BulkStatus::Paused).await;
    }

    pub fn resume(self: Arc<Self>) {
        info!("Resume bulk check task");
        self.spawn_run();
    }

    pub async fn cancel_task(&self) {
        info!("Cancel bulk check task");
        self.cancel_current();
        let _ = self.set_status(BulkStatus::Canceled).await;
    }

    /// Flush the whole store namespace and return to `idle`.
    pub async fn clear(&self) {
        if let Err(err) = self.store.flush_db().await {
            error!("Failed to clear store: {}", err);
            return;
        }
        info!("Clear store data successfully");

        if let Err(err) = self.init().await {
            error!("Failed to re-init store: {}", err);
            return;
        }
        let _ = self.set_status(BulkStatus::Idle).await;
    }

    /// Move every errored result back into the pending hash (keeping its
    /// original order) and run again.
    pub async fn recheck_error_domains(self: Arc<Self>) {
        debug!("Requery bulk check task error domains");

        let stored = match self.store.lrange_all(BULK_ERROR_RESULT_KEY).await {
            Ok(stored) => stored,
            Err(err) => {
                error!("Failed to read error results: {}", err);
                return;
            }
        };
        if stored.is_empty() {
            info!("No error domain found");
            return;
        }

        let entries: Vec<(String, String)> = ordered_query_results(&stored)
            .into_iter()
            .filter_map(|result| {
                let pending = PendingDomain {
                    domain: result.domain.clone(),
                    order: result.order,
                };
                serde_json::to_string(&pending)
                    .ok()
                    .map(|json| (result.domain, json))
            })
            .collect();

        if self.store.del(BULK_UNIQUE_DOMAINS_KEY).await.is_err() {
            error!("Failed to clean bulk check task unique domains");
            return;
        }
        if self.store.del(BULK_ERROR_RESULT_KEY).await.is_err() {
            error!("Failed to clean bulk check task error result");
            return;
        }

        info!("Unique bulk check task error domain count: {}", entries.len());

        if let Err(err) = self
            .store
            .hset_batched(BULK_UNIQUE_DOMAINS_KEY, &entries)
            .await
        {
            error!("Error saving unique error domains to store: {}", err);
            return;
        }
        info!("All unique bulk check task error domain saved to store");

        self.spawn_run();
    }

    pub async fn taken_results(&self) -> Result<Vec<String>, ServiceError> {
        self.store.lrange_all(BULK_TAKEN_RESULT_KEY).await
    }

    pub async fn free_results(&self) -> Result<Vec<String>, ServiceError> {
        self.store.lrange_all(BULK_FREE_RESULT_KEY).await
    }

    pub async fn error_results(&self) -> Result<Vec<String>, ServiceError> {
        self.store.lrange_all(BULK_ERROR_RESULT_KEY).await
    }

    // ---- internals ----

    fn cancel_current(&self) {
        let guard = self.cancel.lock().expect("cancel lock poisoned");
        if let Some(token) = guard.as_ref() {
            info!("Going to stop bulk check task");
            token.cancel();
        }
    }

    async fn clear_task_data(&self) -> Result<(), ServiceError> {
        for key in [
            BULK_UNIQUE_DOMAINS_KEY,
            BULK_UNIQUE_COUNT_KEY,
            BULK_TAKEN_RESULT_KEY,
            BULK_FREE_RESULT_KEY,
            BULK_ERROR_RESULT_KEY,
        ] {
            if let Err(err) = self.store.del(key).await {
                error!("Failed to clean {} from store: {}", key, err);
                let _ = self.set_status(BulkStatus::Error).await;
                self.broadcast_error("服务端出现错误, 请检查服务端日志");
                return Err(err);
            }
            debug!("Clean {} from store", key);
        }
        Ok(())
    }

    /// Stream the raw upload line by line, normalize each entry to its
    /// registrable domain, drop invalid lines, dedup preserving first-seen
    /// order, and fill the pending hash in pipelined batches.
    async fn unique_raw_domains(&self) -> Result<(), ServiceError> {
        self.set_status(BulkStatus::Uniquing).await?;

        let raw = self
            .store
            .get_bytes(BULK_RAW_DOMAINS_KEY)
            .await?
            .ok_or_else(|| ServiceError::Internal("raw domains not found in store".into()))?;
        let text = String::from_utf8_lossy(&raw);

        let mut seen = std::collections::HashSet::new();
        let mut unique_domains: Vec<String> = Vec::new();
        for line in text.lines() {
            match trim_and_get_main_domain(line) {
                Ok(main_domain) if !main_domain.is_empty() => {
                    if seen.insert(main_domain.clone()) {
                        unique_domains.push(main_domain);
                    }
                }
                _ => debug!("Skip invalid domain name: {}", line),
            }
        }

        info!("Unique bulk check domain count: {}", unique_domains.len());

        self.store
            .set(BULK_UNIQUE_COUNT_KEY, &unique_domains.len().to_string())
            .await?;

        let entries: Vec<(String, String)> = unique_domains
            .into_iter()
            .enumerate()
            .filter_map(|(order, domain)| {
                let pending = PendingDomain {
                    domain: domain.clone(),
                    order,
                };
                serde_json::to_string(&pending)
                    .ok()
                    .map(|json| (domain, json))
            })
            .collect();

        self.store
            .hset_batched(BULK_UNIQUE_DOMAINS_KEY, &entries)
            .await?;

        info!("All unique bulk check domain saved to store");
        Ok(())
    }

    /// Run in a fresh task; a panic anywhere inside turns the status into
    /// `error` while the process keeps serving.
    pub fn spawn_run(self: Arc<Self>) {
        let scheduler = self;
        tokio::spawn(async move {
            let runner = scheduler.clone();
            let handle = tokio::spawn(async move { runner.run().await });
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!("Bulk check task panic: {:?}", err);
                    let _ = scheduler.set_status(BulkStatus::Error).await;
                }
            }
        });
    }

    async fn run(self: Arc<Self>) {
        let pending = match self.store.hgetall(BULK_UNIQUE_DOMAINS_KEY).await {
            Ok(pending) => pending,
            Err(err) => {
                error!("Failed to load pending domains: {}", err);
                let _ = self.set_status(BulkStatus::Error).await;
                self.broadcast_error("服务端出现错误, 请检查服务端日志");
                return;
            }
        };

        if pending.is_empty() {
            error!("Unique domains is empty, do nothing");
            let _ = self.set_status(BulkStatus::Error).await;
            self.broadcast_error("域名去重后没有找到有效的域名, 请检查域名文件");
            return;
        }
        debug!("Unique domains count: {}", pending.len());

        let query_type = self.query_type().await;
        if query_type.is_empty() {
            error!("Bulk check query type is empty");
            let _ = self.set_status(BulkStatus::Error).await;
            self.broadcast_error("获取查询类型失败, 请检查服务端日志");
            return;
        }

        let cfg = config::get();
        let configured = cfg.bulk_check_concurrency_limit;
        let concurrency = if pending.len() as i64 > configured {
            if configured > 0 {
                configured as usize
            } else {
                MIN_BULK_CONCURRENCY
            }
        } else {
            pending.len()
        };

        if self.set_status(BulkStatus::Running).await.is_err() {
            let _ = self.set_status(BulkStatus::Error).await;
            self.broadcast_error("创建任务失败, 请检查服务端日志");
            return;
        }

        let token = CancellationToken::new();
        {
            let mut guard = self.cancel.lock().expect("cancel lock poisoned");
            *guard = Some(token.clone());
        }

        let (tx, rx) = mpsc::channel::<PendingDomain>(concurrency);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        info!("Going to create total {} bulk check workers", concurrency);

        let mut workers = Vec::with_capacity(concurrency);
        for seq in 0..concurrency {
            let scheduler = self.clone();
            let worker_rx = rx.clone();
            let worker_token = token.clone();
            let worker_query_type = query_type.clone();
            workers.push(tokio::spawn(async move {
                scheduler
                    .worker(seq + 1, worker_rx, worker_token, worker_query_type)
                    .await;
            }));
        }

        for (_, entry) in pending {
            if token.is_cancelled() {
                info!("Force stop bulk check task");
                break;
            }

            let item: PendingDomain = match serde_json::from_str(&entry) {
                Ok(item) => item,
                Err(_) => {
                    error!("Failed to decode pending domain entry '{}'", entry);
                    continue;
                }
            };

            if tx.send(item).await.is_err() {
                break;
            }
        }
        drop(tx);

        info!("All domains sent to bulk check handlers, waiting for all handlers to finish");

        let mut panicked = false;
        for worker in workers {
            if let Err(err) = worker.await {
                if err.is_panic() {
                    error!("Bulk check worker panic: {:?}", err);
                    panicked = true;
                }
            }
        }

        {
            let mut guard = self.cancel.lock().expect("cancel lock poisoned");
            *guard = None;
        }

        if panicked {
            let _ = self.set_status(BulkStatus::Error).await;
        } else if !token.is_cancelled() {
            let _ = self.set_status(BulkStatus::Done).await;
            info!("Bulk check finished");
        }
    }

    async fn worker(
        &self,
        seq: usize,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<PendingDomain>>>,
        token: CancellationToken,
        query_type: String,
    ) {
        debug!("Start bulk check handler {}", seq);

        loop {
            let item = tokio::select! {
                _ = token.cancelled() => {
                    info!("Force stop bulk check handler {}", seq);
                    return;
                }
                item = async { rx.lock().await.recv().await } => item,
            };

            let Some(item) = item else {
                debug!("Bulk check handler {} finished", seq);
                return;
            };

            debug!("Bulk check handler {} query domain {}", seq, item.domain);

            let outcome = dispatcher::lookup(&item.domain, &query_type).await;
            let (result, bucket) = classify_outcome(&item, &outcome);
            metrics::counter!("typoscout_bulk_results_total", "bucket" => bucket.label())
                .increment(1);

            match serde_json::to_string(&result) {
                Ok(json) => {
                    if let Err(err) = self.store.rpush(bucket.key(), &json).await {
                        warn!(
                            "Bulk check handler {} failed to save result of domain {}: {}",
                            seq, item.domain, err
                        );
                    }
                }
                Err(err) => {
                    warn!("Failed to encode query result for {}: {}", item.domain, err)
                }
            }

            // Append first, delete second: a crash in between re-queries the
            // domain on resume rather than losing it.
            if let Err(err) = self.store.hdel(BULK_UNIQUE_DOMAINS_KEY, &item.domain).await {
                error!(
                    "Failed to delete unique domain {} from store: {}",
                    item.domain, err
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LookupError;
    use crate::record::{DomainInfo, LookupType};

    fn pending(domain: &str, order: usize) -> PendingDomain {
        PendingDomain {
            domain: domain.to_string(),
            order,
        }
    }

    fn registry_info(lookup_type: LookupType) -> DomainInfo {
        DomainInfo {
            lookup_type,
            via_proxy: true,
            domain_name: "example.com".into(),
            registrar: "Example Registrar".into(),
            domain_status: vec!["clientTransferProhibited".into()],
            creation_date: "1995-08-14 04:00:00".into(),
            expiry_date: "2026-08-13 04:00:00".into(),
            name_server: vec!["A.IANA-SERVERS.NET".into()],
            ..DomainInfo::default()
        }
    }

    #[test]
    fn successful_registry_lookup_is_taken_with_full_fields() {
        let outcome = LookupOutcome::ok(registry_info(LookupType::Rdap));
        let (result, bucket) = classify_outcome(&pending("example.com", 4), &outcome);

        assert_eq!(bucket, Bucket::Taken);
        assert_eq!(result.order, 4);
        assert_eq!(result.register_status, Some(RegisterStatus::Taken));
        assert_eq!(result.name_server, vec!["a.iana-servers.net"]);
        assert_eq!(result.dns_lite, "iana-servers.net");
        assert!(result.via_proxy);
        assert!(result.domain_status.is_some());
    }

    #[test]
    fn whois_not_found_is_the_free_bucket() {
        let outcome = LookupOutcome::err(
            DomainInfo {
                lookup_type: LookupType::Whois,
                ..DomainInfo::default()
            },
            LookupError::WhoisNotFound("free-example.com".into()),
        );
        let (result, bucket) = classify_outcome(&pending("free-example.com", 0), &outcome);
        assert_eq!(bucket, Bucket::Free);
        assert_eq!(result.register_status, Some(RegisterStatus::Free));
        assert!(result.query_error.is_empty());
    }

    #[test]
    fn registry_errors_carry_the_human_message() {
        let outcome = LookupOutcome::err(
            DomainInfo {
                lookup_type: LookupType::Whois,
                ..DomainInfo::default()
            },
            LookupError::WhoisTimeout("example.com".into()),
        );
        let (result, bucket) = classify_outcome(&pending("example.com", 1), &outcome);
        assert_eq!(bucket, Bucket::Error);
        assert_eq!(result.query_error, "Whois查询超时");
    }

    #[test]
    fn dns_classification_follows_the_nameserver_set() {
        let with_ns = LookupOutcome::ok(DomainInfo {
            lookup_type: LookupType::Dns,
            name_server: vec!["ns1.dns.example.net".into()],
            ..DomainInfo::default()
        });
        let (result, bucket) = classify_outcome(&pending("example.com", 2), &with_ns);
        assert_eq!(bucket, Bucket::Taken);
        assert_eq!(result.dns_lite, "example.net");

        let empty_ns = LookupOutcome::ok(DomainInfo {
            lookup_type: LookupType::Dns,
            ..DomainInfo::default()
        });
        let (_, bucket) = classify_outcome(&pending("example.com", 2), &empty_ns);
        assert_eq!(bucket, Bucket::Free);

        let not_found = LookupOutcome::err(
            DomainInfo {
                lookup_type: LookupType::Dns,
                ..DomainInfo::default()
            },
            LookupError::NsNotFound("example.com".into()),
        );
        let (_, bucket) = classify_outcome(&pending("example.com", 2), &not_found);
        assert_eq!(bucket, Bucket::Free);
    }

    #[test]
    fn custom_results_classify_by_the_customized_flag() {
        let taken = LookupOutcome::ok(DomainInfo {
            lookup_type: LookupType::Custom("myApi".into()),
            customized_result: Some(RegisterStatus::Taken),
            ..DomainInfo::default()
        });
        let (_, bucket) = classify_outcome(&pending("example.com", 0), &taken);
        assert_eq!(bucket, Bucket::Taken);

        let errored = LookupOutcome::err(
            DomainInfo {
                lookup_type: LookupType::Custom("myApi".into()),
                ..DomainInfo::default()
            },
            LookupError::CustomizeApiServerResponse("boom".into()),
        );
        let (result, bucket) = classify_outcome(&pending("example.com", 0), &errored);
        assert_eq!(bucket, Bucket::Error);
        assert!(!result.query_error.is_empty());
    }
}
