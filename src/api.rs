//! REST handlers: login-gated settings, log download/reset, bulk upload and
//! the CSV result export.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::bulk::BulkScheduler;
use crate::config::{self, Config};
use crate::custom_api;
use crate::domain_tools::ordered_query_results;
use crate::errors::ServiceError;
use crate::logging::{self, LogSink};
use crate::record::QueryResult;
use crate::registrar;

// Marks the CSV export as UTF-8 for spreadsheet tools.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<BulkScheduler>,
    pub log_sink: LogSink,
}

/// `GET /api/web/setting`: the public subset of the configuration.
pub async fn web_setting_list() -> Json<serde_json::Value> {
    debug!("Getting web setting list success");
    let cfg = config::get();

    let register_apis: Vec<&str> = cfg
        .register_apis
        .iter()
        .map(|api| api.api_name.as_str())
        .collect();
    let whois_apis: Vec<&str> = cfg
        .whois_apis
        .iter()
        .map(|api| api.api_name.as_str())
        .collect();

    Json(json!({
        "webCheckDomainLimit": cfg.web_check_domain_limit,
        "typoDefaultCcTlds": cfg.typo_default_cc_tlds,
        "registerApis": register_apis,
        "whoisApis": whois_apis,
    }))
}

/// `GET /api/admin/setting`: the full configuration.
pub async fn admin_setting_list() -> Json<Config> {
    info!("Getting admin setting list success");
    Json((*config::get()).clone())
}

/// `PUT /api/admin/setting`: persist a new configuration, apply the log
/// level immediately, and rebuild the per-API limiters.
pub async fn setting_update(
    Json(new_config): Json<Config>,
) -> Result<Json<Config>, ServiceError> {
    logging::set_level(&new_config.log_level);

    let updated = config::update(new_config)?;

    custom_api::setup_limiters();
    registrar::setup_limiters();

    info!("Update config success");
    Ok(Json(updated))
}

/// `GET /api/admin/log`: download the current log file.
pub async fn download_log(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let data = state.log_sink.read_all()?;
    info!("Download log: {}", state.log_sink.path().display());

    Ok((
        AppendHeaders([
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"typoscout.log\"".to_string(),
            ),
        ]),
        data,
    )
        .into_response())
}

/// `DELETE /api/admin/log`: truncate the log file in place.
pub async fn reset_log(State(state): State<AppState>) -> Result<Response, ServiceError> {
    state.log_sink.reset()?;
    info!("Reset log success");
    Ok(axum::http::StatusCode::OK.into_response())
}

/// `POST /api/admin/bulkcheckupload`: store the uploaded domain list
/// (multipart field `file`) and mark the bulk task `init`.
pub async fn bulk_check_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServiceError::BadRequest(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|err| ServiceError::BadRequest(err.to_string()))?;

        info!("Bulk check domain upload: {}", file_name);
        state.scheduler.upload_raw_domains(&data).await?;
        info!("Bulk check domain save to store success");

        return Ok(axum::http::StatusCode::OK.into_response());
    }

    Err(ServiceError::BadRequest("missing file field".into()))
}

#[derive(Debug, Serialize)]
struct QueryCsvRow {
    #[serde(rename = "Domain")]
    domain: String,
    #[serde(rename = "Lookup Type")]
    lookup_type: String,
    #[serde(rename = "Via Proxy")]
    via_proxy: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Error Info")]
    error_info: String,
    #[serde(rename = "Created Date")]
    created_date: String,
    #[serde(rename = "Expiry Date")]
    expiry_date: String,
    #[serde(rename = "Name Server")]
    name_server: String,
    #[serde(rename = "Dns Lite")]
    dns_lite: String,
    #[serde(rename = "Raw Domain Status")]
    raw_domain_status: String,
    #[serde(rename = "Domain Status")]
    domain_status: String,
}

impl From<QueryResult> for QueryCsvRow {
    fn from(result: QueryResult) -> Self {
        let via_proxy = if result.lookup_type.is_registry() {
            if result.via_proxy { "Yes" } else { "No" }
        } else {
            ""
        };

        QueryCsvRow {
            domain: result.domain,
            lookup_type: result.lookup_type.as_str().to_string(),
            via_proxy: via_proxy.to_string(),
            status: result
                .register_status
                .map(|status| status.as_str().to_string())
                .unwrap_or_default(),
            error_info: result.query_error,
            created_date: result.created_date,
            expiry_date: result.expiry_date,
            name_server: result.name_server.join(","),
            dns_lite: result.dns_lite,
            raw_domain_status: result.raw_domain_status.join(","),
            domain_status: result
                .domain_status
                .map(|status| status.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}

fn results_to_csv(results: Vec<QueryResult>) -> Result<Vec<u8>, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for result in results {
        writer
            .serialize(QueryCsvRow::from(result))
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|err| ServiceError::Internal(err.to_string()))
}

/// `GET /api/admin/bulkcheckresultdownload`: all three result lists merged,
/// ordered by upload position, rendered as a BOM-prefixed CSV attachment.
pub async fn bulk_check_result_download(
    State(state): State<AppState>,
) -> Result<Response, ServiceError> {
    let mut stored = state.scheduler.taken_results().await?;
    stored.extend(state.scheduler.free_results().await?);
    stored.extend(state.scheduler.error_results().await?);

    let results = ordered_query_results(&stored);
    let csv_data = results_to_csv(results)?;

    let mut body = Vec::with_capacity(UTF8_BOM.len() + csv_data.len());
    body.extend_from_slice(UTF8_BOM);
    body.extend_from_slice(&csv_data);

    info!("Download query result success");

    let filename = format!(
        "bulk_check_result_{}.csv",
        Local::now().format("%Y%m%d%H%M%S")
    );

    Ok((
        AppendHeaders([
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ]),
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DomainStatus, LookupType, RegisterStatus};

    #[test]
    fn csv_rows_render_proxy_only_for_registry_lookups() {
        let registry = QueryResult {
            domain: "example.com".into(),
            lookup_type: LookupType::Rdap,
            via_proxy: true,
            register_status: Some(RegisterStatus::Taken),
            domain_status: Some(DomainStatus::Active),
            name_server: vec!["a.iana-servers.net".into(), "b.iana-servers.net".into()],
            ..QueryResult::default()
        };
        let row = QueryCsvRow::from(registry);
        assert_eq!(row.via_proxy, "Yes");
        assert_eq!(row.status, "Taken");
        assert_eq!(row.name_server, "a.iana-servers.net,b.iana-servers.net");
        assert_eq!(row.domain_status, "Active");

        let dns = QueryResult {
            domain: "example.com".into(),
            lookup_type: LookupType::Dns,
            register_status: Some(RegisterStatus::Free),
            ..QueryResult::default()
        };
        assert_eq!(QueryCsvRow::from(dns).via_proxy, "");
    }

    #[test]
    fn csv_export_has_headers_and_one_line_per_result() {
        let results = vec![
            QueryResult {
                order: 1,
                domain: "b.com".into(),
                lookup_type: LookupType::Whois,
                register_status: Some(RegisterStatus::Free),
                ..QueryResult::default()
            },
            QueryResult {
                order: 0,
                domain: "a.com".into(),
                lookup_type: LookupType::Whois,
                register_status: Some(RegisterStatus::Taken),
                ..QueryResult::default()
            },
        ];

        let data = results_to_csv(results).unwrap();
        let text = String::from_utf8(data).unwrap();
        let lines: Vec<&str> = text.trim_end().split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Domain,Lookup Type,Via Proxy,Status"));
    }
}
