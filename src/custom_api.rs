//! User-configured HTTP lookup backends.
//!
//! Each configured API gets a `{domain}` URL template, free/taken text sets
//! matched against the response body, and a counting semaphore bounding
//! concurrent outbound calls. The semaphore map is rebuilt on config update;
//! in-flight permits of a replaced semaphore are simply abandoned.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::config::{self, WhoisApi};
use crate::errors::LookupError;
use crate::record::{DomainInfo, LookupOutcome, LookupType, RegisterStatus};

static LIMITERS: Lazy<RwLock<HashMap<String, Arc<Semaphore>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Rebuild the per-API semaphores from the current configuration.
pub fn setup_limiters() {
    let cfg = config::get();
    let mut limiters = LIMITERS.write().expect("limiter lock poisoned");
    limiters.clear();
    for api in &cfg.whois_apis {
        limiters.insert(
            api.api_name.clone(),
            Arc::new(Semaphore::new(api.concurrency_limit.max(1))),
        );
    }
}

fn limiter_for(api_name: &str) -> Option<Arc<Semaphore>> {
    LIMITERS
        .read()
        .expect("limiter lock poisoned")
        .get(api_name)
        .cloned()
}

fn contains_any(body: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .filter(|needle| !needle.is_empty())
        .any(|needle| body.contains(needle.as_str()))
}

/// Classify a response body against the API's free/taken text sets. A body
/// matching both sets is ambiguous and classifies as an error.
fn classify_body(body: &str, api: &WhoisApi, domain: &str) -> Result<RegisterStatus, LookupError> {
    let free = contains_any(body, &api.free_text);
    let taken = contains_any(body, &api.taken_text);

    match (free, taken) {
        (true, true) => Err(LookupError::CustomizeApiWhoisResult(domain.to_string())),
        (true, false) => Ok(RegisterStatus::Free),
        (false, true) => Ok(RegisterStatus::Taken),
        (false, false) => Err(LookupError::CustomizeApiWhoisResult(domain.to_string())),
    }
}

/// Look `domain` up through the custom API selected by `query_type`.
pub async fn customize_lookup(domain: &str, query_type: &str) -> LookupOutcome {
    let mut info = DomainInfo {
        lookup_type: LookupType::Custom(query_type.to_string()),
        domain_name: domain.to_string(),
        ..DomainInfo::default()
    };

    let cfg = config::get();
    let Some(api) = cfg
        .whois_apis
        .iter()
        .find(|api| api.api_name == query_type)
    else {
        debug!("Invalid query type: {}, no whois api found", query_type);
        return LookupOutcome::err(info, LookupError::InvalidQueryType(query_type.to_string()));
    };

    let api_url = api.api_url.replace("{domain}", domain);

    // Held for the duration of the outbound call.
    let _permit = match limiter_for(&api.api_name) {
        Some(semaphore) => match semaphore.acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => None,
        },
        None => None,
    };

    let body = match get_response(&api_url).await {
        Ok(body) => body,
        Err(err) => {
            error!("Request whois api {} response error: {}", api.api_name, err);
            info.raw_response = err.clone();
            return LookupOutcome::err(info, LookupError::CustomizeApiServerResponse(err));
        }
    };

    info.raw_response = body.clone();
    debug!(
        "Request whois api {} with domain {}, response: {}",
        api.api_name, domain, body
    );

    match classify_body(&body, api, domain) {
        Ok(status) => {
            info.customized_result = Some(status);
            LookupOutcome::ok(info)
        }
        Err(err) => {
            error!(
                "Request whois api {} with domain {}, response matches neither or both text sets",
                api.api_name, domain
            );
            LookupOutcome::err(info, err)
        }
    }
}

/// Plain GET with the WHOIS timeout; retried on failure when the retry
/// options are enabled.
pub(crate) async fn get_response(api_url: &str) -> Result<String, String> {
    let cfg = config::get();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.whois_timeout))
        .build()
        .map_err(|e| e.to_string())?;

    let attempts = if cfg.retry_on_timeout {
        cfg.retry_max as u64 + 1
    } else {
        1
    };

    let mut last_error = String::new();
    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_secs(cfg.retry_interval)).await;
        }

        match client.get(api_url).send().await {
            Ok(response) => match response.text().await {
                Ok(body) => return Ok(body),
                Err(err) => last_error = err.to_string(),
            },
            Err(err) => last_error = err.to_string(),
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> WhoisApi {
        WhoisApi {
            api_name: "myApi".into(),
            api_url: "https://api.example.com/check?domain={domain}".into(),
            free_text: vec!["available".into()],
            taken_text: vec!["registered".into(), "taken".into()],
            concurrency_limit: 2,
        }
    }

    #[test]
    fn body_with_only_free_text_is_free() {
        let status = classify_body("domain is available", &api(), "a.com").unwrap();
        assert_eq!(status, RegisterStatus::Free);
    }

    #[test]
    fn body_with_only_taken_text_is_taken() {
        let status = classify_body("already registered", &api(), "a.com").unwrap();
        assert_eq!(status, RegisterStatus::Taken);
    }

    #[test]
    fn ambiguous_and_unmatched_bodies_are_errors() {
        assert!(classify_body("available but registered", &api(), "a.com").is_err());
        assert!(classify_body("server melted", &api(), "a.com").is_err());
    }

    #[test]
    fn empty_text_entries_never_match() {
        let mut api = api();
        api.free_text = vec![String::new()];
        assert!(classify_body("anything", &api, "a.com").is_err());
    }

    #[tokio::test]
    async fn unknown_query_type_is_rejected() {
        let outcome = customize_lookup("example.com", "noSuchApi").await;
        assert!(matches!(
            outcome.error,
            Some(LookupError::InvalidQueryType(_))
        ));
        assert_eq!(
            outcome.info.lookup_type,
            LookupType::Custom("noSuchApi".into())
        );
    }
}
