//! Registrar API calls: fire a configured registration URL for a domain and
//! classify the response body against success/fail text sets.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::config::{self, RegisterApi};
use crate::custom_api::get_response;
use crate::record::{
    RegisterInfo, REGISTER_STATUS_ERROR, REGISTER_STATUS_FAILED, REGISTER_STATUS_SUCCESS,
};

static LIMITERS: Lazy<RwLock<HashMap<String, Arc<Semaphore>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Rebuild the per-API semaphores from the current configuration.
pub fn setup_limiters() {
    let cfg = config::get();
    let mut limiters = LIMITERS.write().expect("limiter lock poisoned");
    limiters.clear();
    for api in &cfg.register_apis {
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

fn classify_body(body: &str, api: &RegisterApi) -> &'static str {
    let success = contains_any(body, &api.success_text);
    let fail = contains_any(body, &api.fail_text);

    match (success, fail) {
        (true, true) => REGISTER_STATUS_ERROR,
        (true, false) => REGISTER_STATUS_SUCCESS,
        (false, true) => REGISTER_STATUS_FAILED,
        (false, false) => REGISTER_STATUS_ERROR,
    }
}

/// Register `domain` through the API selected by `register_type`.
pub async fn register(domain: &str, register_type: &str) -> RegisterInfo {
    let mut result = RegisterInfo {
        register_type: register_type.to_string(),
        domain_name: domain.to_string(),
        ..RegisterInfo::default()
    };

    let cfg = config::get();
    let Some(api) = cfg
        .register_apis
        .iter()
        .find(|api| api.api_name == register_type)
    else {
        debug!("Invalid register type: {}, no register api found", register_type);
        result.register_status = REGISTER_STATUS_ERROR.to_string();
        result.raw_response = format!("Invalid register type: {register_type}, no register api found");
        return result;
    };

    let api_url = api.api_url.replace("{domain}", domain);

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
            error!("Request register api {} response error: {}", api.api_name, err);
            result.register_status = REGISTER_STATUS_ERROR.to_string();
            result.raw_response = err;
            return result;
        }
    };

    debug!(
        "Request register api {} with domain {}, response: {}",
        api.api_name, domain, body
    );

    result.register_status = classify_body(&body, api).to_string();
    result.raw_response = body;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> RegisterApi {
        RegisterApi {
            api_name: "myRegistrar".into(),
            api_url: "https://registrar.example.com/buy?domain={domain}".into(),
            success_text: vec!["ok".into()],
            fail_text: vec!["denied".into()],
            concurrency_limit: 1,
        }
    }

    #[test]
    fn classification_covers_all_four_cases() {
        assert_eq!(classify_body("ok", &api()), REGISTER_STATUS_SUCCESS);
        assert_eq!(classify_body("denied", &api()), REGISTER_STATUS_FAILED);
        assert_eq!(classify_body("ok but denied", &api()), REGISTER_STATUS_ERROR);
        assert_eq!(classify_body("???", &api()), REGISTER_STATUS_ERROR);
    }

    #[tokio::test]
    async fn unknown_register_type_reports_an_error_result() {
        let result = register("example.com", "noSuchRegistrar").await;
        assert_eq!(result.register_status, REGISTER_STATUS_ERROR);
        assert!(result.raw_response.contains("noSuchRegistrar"));
    }
}
