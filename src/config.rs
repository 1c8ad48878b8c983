//! Declarative service configuration.
//!
//! Read once at startup from `config.yaml` next to the executable, exposed
//! process-wide with a latest-wins accessor, and rewritten atomically from a
//! commented template when the admin updates settings. Field names are
//! camelCase so the same struct round-trips through the admin REST API.

use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::domain_tools::format_tlds;
use crate::errors::ServiceError;

const CONFIG_FILE_NAME: &str = "config.yaml";

/// The config file carries PascalCase keys (see the write template), the
/// REST API camelCase; aliases accept both on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[serde(alias = "LogLevel")]
    pub log_level: String,

    #[serde(alias = "AuthUsername")]
    pub auth_username: String,
    #[serde(alias = "AuthPassword")]
    pub auth_password: String,
    #[serde(alias = "AuthExpireDays")]
    pub auth_expire_days: i64,
    #[serde(alias = "JwtSecretKey")]
    pub jwt_secret_key: String,

    #[serde(alias = "WhoisTimeout")]
    pub whois_timeout: u64,
    #[serde(alias = "DnsTimeout")]
    pub dns_timeout: u64,

    #[serde(alias = "RetryOnTimeout")]
    pub retry_on_timeout: bool,
    #[serde(alias = "RetryInterval")]
    pub retry_interval: u64,
    #[serde(alias = "RetryMax")]
    pub retry_max: u32,

    #[serde(alias = "GlobalProxyTlds")]
    pub global_proxy_tlds: Vec<String>,
    #[serde(alias = "MixedProxyTlds")]
    pub mixed_proxy_tlds: Vec<String>,
    #[serde(alias = "MixedDnsTlds")]
    pub mixed_dns_tlds: Vec<String>,

    #[serde(alias = "SocketProxyHost")]
    pub socket_proxy_host: String,
    #[serde(alias = "SocketProxyPort")]
    pub socket_proxy_port: u16,
    #[serde(alias = "SocketProxyAuth")]
    pub socket_proxy_auth: bool,
    #[serde(alias = "SocketProxyUser")]
    pub socket_proxy_user: String,
    #[serde(alias = "SocketProxyPassword")]
    pub socket_proxy_password: String,

    #[serde(alias = "BulkCheckConcurrencyLimit")]
    pub bulk_check_concurrency_limit: i64,

    #[serde(alias = "WebCheckConcurrencyLimit")]
    pub web_check_concurrency_limit: i64,
    #[serde(alias = "WebCheckDomainLimit")]
    pub web_check_domain_limit: i64,

    #[serde(alias = "TypoDefaultCcTlds")]
    pub typo_default_cc_tlds: Vec<CcTld>,
    #[serde(alias = "TypoCustomizedReplaces")]
    pub typo_customized_replaces: Vec<String>,

    #[serde(alias = "RegisterApis")]
    pub register_apis: Vec<RegisterApi>,
    #[serde(alias = "WhoisApis")]
    pub whois_apis: Vec<WhoisApi>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "Info".into(),
            auth_username: "admin".into(),
            auth_password: "admin".into(),
            auth_expire_days: 1,
            jwt_secret_key: "changeme".into(),
            whois_timeout: 10,
            dns_timeout: 5,
            retry_on_timeout: false,
            retry_interval: 1,
            retry_max: 1,
            global_proxy_tlds: Vec::new(),
            mixed_proxy_tlds: Vec::new(),
            mixed_dns_tlds: Vec::new(),
            socket_proxy_host: String::new(),
            socket_proxy_port: 1080,
            socket_proxy_auth: false,
            socket_proxy_user: String::new(),
            socket_proxy_password: String::new(),
            bulk_check_concurrency_limit: 10,
            web_check_concurrency_limit: 5,
            web_check_domain_limit: 20,
            typo_default_cc_tlds: Vec::new(),
            typo_customized_replaces: Vec::new(),
            register_apis: Vec::new(),
            whois_apis: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CcTld {
    #[serde(alias = "Tld")]
    pub tld: String,
    #[serde(alias = "IsSelected")]
    pub is_selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterApi {
    #[serde(alias = "ApiName")]
    pub api_name: String,
    #[serde(alias = "ApiUrl")]
    pub api_url: String,
    #[serde(alias = "SuccessText")]
    pub success_text: Vec<String>,
    #[serde(alias = "FailText")]
    pub fail_text: Vec<String>,
    #[serde(alias = "ConcurrencyLimit")]
    pub concurrency_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WhoisApi {
    #[serde(alias = "ApiName")]
    pub api_name: String,
    #[serde(alias = "ApiUrl")]
    pub api_url: String,
    #[serde(alias = "FreeText")]
    pub free_text: Vec<String>,
    #[serde(alias = "TakenText")]
    pub taken_text: Vec<String>,
    #[serde(alias = "ConcurrencyLimit")]
    pub concurrency_limit: usize,
}

static CONFIG: Lazy<RwLock<Arc<Config>>> = Lazy::new(|| RwLock::new(Arc::new(Config::default())));
static CONFIG_PATH: OnceCell<PathBuf> = OnceCell::new();

/// The process-wide configuration value. Latest-wins: in-flight workers keep
/// the Arc they already cloned.
pub fn get() -> Arc<Config> {
    CONFIG.read().expect("config lock poisoned").clone()
}

fn set(config: Config) {
    *CONFIG.write().expect("config lock poisoned") = Arc::new(config);
}

fn default_path() -> Result<PathBuf, ServiceError> {
    let exe = std::env::current_exe()
        .map_err(|e| ServiceError::Config(format!("cannot locate executable: {e}")))?;
    let dir = exe
        .parent()
        .ok_or_else(|| ServiceError::Config("executable has no parent directory".into()))?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load the configuration from `config.yaml` in the executable's directory
/// and install it as the process-wide value.
pub fn init() -> Result<(), ServiceError> {
    let path = default_path()?;
    init_from(&path)
}

pub fn init_from(path: &Path) -> Result<(), ServiceError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ServiceError::Config(format!("read {}: {e}", path.display())))?;
    let config: Config = serde_yaml::from_str(&contents)
        .map_err(|e| ServiceError::Config(format!("parse {}: {e}", path.display())))?;

    CONFIG_PATH.get_or_init(|| path.to_path_buf());
    tracing::debug!("Read config: {:?}", config);
    set(config);
    Ok(())
}

/// Normalize, persist and install a new configuration (admin update).
pub fn update(mut new_config: Config) -> Result<Config, ServiceError> {
    new_config.global_proxy_tlds = format_tlds(&new_config.global_proxy_tlds);
    new_config.mixed_proxy_tlds = format_tlds(&new_config.mixed_proxy_tlds);
    new_config.mixed_dns_tlds = format_tlds(&new_config.mixed_dns_tlds);

    for cc_tld in &mut new_config.typo_default_cc_tlds {
        cc_tld.tld = cc_tld.tld.trim().trim_matches('.').to_string();
    }

    for api in &mut new_config.register_apis {
        api.api_name = api.api_name.trim().to_string();
        api.api_url = api.api_url.split_whitespace().collect();
        api.success_text = api.success_text.iter().map(|t| t.trim().to_string()).collect();
        api.fail_text = api.fail_text.iter().map(|t| t.trim().to_string()).collect();
        if api.concurrency_limit == 0 {
            api.concurrency_limit = 1;
        }
    }

    for api in &mut new_config.whois_apis {
        api.api_name = api.api_name.trim().to_string();
        api.api_url = api.api_url.split_whitespace().collect();
        api.free_text = api.free_text.iter().map(|t| t.trim().to_string()).collect();
        api.taken_text = api.taken_text.iter().map(|t| t.trim().to_string()).collect();
        if api.concurrency_limit == 0 {
            api.concurrency_limit = 1;
        }
    }

    write_config(&new_config)?;
    set(new_config.clone());
    Ok(new_config)
}

/// Render the commented YAML template and overwrite the config file
/// atomically (write to a sibling temp file, then rename).
pub fn write_config(config: &Config) -> Result<(), ServiceError> {
    let path = match CONFIG_PATH.get() {
        Some(path) => path.clone(),
        None => default_path()?,
    };

    let body = render_template(config);
    let tmp_path = path.with_extension("yaml.tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(body.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, &path)?;

    tracing::debug!("New config written to {}", path.display());
    Ok(())
}

// A bare `Key:` is YAML null, which decodes into neither a String nor a
// Vec; empty strings are rendered as `""` and empty lists as `[]`.
fn yaml_scalar(value: &str) -> String {
    if value.is_empty() {
        "\"\"".to_string()
    } else {
        value.to_string()
    }
}

fn push_string_list(out: &mut String, key: &str, items: &[String]) {
    if items.is_empty() {
        out.push_str(&format!("{key}: []\n"));
        return;
    }
    out.push_str(&format!("{key}:\n"));
    out.push_str(&yaml_string_list(items, "    "));
}

fn yaml_string_list(items: &[String], indent: &str) -> String {
    items
        .iter()
        .map(|item| format!("{indent}- {item}\n"))
        .collect()
}

fn yaml_nested_list(items: &[String], indent: &str) -> String {
    if items.is_empty() {
        return format!("{indent}[]\n");
    }
    yaml_string_list(items, indent)
}

fn render_template(config: &Config) -> String {
    let mut out = String::new();

    out.push_str("# Setting the log level, available values are: Error, Warn, Info, Debug, Off\n");
    out.push_str(&format!("LogLevel: {}\n\n", yaml_scalar(&config.log_level)));

    out.push_str("# Setting authentication information\n");
    out.push_str(&format!("AuthUsername: {}\n", yaml_scalar(&config.auth_username)));
    out.push_str(&format!("AuthPassword: {}\n", yaml_scalar(&config.auth_password)));
    out.push_str(&format!("AuthExpireDays: {}\n", config.auth_expire_days));
    out.push_str(&format!("JwtSecretKey: {}\n\n", yaml_scalar(&config.jwt_secret_key)));

    out.push_str("# ------ Common settings ------\n");
    out.push_str("## Setting whois parameters\n");
    out.push_str(&format!("WhoisTimeout: {}\n\n", config.whois_timeout));
    out.push_str("## Setting DNS parameters\n");
    out.push_str(&format!("DnsTimeout: {}\n\n", config.dns_timeout));
    out.push_str("## Setting retry parameters\n");
    out.push_str(&format!("RetryOnTimeout: {}\n", config.retry_on_timeout));
    out.push_str(&format!("RetryInterval: {}\n", config.retry_interval));
    out.push_str(&format!("RetryMax: {}\n\n", config.retry_max));

    out.push_str("## The TLDs forced to go through proxy\n");
    push_string_list(&mut out, "GlobalProxyTlds", &config.global_proxy_tlds);
    out.push_str("\n## The TLDs forced to go through proxy in mixed query\n");
    push_string_list(&mut out, "MixedProxyTlds", &config.mixed_proxy_tlds);
    out.push_str("\n## The TLDs forced to go through DNS check in mixed query\n");
    push_string_list(&mut out, "MixedDnsTlds", &config.mixed_dns_tlds);

    out.push_str("\n## Setting proxy information\n");
    out.push_str(&format!("SocketProxyHost: {}\n", yaml_scalar(&config.socket_proxy_host)));
    out.push_str(&format!("SocketProxyPort: {}\n", config.socket_proxy_port));
    out.push_str(&format!("SocketProxyAuth: {}\n", config.socket_proxy_auth));
    out.push_str(&format!("SocketProxyUser: {}\n", yaml_scalar(&config.socket_proxy_user)));
    out.push_str(&format!(
        "SocketProxyPassword: {}\n\n",
        yaml_scalar(&config.socket_proxy_password)
    ));

    out.push_str("# ------ Bulk check settings ------\n");
    out.push_str(&format!(
        "BulkCheckConcurrencyLimit: {}\n\n",
        config.bulk_check_concurrency_limit
    ));

    out.push_str("# ------ Web check settings ------\n");
    out.push_str(&format!(
        "WebCheckConcurrencyLimit: {}\n",
        config.web_check_concurrency_limit
    ));
    out.push_str(&format!(
        "WebCheckDomainLimit: {}\n\n",
        config.web_check_domain_limit
    ));

    out.push_str("# ------ Typo check settings ------\n");
    if config.typo_default_cc_tlds.is_empty() {
        out.push_str("TypoDefaultCcTlds: []\n");
    } else {
        out.push_str("TypoDefaultCcTlds:\n");
        for cc_tld in &config.typo_default_cc_tlds {
            out.push_str(&format!("    - Tld: {}\n", yaml_scalar(&cc_tld.tld)));
            out.push_str(&format!("      IsSelected: {}\n", cc_tld.is_selected));
        }
    }
    out.push('\n');
    push_string_list(&mut out, "TypoCustomizedReplaces", &config.typo_customized_replaces);

    out.push_str("\n# ------ Register APIs ------\n");
    if config.register_apis.is_empty() {
        out.push_str("RegisterApis: []\n");
    } else {
        out.push_str("RegisterApis:\n");
        for api in &config.register_apis {
            out.push_str(&format!("    - ApiName: {}\n", yaml_scalar(&api.api_name)));
            out.push_str(&format!("      ApiUrl: {}\n", yaml_scalar(&api.api_url)));
            out.push_str("      SuccessText:\n");
            out.push_str(&yaml_nested_list(&api.success_text, "          "));
            out.push_str("      FailText:\n");
            out.push_str(&yaml_nested_list(&api.fail_text, "          "));
            out.push_str(&format!("      ConcurrencyLimit: {}\n", api.concurrency_limit));
        }
    }

    out.push_str("\n# ------ Whois APIs ------\n");
    if config.whois_apis.is_empty() {
        out.push_str("WhoisApis: []\n");
    } else {
        out.push_str("WhoisApis:\n");
        for api in &config.whois_apis {
            out.push_str(&format!("    - ApiName: {}\n", yaml_scalar(&api.api_name)));
            out.push_str(&format!("      ApiUrl: {}\n", yaml_scalar(&api.api_url)));
            out.push_str("      FreeText:\n");
            out.push_str(&yaml_nested_list(&api.free_text, "          "));
            out.push_str("      TakenText:\n");
            out.push_str(&yaml_nested_list(&api.taken_text, "          "));
            out.push_str(&format!("      ConcurrencyLimit: {}\n", api.concurrency_limit));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_template_parses_back_to_the_same_config() {
        let config = Config {
            log_level: "Debug".into(),
            global_proxy_tlds: vec!["cn".into(), "hk".into()],
            mixed_dns_tlds: vec!["de".into()],
            typo_default_cc_tlds: vec![CcTld {
                tld: "co".into(),
                is_selected: true,
            }],
            whois_apis: vec![WhoisApi {
                api_name: "myApi".into(),
                api_url: "https://api.example.com/check?domain={domain}".into(),
                free_text: vec!["available".into()],
                taken_text: vec!["registered".into()],
                concurrency_limit: 2,
            }],
            ..Config::default()
        };

        let rendered = render_template(&config);
        let parsed: Config = serde_yaml::from_str(&rendered).unwrap();

        assert_eq!(parsed.log_level, "Debug");
        assert_eq!(parsed.global_proxy_tlds, vec!["cn", "hk"]);
        assert_eq!(parsed.mixed_dns_tlds, vec!["de"]);
        assert_eq!(parsed.typo_default_cc_tlds.len(), 1);
        assert_eq!(parsed.whois_apis.len(), 1);
        assert_eq!(parsed.whois_apis[0].api_name, "myApi");
        assert_eq!(parsed.whois_apis[0].concurrency_limit, 2);
    }

    #[test]
    fn camel_case_field_names_round_trip_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"logLevel\""));
        assert!(json.contains("\"bulkCheckConcurrencyLimit\""));
        assert!(json.contains("\"socketProxyHost\""));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.whois_timeout, config.whois_timeout);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: Config = serde_yaml::from_str("LogLevel: Warn\n").unwrap();
        assert_eq!(parsed.log_level, "Warn");
        assert_eq!(parsed.whois_timeout, Config::default().whois_timeout);
    }
}
