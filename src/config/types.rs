use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub bind_address: String,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    pub logging: LoggingConfig,
}

/// Where the remote identity service lives.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct IdentityConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
}

/// Credential persistence and session query behaviour.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SessionConfig {
    /// Key the credential is stored under in the key-value medium.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Name of the auth cookie, shared with the route guard.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Freshness window of the cached identity.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Try `/auth/refresh` once before treating a 401 as a logout.
    #[serde(default)]
    pub refresh_on_unauthorized: bool,
    /// Durable key-value file used by client-side sessions.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
}

impl SessionConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 24 * 60 * 60)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            storage_key: default_storage_key(),
            cookie_name: default_cookie_name(),
            retention_days: default_retention_days(),
            stale_after_secs: default_stale_after_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            refresh_on_unauthorized: false,
            storage_path: default_storage_path(),
        }
    }
}

/// Paths the route guard and the page shell agree on.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct RoutesConfig {
    #[serde(default = "default_sign_in_path")]
    pub sign_in: String,
    #[serde(default = "default_sign_up_path")]
    pub sign_up: String,
    #[serde(default = "default_dashboard_path")]
    pub dashboard: String,
    #[serde(default = "default_oauth_callback_path")]
    pub oauth_callback: String,
    #[serde(default = "default_protected")]
    pub protected: Vec<String>,
    /// Query parameter carrying the original path through sign-in.
    #[serde(default = "default_callback_param")]
    pub callback_param: String,
    /// Query parameters that mark a request as an OAuth return leg.
    #[serde(default = "default_oauth_evidence")]
    pub oauth_evidence: Vec<String>,
}

impl RoutesConfig {
    pub fn auth_entry(&self) -> [&str; 2] {
        [self.sign_in.as_str(), self.sign_up.as_str()]
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        RoutesConfig {
            sign_in: default_sign_in_path(),
            sign_up: default_sign_up_path(),
            dashboard: default_dashboard_path(),
            oauth_callback: default_oauth_callback_path(),
            protected: default_protected(),
            callback_param: default_callback_param(),
            oauth_evidence: default_oauth_evidence(),
        }
    }
}

fn default_timeout_in_ms() -> u64 {
    10_000
}
fn default_storage_key() -> String {
    "auth_token".to_string()
}
fn default_cookie_name() -> String {
    "auth_token".to_string()
}
fn default_retention_days() -> u32 {
    7
}
fn default_stale_after_secs() -> u64 {
    5 * 60
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    1000
}
fn default_storage_path() -> PathBuf {
    PathBuf::from("./.authgate/storage.json")
}
fn default_sign_in_path() -> String {
    "/auth/signin".to_string()
}
fn default_sign_up_path() -> String {
    "/auth/signup".to_string()
}
fn default_dashboard_path() -> String {
    "/dashboard".to_string()
}
fn default_oauth_callback_path() -> String {
    "/auth/callback".to_string()
}
fn default_protected() -> Vec<String> {
    vec!["/dashboard".to_string(), "/profile".to_string()]
}
fn default_callback_param() -> String {
    "callbackUrl".to_string()
}
fn default_oauth_evidence() -> Vec<String> {
    vec!["code".to_string(), "token".to_string()]
}

/// Extracts a `ConfigV1` from an already assembled figment.
pub fn extract_config(figment: Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from `path` (default "./config.yaml"), with `AUTHGATE_`
/// environment overrides, e.g. `AUTHGATE_IDENTITY__BASE_URL`.
pub fn load_config(path: Option<&str>) -> ConfigV1 {
    let figment = Figment::new()
        .merge(Yaml::file(path.unwrap_or("./config.yaml")))
        .merge(Env::prefixed("AUTHGATE_").split("__"));
    match extract_config(figment) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
