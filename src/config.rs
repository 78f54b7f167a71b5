use serde::{Deserialize, Serialize};
use std::fs;

use crate::retry::RetryPolicy;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// PostgreSQL connection URL for the store-backed aggregates
    #[serde(default)]
    pub postgres_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LockConfig {
    pub timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// Retry bounds per resource class.
///
/// Coupon issuance is comparatively low-contention (the keyed mutex front
/// absorbs most in-process races); stock and balance paths see bursty CAS
/// conflicts and get the large jittered profile.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    pub coupon: RetryPolicy,
    pub stock: RetryPolicy,
    pub balance: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            coupon: RetryPolicy::low_contention(),
            stock: RetryPolicy::high_contention(),
            balance: RetryPolicy::high_contention(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
