use config::{Config, ConfigError, File as ConfigFile};
use serde::Deserialize;

/// Advisor (escalated classification) settings. The core never reads these
/// from the environment itself — the CLI resolves the API key and hands the
/// finished config in.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_advisor_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub api_url: String,
    #[serde(default = "default_advisor_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Call-count ceiling per session; None means uncapped.
    #[serde(default = "default_max_calls")]
    pub max_calls_per_session: Option<u32>,
    /// Monetary ceiling per session in USD; None means uncapped.
    #[serde(default = "default_max_spend")]
    pub max_spend_per_session_usd: Option<f64>,
    /// Projected cost of one advisor call, used when reserving capacity
    /// before the actual cost is known.
    #[serde(default = "default_call_cost")]
    pub estimated_call_cost_usd: f64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        AdvisorConfig {
            enabled: default_advisor_enabled(),
            api_url: String::new(),
            model: default_advisor_model(),
            batch_size: default_batch_size(),
            max_calls_per_session: default_max_calls(),
            max_spend_per_session_usd: default_max_spend(),
            estimated_call_cost_usd: default_call_cost(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            pause_poll_ms: default_pause_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_backup_root")]
    pub backup_root: String,
    /// Paths that are never cleaned regardless of rule outcome; forced to
    /// the dangerous tier and never escalated.
    #[serde(default)]
    pub protected_paths: Vec<String>,
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: i64,
    #[serde(default = "default_undo_window_days")]
    pub undo_window_days: i64,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: default_database_path(),
            backup_root: default_backup_root(),
            protected_paths: Vec::new(),
            backup_retention_days: default_backup_retention_days(),
            undo_window_days: default_undo_window_days(),
            advisor: AdvisorConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

fn default_database_path() -> String {
    "safe_sweeper.db".to_string()
}

fn default_backup_root() -> String {
    "./backups".to_string()
}

fn default_backup_retention_days() -> i64 {
    7
}

fn default_undo_window_days() -> i64 {
    30
}

fn default_advisor_enabled() -> bool {
    true
}

fn default_advisor_model() -> String {
    "glm-4-flash".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_max_calls() -> Option<u32> {
    Some(100)
}

fn default_max_spend() -> Option<f64> {
    Some(2.0)
}

fn default_call_cost() -> f64 {
    0.025
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_pause_poll_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.advisor.batch_size, 50);
        assert_eq!(cfg.execution.max_retries, 3);
        assert_eq!(cfg.backup_retention_days, 7);
        assert_eq!(cfg.undo_window_days, 30);
        assert!(cfg.protected_paths.is_empty());
    }
}
