use crate::errors::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Immutable engine configuration, loaded once at startup and passed into
/// each component by value. Secrets (API keys) never live here; the CLI
/// reads them from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub version: u32,
    #[serde(default)]
    pub api: ApiSettings,
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub judge: JudgeSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://memory.sension.torus.directory/api".into(),
            page_limit: default_page_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    pub endpoint: String,
    /// Curated permission whose recipient weights this engine sets.
    pub permission_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeSettings {
    #[serde(default = "default_judge_base_url")]
    pub base_url: String,
    #[serde(default = "default_judge_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Weights for the seven quality dimensions; weighted average of the
    /// judge's per-dimension scores becomes the 0-100 submission score.
    #[serde(default = "default_dimension_weights")]
    pub dimension_weights: BTreeMap<String, f64>,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            base_url: default_judge_base_url(),
            model: default_judge_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            dimension_weights: default_dimension_weights(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    #[serde(default = "default_min_score")]
    pub min_score: u8,
    #[serde(default = "default_max_score")]
    pub max_score: u8,
    /// Base penalty magnitude P.
    #[serde(default = "default_penalty_base")]
    pub penalty_base: f64,
    /// Escalation factor r; each additional invalid submission costs more
    /// than the last.
    #[serde(default = "default_penalty_escalation")]
    pub penalty_escalation: f64,
    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,
    #[serde(default = "default_quantity_weight")]
    pub quantity_weight: f64,
    /// Submissions sampled per address per validation round.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Concurrent judge calls per validator batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Fixed RNG seed for reproducible sampling; None draws from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_score: default_max_score(),
            penalty_base: default_penalty_base(),
            penalty_escalation: default_penalty_escalation(),
            quality_weight: default_quality_weight(),
            quantity_weight: default_quantity_weight(),
            sample_size: default_sample_size(),
            batch_size: default_batch_size(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Fetch floor for the very first iteration.
    #[serde(default = "default_initial_start_date")]
    pub initial_start_date: DateTime<Utc>,
    #[serde(default = "default_iteration_interval_secs")]
    pub iteration_interval_secs: u64,
    /// Fetch window for automated validation rounds.
    #[serde(default = "default_validation_lookback_hours")]
    pub validation_lookback_hours: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            initial_start_date: default_initial_start_date(),
            iteration_interval_secs: default_iteration_interval_secs(),
            validation_lookback_hours: default_validation_lookback_hours(),
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
            multiplier: default_retry_multiplier(),
        }
    }
}

fn default_page_limit() -> u32 {
    1000
}
fn default_judge_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_judge_model() -> String {
    "google/gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    400
}
fn default_min_score() -> u8 {
    0
}
fn default_max_score() -> u8 {
    100
}
fn default_penalty_base() -> f64 {
    0.1
}
fn default_penalty_escalation() -> f64 {
    1.5
}
fn default_quality_weight() -> f64 {
    0.6
}
fn default_quantity_weight() -> f64 {
    0.4
}
fn default_sample_size() -> usize {
    10
}
fn default_batch_size() -> usize {
    16
}
fn default_initial_start_date() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-08-25T00:00:00+00:00")
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
fn default_iteration_interval_secs() -> u64 {
    3600
}
fn default_validation_lookback_hours() -> u64 {
    48
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    2000
}
fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_dimension_weights() -> BTreeMap<String, f64> {
    [
        ("consequentiality", 0.25),
        ("actionability", 0.15),
        ("foresightedness", 0.2),
        ("resolution_clarity", 0.2),
        ("verifiability", 0.1),
        ("conviction", 0.06),
        ("temporal_horizon", 0.04),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    let cfg: EngineConfig = serde_yaml::from_str(&raw)
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &EngineConfig) -> Result<(), ConfigError> {
    if cfg.ledger.permission_id.trim().is_empty() {
        return Err(ConfigError("ledger.permission_id is empty".into()));
    }
    if cfg.ledger.endpoint.trim().is_empty() {
        return Err(ConfigError("ledger.endpoint is empty".into()));
    }
    let s = &cfg.scoring;
    if s.min_score >= s.max_score {
        return Err(ConfigError(format!(
            "scoring.min_score {} must be below scoring.max_score {}",
            s.min_score, s.max_score
        )));
    }
    if s.penalty_base < 0.0 {
        return Err(ConfigError("scoring.penalty_base is negative".into()));
    }
    if s.penalty_escalation < 1.0 {
        return Err(ConfigError(
            "scoring.penalty_escalation must be >= 1.0 (penalties never shrink)".into(),
        ));
    }
    if s.quality_weight < 0.0
        || s.quantity_weight < 0.0
        || s.quality_weight + s.quantity_weight <= 0.0
    {
        return Err(ConfigError(
            "scoring quality/quantity weights must be non-negative with a positive sum".into(),
        ));
    }
    if s.sample_size == 0 {
        return Err(ConfigError("scoring.sample_size must be positive".into()));
    }
    if s.batch_size == 0 {
        return Err(ConfigError("scoring.batch_size must be positive".into()));
    }
    let w = &cfg.judge.dimension_weights;
    if w.is_empty() || w.values().any(|v| *v < 0.0) {
        return Err(ConfigError(
            "judge.dimension_weights must be non-empty and non-negative".into(),
        ));
    }
    Ok(())
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"version: 1
api:
  base_url: "https://memory.sension.torus.directory/api"
  page_limit: 1000
ledger:
  endpoint: "https://ledger.example.org/rpc"
  permission_id: "0x1f1eea5d5c8d1dc5648bba790eedcc04ab3510dfd6cd035b99e9b1651aa02099"
judge:
  model: "google/gemini-2.5-flash"
scoring:
  penalty_base: 0.1
  penalty_escalation: 1.5
  quality_weight: 0.6
  quantity_weight: 0.4
  sample_size: 10
  batch_size: 16
schedule:
  iteration_interval_secs: 3600
  validation_lookback_hours: 48
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
