// src/config/llm.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

fn default_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}
fn default_model() -> String {
    "Qwen3-4B-Instruct-2507".to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    800
}

/// Classification backend configuration, loadable from `config/llm.json`
/// or assembled from `LLM_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// true = deterministic offline fallback, no network.
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from LLM_API_KEY.
    #[serde(default)]
    pub api_key: String,
    /// Per-attempt request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Ask the endpoint for JSON-constrained output.
    #[serde(default = "default_true")]
    pub json_mode: bool,
    /// Additional attempts after the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Linear backoff base in milliseconds (attempt index x base).
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("all LlmConfig fields have defaults")
    }
}

impl LlmConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: LlmConfig = serde_json::from_str(&data)?;

        // Resolve api key if "ENV"
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = env::var("LLM_API_KEY")
                .map_err(|_| anyhow::anyhow!("Missing LLM_API_KEY env var"))?;
        }

        cfg.sanitize();
        Ok(cfg)
    }

    /// Assemble from `LLM_*` environment variables with the same defaults
    /// the original deployment used. Unset variables keep their defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("LLM_DRY_RUN") {
            cfg.dry_run = v.to_lowercase() == "true";
        }
        if let Ok(v) = env::var("LLM_BASE_URL") {
            cfg.base_url = v;
        }
        if let Ok(v) = env::var("LLM_MODEL") {
            cfg.model = v;
        }
        if let Ok(v) = env::var("LLM_API_KEY") {
            cfg.api_key = v;
        }
        if let Ok(v) = env::var("LLM_TIMEOUT") {
            if let Ok(n) = v.parse() {
                cfg.timeout_secs = n;
            }
        }
        if let Ok(v) = env::var("LLM_JSON_MODE") {
            cfg.json_mode = v.to_lowercase() == "true";
        }
        cfg.sanitize();
        cfg
    }

    fn sanitize(&mut self) {
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout();
        }
        if self.base_url.trim().is_empty() {
            self.base_url = default_base_url();
        }
    }
}
