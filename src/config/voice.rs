// src/config/voice.rs
//! Brand voice: reply tone guidance plus the banned-term list the guardrail
//! engine scans drafted replies against. Supplied per session by an
//! operator; loadable from TOML or JSON with a built-in seed fallback.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "BRAND_VOICE_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandVoice {
    #[serde(default = "default_tone")]
    pub tone: String,
    /// Case-insensitive substrings a drafted reply must not contain.
    #[serde(default)]
    pub banned: Vec<String>,
}

fn default_tone() -> String {
    "warm, professional, concise".to_string()
}

impl Default for BrandVoice {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl BrandVoice {
    /// Built-in seed used when no config file is present.
    pub fn default_seed() -> Self {
        Self {
            tone: default_tone(),
            banned: vec![
                "guarantee".to_string(),
                "free forever".to_string(),
                "100%".to_string(),
            ],
        }
    }

    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading brand voice from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_voice(&content, ext.as_str()).map(Self::cleaned)
    }

    /// Load using env var + fallbacks:
    /// 1) $BRAND_VOICE_PATH
    /// 2) config/brand_voice.toml
    /// 3) config/brand_voice.json
    /// 4) built-in seed
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("BRAND_VOICE_PATH points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/brand_voice.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/brand_voice.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default_seed())
    }

    /// Trim entries and drop empties, preserving order.
    fn cleaned(mut self) -> Self {
        self.banned = self
            .banned
            .into_iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        self
    }
}

fn parse_voice(s: &str, hint_ext: &str) -> Result<BrandVoice> {
    if hint_ext == "toml" {
        if let Ok(v) = toml::from_str::<BrandVoice>(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = serde_json::from_str::<BrandVoice>(s) {
        return Ok(v);
    }
    if hint_ext != "toml" {
        if let Ok(v) = toml::from_str::<BrandVoice>(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported brand voice format"))
}
