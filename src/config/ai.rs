// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";

fn default_timeout_ms() -> u64 {
    12_000
}
fn default_connect_timeout_ms() -> u64 {
    4_000
}
fn default_max_tokens() -> u32 {
    1_200
}
fn default_temperature() -> f32 {
    0.2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "openai" | "anthropic" (case-insensitive; "claude" is accepted as an alias)
    pub provider: String,
    /// Empty → provider default.
    #[serde(default)]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY / ANTHROPIC_API_KEY (by provider)
    #[serde(default)]
    pub api_key: String,
    /// Scheme + host of the provider API; `None` → the provider's public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".into(),
            model: String::new(),
            api_key: String::new(),
            base_url: None,
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AiConfig = serde_json::from_str(data)?;

        // Normalize provider
        cfg.provider = match cfg.provider.trim().to_lowercase().as_str() {
            "claude" => "anthropic".to_string(),
            other => other.to_string(),
        };

        // Resolve api key if "ENV"; a disabled config never needs one.
        if cfg.enabled && cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                "anthropic" => env::var("ANTHROPIC_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing ANTHROPIC_API_KEY env var"))?,
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        cfg.base_url = cfg
            .base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());

        if cfg.timeout_ms == 0 {
            cfg.timeout_ms = default_timeout_ms();
        }
        if cfg.connect_timeout_ms == 0 || cfg.connect_timeout_ms > cfg.timeout_ms {
            cfg.connect_timeout_ms = cfg.timeout_ms.min(default_connect_timeout_ms());
        }
        if !(0.0..=2.0).contains(&cfg.temperature) {
            cfg.temperature = default_temperature();
        }

        Ok(cfg)
    }

    /// `$AI_CONFIG_PATH` or `config/ai.json`; a missing or broken file means AI disabled.
    pub fn load_default() -> Self {
        let path = env::var(ENV_AI_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_AI_CONFIG_PATH.into());
        match Self::load_from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "AI config not loaded; arbitration disabled");
                Self::default()
            }
        }
    }
}
