//! # Source Credibility
//!
//! Maps outlet names (e.g. "Reuters", "The Wall Street Journal") to a
//! credibility weight in `[0.0, 1.0]`.
//!
//! - Loads from JSON (`default_weight` + `weights` table), falling back to a
//!   built-in seed when the file is missing or malformed.
//! - Lookup order: exact key → case-insensitive substring in either direction
//!   (longest key wins) → default.

use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};
use tracing::warn;

pub const DEFAULT_SOURCE_CREDIBILITY_PATH: &str = "config/source_credibility.json";
pub const ENV_SOURCE_CREDIBILITY_PATH: &str = "SOURCE_CREDIBILITY_PATH";

/// Credibility table, loaded from JSON or the built-in seed.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceCredibility {
    /// Weight used when no entry matches.
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    /// Outlet name → weight.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

fn default_default_weight() -> f64 {
    0.50
}

impl Default for SourceCredibility {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceCredibility {
    /// Load from a JSON file. Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "credibility table unparsable, using seed");
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    /// `$SOURCE_CREDIBILITY_PATH` or `config/source_credibility.json`.
    pub fn load_default() -> Self {
        let path = std::env::var(ENV_SOURCE_CREDIBILITY_PATH)
            .unwrap_or_else(|_| DEFAULT_SOURCE_CREDIBILITY_PATH.to_string());
        Self::load_from_file(path)
    }

    pub fn weight_for(&self, source: &str) -> f64 {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return clamp01(self.default_weight);
        }

        if let Some(&w) = self.weights.get(trimmed) {
            return clamp01(w);
        }

        let s = normalize(trimmed);
        let mut best: Option<(usize, f64)> = None;
        for (k, &w) in &self.weights {
            let key = normalize(k);
            if key.is_empty() {
                continue;
            }
            if s.contains(&key) || key.contains(&s) {
                let better = match best {
                    Some((len, _)) => key.len() > len,
                    None => true,
                };
                if better {
                    best = Some((key.len(), w));
                }
            }
        }
        if let Some((_, w)) = best {
            return clamp01(w);
        }

        clamp01(self.default_weight)
    }

    /// Built-in seed of common financial and general news outlets.
    pub fn default_seed() -> Self {
        let mut weights = BTreeMap::new();
        for (k, v) in [
            ("Reuters", 0.95),
            ("Bloomberg", 0.95),
            ("Associated Press", 0.90),
            ("Wall Street Journal", 0.90),
            ("WSJ", 0.90),
            ("Financial Times", 0.90),
            ("The Economist", 0.85),
            ("New York Times", 0.85),
            ("CNBC", 0.80),
            ("Barron's", 0.80),
            ("MarketWatch", 0.75),
            ("Axios", 0.75),
            ("Business Insider", 0.65),
            ("Yahoo Finance", 0.65),
            ("Benzinga", 0.60),
            ("Seeking Alpha", 0.55),
            ("Motley Fool", 0.50),
        ] {
            weights.insert(k.to_string(), v);
        }
        Self {
            default_weight: default_default_weight(),
            weights,
        }
    }
}

/// Lowercase and collapse whitespace.
fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
