// src/analyze/keywords.rs
//! Macro/market keyword booster.
//!
//! Counts *distinct* keyword phrases present in title + summary (case-insensitive,
//! whole-word), caps the count, and turns it into an additive boost that the
//! scoring engine applies as `(1 + boost)`.

use regex::Regex;

pub const DEFAULT_PER_KEYWORD_BOOST: f64 = 0.1;
pub const DEFAULT_KEYWORD_CAP: usize = 3;

pub fn default_macro_keywords() -> Vec<String> {
    [
        "federal reserve",
        "fed",
        "fomc",
        "interest rate",
        "rate cut",
        "rate hike",
        "inflation",
        "cpi",
        "gdp",
        "jobs report",
        "payrolls",
        "unemployment",
        "treasury",
        "yields",
        "recession",
        "central bank",
        "tariff",
        "tariffs",
        "opec",
        "oil prices",
        "s&p 500",
        "nasdaq",
        "dow",
        "stimulus",
        "earnings",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct MacroKeywords {
    patterns: Vec<(String, Regex)>,
    per_keyword: f64,
    cap: usize,
}

impl Default for MacroKeywords {
    fn default() -> Self {
        Self::new(
            &default_macro_keywords(),
            DEFAULT_PER_KEYWORD_BOOST,
            DEFAULT_KEYWORD_CAP,
        )
    }
}

impl MacroKeywords {
    /// Blank and repeated phrases are ignored.
    pub fn new(keywords: &[String], per_keyword: f64, cap: usize) -> Self {
        let mut patterns: Vec<(String, Regex)> = Vec::with_capacity(keywords.len());
        for kw in keywords {
            let kw = kw.trim().to_lowercase();
            if kw.is_empty() || patterns.iter().any(|(k, _)| *k == kw) {
                continue;
            }
            // Escaped literal, so compilation cannot fail on user input.
            if let Ok(re) = Regex::new(&format!(r"(?i)(^|\W){}($|\W)", regex::escape(&kw))) {
                patterns.push((kw, re));
            }
        }
        let per_keyword = if per_keyword.is_finite() {
            per_keyword.max(0.0)
        } else {
            DEFAULT_PER_KEYWORD_BOOST
        };
        Self {
            patterns,
            per_keyword,
            cap,
        }
    }

    /// Distinct keyword phrases found in `text`, in table order.
    pub fn distinct_matches(&self, text: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(kw, _)| kw.as_str())
            .collect()
    }

    pub fn boost(&self, text: &str) -> f64 {
        let n = self.distinct_matches(text).len().min(self.cap);
        n as f64 * self.per_keyword
    }

    pub fn max_boost(&self) -> f64 {
        self.cap as f64 * self.per_keyword
    }
}
