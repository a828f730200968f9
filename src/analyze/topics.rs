// src/analyze/topics.rs
//! Topic buckets and the ordered classification table.
//!
//! Rules are evaluated in priority order against title + summary; the first
//! matching rule decides the bucket. No match → `MarketIndices`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Subject categories used for output diversity. Declaration order is the
/// priority order used both for classification and for diversity selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicBucket {
    MacroRates,
    GeopoliticsCommodities,
    TechAi,
    MarketIndices,
    EarningsMicro,
    Regulatory,
}

impl TopicBucket {
    pub const ALL: [TopicBucket; 6] = [
        TopicBucket::MacroRates,
        TopicBucket::GeopoliticsCommodities,
        TopicBucket::TechAi,
        TopicBucket::MarketIndices,
        TopicBucket::EarningsMicro,
        TopicBucket::Regulatory,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TopicBucket::MacroRates => "Macro/rates",
            TopicBucket::GeopoliticsCommodities => "Geopolitics/commodities",
            TopicBucket::TechAi => "Tech/AI",
            TopicBucket::MarketIndices => "Market indices",
            TopicBucket::EarningsMicro => "Earnings/micro",
            TopicBucket::Regulatory => "Regulatory",
        }
    }
}

/// Config shape for one classification rule (`[[topics]]` in curation.toml).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicRule {
    pub bucket: TopicBucket,
    pub pattern: String,
}

const DEFAULT_RULES: &[(TopicBucket, &str)] = &[
    (
        TopicBucket::MacroRates,
        r"\b(fed|federal reserve|fomc|powell|interest rates?|rate (hikes?|cuts?)|inflation|cpi|ppi|treasury yields?|bond yields?|central banks?|ecb|boe|boj|jobs report|payrolls|gdp|recession|unemployment|basis points|bps)\b",
    ),
    (
        TopicBucket::GeopoliticsCommodities,
        r"\b(war|sanctions?|tariffs?|trade war|opec\+?|oil|crude|brent|wti|gold|natural gas|copper|wheat|commodit(y|ies)|geopolitic\w*|china|russia|ukraine|middle east|iran|israel|taiwan)\b",
    ),
    (
        TopicBucket::TechAi,
        r"\b(ai|artificial intelligence|nvidia|chips?|chipmakers?|semiconductors?|openai|software|cloud|data cent(er|re)s?|big tech|tech stocks?)\b",
    ),
    (
        TopicBucket::MarketIndices,
        r"(\bs&p\b|\bs&p 500\b|\bdow\b|\bnasdaq\b|\brussell 2000\b|\bvix\b|\bwall street\b|\bstock futures\b|\bsell-?off\b|\brally\b|\bindex\b|\bindices\b)",
    ),
    (
        TopicBucket::EarningsMicro,
        r"\b(earnings|revenue|profit|guidance|quarterly|eps|results|merger|acquisition|acquires?|ipo|buyback|dividend|layoffs?|ceo)\b",
    ),
    (
        TopicBucket::Regulatory,
        r"\b(sec|regulators?|regulation|regulatory|antitrust|lawsuit|ftc|doj|fined?|probe|investigation|compliance|legislation|congress|senate|bill)\b",
    ),
];

/// Ordered `(regex, bucket)` table, first match wins.
#[derive(Debug, Clone)]
pub struct TopicClassifier {
    rules: Vec<(Regex, TopicBucket)>,
}

static DEFAULT_CLASSIFIER: Lazy<TopicClassifier> = Lazy::new(|| {
    let rules = DEFAULT_RULES
        .iter()
        .map(|(bucket, pattern)| TopicRule {
            bucket: *bucket,
            pattern: (*pattern).to_string(),
        })
        .collect::<Vec<_>>();
    TopicClassifier::from_rules(&rules).expect("default topic rules compile")
});

impl Default for TopicClassifier {
    fn default() -> Self {
        DEFAULT_CLASSIFIER.clone()
    }
}

impl TopicClassifier {
    /// Compile rules in the given order. Patterns are matched case-insensitively.
    pub fn from_rules(rules: &[TopicRule]) -> anyhow::Result<Self> {
        let rules = rules
            .iter()
            .map(|r| {
                let re = Regex::new(&format!("(?i){}", r.pattern)).map_err(|e| {
                    anyhow::anyhow!("topic rule for `{}` regex error: {}", r.bucket.label(), e)
                })?;
                Ok((re, r.bucket))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn classify(&self, text: &str) -> TopicBucket {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, bucket)| *bucket)
            .unwrap_or(TopicBucket::MarketIndices)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> TopicBucket {
        TopicClassifier::default().classify(text)
    }

    #[test]
    fn each_bucket_matches_in_isolation() {
        assert_eq!(classify("Fed signals patience on rate cuts"), TopicBucket::MacroRates);
        assert_eq!(classify("OPEC+ extends crude output curbs"), TopicBucket::GeopoliticsCommodities);
        assert_eq!(classify("Nvidia unveils new AI accelerator"), TopicBucket::TechAi);
        assert_eq!(classify("Dow closes at record high"), TopicBucket::MarketIndices);
        assert_eq!(classify("Costco beats on quarterly revenue"), TopicBucket::EarningsMicro);
        assert_eq!(classify("SEC opens probe into crypto exchange"), TopicBucket::Regulatory);
    }

    #[test]
    fn first_match_wins() {
        // Mentions both inflation (macro) and oil (geopolitics); macro has priority.
        assert_eq!(classify("Oil spike feeds inflation fears"), TopicBucket::MacroRates);
        // Tech before earnings.
        assert_eq!(classify("Nvidia earnings smash estimates"), TopicBucket::TechAi);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(classify("FEDERAL RESERVE HOLDS"), TopicBucket::MacroRates);
        assert_eq!(classify("s&p 500 slips"), TopicBucket::MarketIndices);
    }

    #[test]
    fn no_match_defaults_to_market_indices() {
        assert_eq!(classify("Local bakery wins award"), TopicBucket::MarketIndices);
        assert_eq!(classify(""), TopicBucket::MarketIndices);
    }

    #[test]
    fn word_boundaries_avoid_false_hits() {
        // "said" contains "ai", "fedora" contains "fed".
        assert_eq!(classify("Designer said fedora sales doubled"), TopicBucket::MarketIndices);
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let c = TopicClassifier::from_rules(&[TopicRule {
            bucket: TopicBucket::Regulatory,
            pattern: r"\bbakery\b".into(),
        }])
        .unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.classify("Local BAKERY wins award"), TopicBucket::Regulatory);
        assert_eq!(c.classify("Fed hikes"), TopicBucket::MarketIndices);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = TopicClassifier::from_rules(&[TopicRule {
            bucket: TopicBucket::TechAi,
            pattern: "(unclosed".into(),
        }]);
        assert!(err.is_err());
    }

    #[test]
    fn labels_are_stable() {
        let labels: Vec<_> = TopicBucket::ALL.iter().map(|b| b.label()).collect();
        assert_eq!(labels[0], "Macro/rates");
        assert_eq!(labels[5], "Regulatory");
    }
}
