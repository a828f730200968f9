// src/analyze/arbitrator.rs
//! Model arbitration over the diversified shortlist.
//!
//! Protocol:
//! 1. Enumerate every shortlist entry with an explicit zero-based index.
//! 2. Ask the model for strict JSON selecting indices (schema embedded in the prompt).
//! 3. Strip incidental wrappers, parse strictly, validate each selection against
//!    the shortlist, and map it back to a concrete candidate.
//!
//! The model response is untrusted input. Unknown top-level keys reject the whole
//! response. Inside `selections`, unknown keys are ignored and malformed items,
//! out-of-range or repeated indices are dropped per item; only an empty result is
//! a failure.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::ai_adapter::{ArbitrationError, DynProvider};
use super::fallback::{clamp_confidence, synthesized_rationale};
use super::scoring::ScoredCandidate;
use super::topics::TopicBucket;
use crate::candidate::parse_timestamp;
use crate::headline::FinalHeadline;

const SUMMARY_PROMPT_CHARS: usize = 400;
const RATIONALE_MAX_CHARS: usize = 240;
const FIELD_MAX_CHARS: usize = 400;

/// Expected model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ArbitrationResponse {
    /// Selected stories, most important first.
    #[serde(deserialize_with = "lenient_selections")]
    pub selections: Vec<Selection>,
    /// One or two sentences on the overall selection.
    #[serde(default)]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Selection {
    /// Zero-based index into the enumerated candidate list.
    pub index: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    /// Short, grounded explanation of why the story matters to markets.
    #[serde(default)]
    pub why_it_matters: Option<String>,
    /// 0.0 to 1.0
    #[serde(default)]
    pub confidence: Option<f64>,
}

const SELECTION_FIELDS: &[&str] = &[
    "index",
    "title",
    "source",
    "url",
    "published_at",
    "why_it_matters",
    "confidence",
];

/// Per-item parsing: extra keys are stripped, items that still fail are dropped.
fn lenient_selections<'de, D>(de: D) -> Result<Vec<Selection>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Vec<serde_json::Value> = Vec::deserialize(de)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(position, mut item)| {
            if let Some(obj) = item.as_object_mut() {
                let extra: Vec<String> = obj
                    .keys()
                    .filter(|k| !SELECTION_FIELDS.contains(&k.as_str()))
                    .cloned()
                    .collect();
                if !extra.is_empty() {
                    warn!(target: "curation", position, ?extra, "ignoring unknown selection fields");
                    obj.retain(|k, _| SELECTION_FIELDS.contains(&k.as_str()));
                }
            }
            match serde_json::from_value::<Selection>(item) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    warn!(target: "curation", position, error = %e, "dropping malformed selection");
                    None
                }
            }
        })
        .collect())
}

/// Validated arbitration output.
#[derive(Debug, Clone, PartialEq)]
pub struct Arbitration {
    pub headlines: Vec<FinalHeadline>,
    pub rationale: Option<String>,
    /// Selections rejected during validation.
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub struct Arbitrator {
    provider: DynProvider,
    max_selections: usize,
}

impl Arbitrator {
    pub fn new(provider: DynProvider, max_selections: usize) -> Self {
        Self {
            provider,
            max_selections,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn arbitrate(
        &self,
        shortlist: &[ScoredCandidate],
    ) -> Result<Arbitration, ArbitrationError> {
        if shortlist.is_empty() || self.max_selections == 0 {
            return Err(ArbitrationError::NoValidSelections);
        }

        let prompt = build_prompt(shortlist, self.max_selections);
        let prompt_id = fingerprint(&prompt.user);
        info!(
            target: "curation",
            %prompt_id,
            provider = self.provider.name(),
            shortlist = shortlist.len(),
            "requesting model arbitration"
        );

        let raw = self.provider.complete(&prompt.system, &prompt.user).await?;
        let parsed = parse_response(&raw)?;
        let out = validate_selections(parsed, shortlist, self.max_selections)?;

        info!(
            target: "curation",
            %prompt_id,
            selected = out.headlines.len(),
            dropped = out.dropped,
            "model arbitration accepted"
        );
        Ok(out)
    }
}

/// Short SHA-256 prefix for correlating logs without logging article text.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub fn build_prompt(shortlist: &[ScoredCandidate], pick: usize) -> Prompt {
    let pick = pick.min(shortlist.len());
    let schema = schemars::schema_for!(ArbitrationResponse);
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_default();
    let categories = TopicBucket::ALL
        .iter()
        .map(|b| b.label())
        .collect::<Vec<_>>()
        .join(", ");

    let system = format!(
        r#"You are the senior editor of a markets briefing.
From the numbered candidate stories, select exactly the {pick} most important for investors today.
Rules:
- Select stories only by their index number from the list. Never invent stories.
- Use only facts present in the supplied title and summary. Do not add numbers, names or events that are not in the text.
- Ensure topical diversity across these categories where the candidates allow it: {categories}.
- Cite each selection by its index and give a one-sentence, grounded "why_it_matters".
- Return strictly valid JSON conforming to the schema below. No markdown, no code fences, no commentary.

JSON Schema:
{schema_json}
"#
    );

    let mut user = format!(
        "Candidate stories ({} total, indices 0..{}):\n\n",
        shortlist.len(),
        shortlist.len().saturating_sub(1)
    );
    for (i, c) in shortlist.iter().enumerate() {
        let cand = &c.candidate;
        let summary = cand
            .summary
            .as_deref()
            .map(|s| one_line(&html_escape::decode_html_entities(s), SUMMARY_PROMPT_CHARS))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "(none)".to_string());
        user.push_str(&format!(
            "[{i}] {title}\n    source: {source} | published: {published} | url: {url}\n    summary: {summary}\n    topic: {topic} | score {score:.3} (recency {rec:.2}, credibility {cred:.2}, macro boost {boost:.1}, base relevance {rel:.2})\n\n",
            title = one_line(&html_escape::decode_html_entities(&cand.title), FIELD_MAX_CHARS),
            source = one_line(&cand.source, FIELD_MAX_CHARS),
            published = cand.published_at.trim(),
            url = cand.url.trim(),
            topic = c.topic_bucket.label(),
            score = c.score,
            rec = c.recency_score,
            cred = c.credibility_score,
            boost = c.macro_boost,
            rel = cand.base_relevance(),
        ));
    }
    user.push_str(&format!(
        "Return JSON with exactly {pick} selections, each citing a valid index."
    ));

    Prompt { system, user }
}

/// Remove code fences and any text around the outermost JSON object.
pub fn strip_wrapper(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string ("json") on the fence line.
        s = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        s = s.trim_end();
        s = s.strip_suffix("```").unwrap_or(s).trim();
    }
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => s,
    }
}

pub fn parse_response(raw: &str) -> Result<ArbitrationResponse, ArbitrationError> {
    let body = strip_wrapper(raw);
    if body.is_empty() {
        return Err(ArbitrationError::EmptyCompletion);
    }
    Ok(serde_json::from_str(body)?)
}

/// Map selections onto the shortlist. Fails only when nothing valid remains.
pub fn validate_selections(
    resp: ArbitrationResponse,
    shortlist: &[ScoredCandidate],
    max: usize,
) -> Result<Arbitration, ArbitrationError> {
    let mut seen = HashSet::new();
    let mut headlines = Vec::with_capacity(max.min(resp.selections.len()));
    let mut dropped = 0usize;

    for sel in resp.selections {
        if headlines.len() >= max {
            dropped += 1;
            continue;
        }
        let idx = match usize::try_from(sel.index) {
            Ok(i) if i < shortlist.len() => i,
            _ => {
                warn!(
                    target: "curation",
                    index = sel.index,
                    shortlist = shortlist.len(),
                    "dropping out-of-range selection"
                );
                dropped += 1;
                continue;
            }
        };
        if !seen.insert(idx) {
            warn!(target: "curation", index = idx, "dropping repeated selection");
            dropped += 1;
            continue;
        }
        headlines.push(headline_from_selection(idx, &shortlist[idx], sel));
    }

    if headlines.is_empty() {
        return Err(ArbitrationError::NoValidSelections);
    }

    let rationale = resp
        .rationale
        .map(|r| one_line(&r, RATIONALE_MAX_CHARS))
        .filter(|r| !r.is_empty());

    Ok(Arbitration {
        headlines,
        rationale,
        dropped,
    })
}

fn headline_from_selection(idx: usize, c: &ScoredCandidate, sel: Selection) -> FinalHeadline {
    let cand = &c.candidate;
    let published_at = sel
        .published_at
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| cand.parsed_published())
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| cand.published_at.clone());
    let why_it_matters = sel
        .why_it_matters
        .map(|w| one_line(&w, RATIONALE_MAX_CHARS))
        .filter(|w| !w.is_empty())
        .unwrap_or_else(|| synthesized_rationale(c));
    let confidence = sel
        .confidence
        .filter(|x| x.is_finite())
        .map(clamp_confidence)
        .unwrap_or_else(|| clamp_confidence(c.score));

    FinalHeadline {
        title: prefer(sel.title, &cand.title),
        source: prefer(sel.source, &cand.source),
        url: prefer(sel.url, &cand.url),
        published_at,
        why_it_matters,
        confidence,
        shortlist_index: idx,
        candidate_id: cand.id.clone(),
        topic: c.topic_bucket,
    }
}

/// Model value when non-blank, else the candidate's own field.
fn prefer(model: Option<String>, fallback: &str) -> String {
    model
        .map(|m| one_line(&m, FIELD_MAX_CHARS))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Single line, collapsed whitespace, at most `max` chars.
pub fn one_line(input: &str, max: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max));
    let mut count = 0usize;
    for word in input.split_whitespace() {
        let needed = word.chars().count() + usize::from(!out.is_empty());
        if count + needed > max {
            if out.is_empty() {
                out.extend(word.chars().take(max));
            }
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        count += needed;
    }
    out
}
