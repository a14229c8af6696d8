//! Scoring toolkit shared by every provider.
//!
//! Pure, stateless functions: content cleaning, content-quality heuristics,
//! recency decay curves and key-information extraction. Providers call
//! these directly and combine them with their own source-quality weights.
//!
//! # Content quality
//!
//! ```text
//! quality = 0.5
//!         + 0.1 per word-count threshold passed (500, 1000, 2000)
//!         + 0.02 per citation marker   (max 0.1)
//!         + 0.01 per structural marker (max 0.1)
//!         + 0.05 each for categories, author, last-modified
//! clamped to 1.0
//! ```

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Document;

/// Score assigned when a document carries no usable date.
pub const UNDATED_RECENCY: f64 = 0.3;

fn citation_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\[(?:\d+(?:[,\u{2013}-]\d+)*|[a-z]|citation needed|clarification needed|when\?|who\?)\]",
        )
        .expect("Invalid citation marker regex")
    })
}

fn numeric_fact() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\d+(?:[.,]\d+)?\s*(?:%|percent|per cent|million|billion|thousand|years?|km|kg)|\b(?:1[5-9]|20)\d{2}\b",
        )
        .expect("Invalid numeric fact regex")
    })
}

fn attribution() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:according to|reported|study|studies|research|researchers|found|showed|estimated|announced|said)\b",
        )
        .expect("Invalid attribution regex")
    })
}

fn entity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z][a-z]+(?:\s+(?:of\s+)?[A-Z][a-z]+)+\b").expect("Invalid entity regex")
    })
}

/// Document presence signals that feed [`content_quality`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentSignals {
    /// Document has at least one category.
    pub has_categories: bool,
    /// Document names an author.
    pub has_author: bool,
    /// Document records a last-modified date.
    pub has_last_modified: bool,
}

impl ContentSignals {
    /// Read the signals off a document.
    pub fn of(document: &Document) -> Self {
        Self {
            has_categories: !document.categories.is_empty(),
            has_author: document.author.as_deref().is_some_and(|a| !a.trim().is_empty()),
            has_last_modified: document.last_modified.is_some(),
        }
    }
}

/// Summary, key points and named entities pulled from a text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// First two substantial sentences.
    pub summary: String,
    /// Sentences carrying numbers, statistics or attributions (max 5).
    pub key_points: Vec<String>,
    /// Capitalised multi-word sequences (max 10, deduplicated).
    pub entities: Vec<String>,
}

/// Clamp a score into `[0,1]`. NaN becomes 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Strip bracketed citation markers and collapse whitespace.
///
/// Runs of spaces and tabs become one space, three or more newlines
/// become a single blank line, and every line is trimmed.
pub fn clean_content(text: &str) -> String {
    let stripped = citation_marker().replace_all(text, "");

    let mut out = String::with_capacity(stripped.len());
    let mut blank_run = 0usize;
    for line in stripped.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(&collapsed);
    }
    out
}

/// Number of bracketed citation markers in `text`.
pub fn count_citation_markers(text: &str) -> usize {
    citation_marker().find_iter(text).count()
}

/// Number of lines that look like headers or list items.
pub fn count_structural_markers(text: &str) -> usize {
    text.lines()
        .map(str::trim_start)
        .filter(|line| {
            line.starts_with('#')
                || line.starts_with("==")
                || line.starts_with("* ")
                || line.starts_with("- ")
                || line.starts_with('\u{2022}')
                || is_numbered_item(line)
        })
        .count()
}

fn is_numbered_item(line: &str) -> bool {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with(". ")
}

/// Heuristic quality of a text in `[0,1]`.
pub fn content_quality(content: &str, signals: &ContentSignals) -> f64 {
    let mut score = 0.5;

    let words = content.split_whitespace().count();
    for threshold in [500, 1000, 2000] {
        if words > threshold {
            score += 0.1;
        }
    }

    score += (count_citation_markers(content) as f64 * 0.02).min(0.1);
    score += (count_structural_markers(content) as f64 * 0.01).min(0.1);

    if signals.has_categories {
        score += 0.05;
    }
    if signals.has_author {
        score += 0.05;
    }
    if signals.has_last_modified {
        score += 0.05;
    }

    score.min(1.0)
}

/// Day-granularity recency curve for reference material.
pub fn recency_score(date: Option<DateTime<Utc>>) -> f64 {
    recency_score_at(date, Utc::now())
}

/// [`recency_score`] against an explicit clock.
pub fn recency_score_at(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(date) = date else {
        return UNDATED_RECENCY;
    };
    match (now - date).num_days().max(0) {
        0..30 => 1.0,
        30..90 => 0.9,
        90..180 => 0.8,
        180..365 => 0.7,
        365..730 => 0.6,
        _ => 0.4,
    }
}

/// Hour-granularity recency curve for news; decays much faster.
pub fn news_recency_score(date: Option<DateTime<Utc>>) -> f64 {
    news_recency_score_at(date, Utc::now())
}

/// [`news_recency_score`] against an explicit clock.
pub fn news_recency_score_at(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(date) = date else {
        return UNDATED_RECENCY;
    };
    match (now - date).num_hours().max(0) {
        0..=24 => 1.0,
        25..=72 => 0.9,
        73..=168 => 0.8,
        169..=336 => 0.7,
        337..=720 => 0.6,
        721..=2160 => 0.4,
        _ => 0.2,
    }
}

/// Linear one-year decay used for aggregate result-set recency.
pub fn document_recency(document: &Document, now: DateTime<Utc>) -> f64 {
    let Some(date) = document.freshest_date() else {
        return UNDATED_RECENCY;
    };
    let age_days = (now - date).num_days().max(0) as f64;
    clamp_unit(1.0 - age_days / 365.0)
}

/// Split text into sentences on terminal punctuation followed by space.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|n| n.is_whitespace()) {
            let sentence = current.split_whitespace().collect::<Vec<_>>().join(" ");
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }
    let tail = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Pull a summary, key points and entities out of `content`.
pub fn extract_key_info(content: &str) -> KeyInfo {
    let sentences = split_sentences(content);

    let summary = sentences
        .iter()
        .filter(|s| s.len() > 20)
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

    let key_points = sentences
        .iter()
        .filter(|s| numeric_fact().is_match(s) || attribution().is_match(s))
        .take(5)
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let entities = entity()
        .find_iter(content)
        .map(|m| m.as_str().to_owned())
        .filter(|e| seen.insert(e.clone()))
        .take(10)
        .collect();

    KeyInfo {
        summary,
        key_points,
        entities,
    }
}

/// Weighted reliability sum shared by all providers.
///
/// Weights are `(source, content, recency, citation)`; the citation term
/// is already normalised to `[0,1]` by the caller.
pub fn weighted_overall(
    weights: (f64, f64, f64, f64),
    source_quality: f64,
    content_quality: f64,
    recency: f64,
    citation_term: f64,
) -> f64 {
    clamp_unit(
        weights.0 * source_quality
            + weights.1 * content_quality
            + weights.2 * recency
            + weights.3 * clamp_unit(citation_term),
    )
}
