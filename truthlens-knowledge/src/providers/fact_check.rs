//! Outlet fact-check augmentation for news documents.
//!
//! A [`FactChecker`] looks at where a document was published and returns a
//! [`FactCheckReport`]. The news adapter runs one check per ranked document
//! and folds the report into the document metadata; a failed check leaves
//! the document untouched.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::error::KnowledgeError;
use crate::types::{Document, FactCheckVerdict};

/// Credibility at or above which an outlet counts as verified.
const VERIFIED_THRESHOLD: f64 = 0.8;
/// Credibility at or above which an outlet is mixed rather than disputed.
const MIXED_THRESHOLD: f64 = 0.6;
/// Credibility below which an outlet is treated as publishing falsehoods.
const FALSE_THRESHOLD: f64 = 0.4;

/// Built-in outlet table: `(domain, bias, credibility)`.
const KNOWN_OUTLETS: &[(&str, &str, f64)] = &[
    ("reuters.com", "center", 0.95),
    ("apnews.com", "center", 0.95),
    ("bbc.co.uk", "center-left", 0.9),
    ("bbc.com", "center-left", 0.9),
    ("npr.org", "center-left", 0.9),
    ("economist.com", "center", 0.9),
    ("theguardian.com", "left-center", 0.85),
    ("nytimes.com", "left-center", 0.85),
    ("washingtonpost.com", "left-center", 0.85),
    ("wsj.com", "right-center", 0.85),
    ("ft.com", "center", 0.9),
    ("cnn.com", "left", 0.7),
    ("foxnews.com", "right", 0.6),
    ("nypost.com", "right-center", 0.55),
    ("dailymail.co.uk", "right", 0.35),
    ("breitbart.com", "right", 0.3),
    ("infowars.com", "extreme-right", 0.1),
];

/// What a fact checker knows about a document's outlet.
#[derive(Debug, Clone, PartialEq)]
pub struct FactCheckReport {
    /// Verdict for the outlet's factual record.
    pub verdict: FactCheckVerdict,
    /// Outlet bias class, if known.
    pub bias: Option<String>,
    /// Outlet credibility in `[0,1]`, if known.
    pub credibility: Option<f64>,
}

impl FactCheckReport {
    /// Report for an outlet the checker knows nothing about.
    pub fn unverified() -> Self {
        Self {
            verdict: FactCheckVerdict::Unverified,
            bias: None,
            credibility: None,
        }
    }

    /// Record this report on the document's metadata.
    pub fn apply_to(&self, document: &mut Document) {
        document.metadata.fact_check = Some(self.verdict);
        if self.bias.is_some() {
            document.metadata.bias.clone_from(&self.bias);
        }
        if self.credibility.is_some() {
            document.metadata.credibility = self.credibility;
        }
    }
}

/// Per-document fact-check lookup.
#[async_trait]
pub trait FactChecker: Send + Sync {
    /// Check the outlet behind `document`.
    ///
    /// # Errors
    ///
    /// Implementations backed by a remote service return
    /// [`KnowledgeError`] on transport failure. Callers treat any error as
    /// "no augmentation".
    async fn check(&self, document: &Document) -> Result<FactCheckReport, KnowledgeError>;
}

#[derive(Debug, Clone, PartialEq)]
struct OutletProfile {
    bias: String,
    credibility: f64,
}

/// Fact checker backed by a fixed outlet → bias/credibility table.
#[derive(Debug, Clone)]
pub struct StaticFactChecker {
    outlets: HashMap<String, OutletProfile>,
}

impl Default for StaticFactChecker {
    fn default() -> Self {
        let mut checker = Self::empty();
        for (domain, bias, credibility) in KNOWN_OUTLETS {
            checker = checker.with_outlet(domain, bias, *credibility);
        }
        checker
    }
}

impl StaticFactChecker {
    /// A checker with no known outlets.
    pub fn empty() -> Self {
        Self {
            outlets: HashMap::new(),
        }
    }

    /// Add or replace an outlet entry. `domain` is matched against the
    /// document URL host, ignoring a leading `www.`.
    pub fn with_outlet(mut self, domain: &str, bias: &str, credibility: f64) -> Self {
        self.outlets.insert(
            normalize_domain(domain),
            OutletProfile {
                bias: bias.to_owned(),
                credibility: credibility.clamp(0.0, 1.0),
            },
        );
        self
    }

    /// Number of known outlets.
    pub fn len(&self) -> usize {
        self.outlets.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.outlets.is_empty()
    }

    fn lookup(&self, document: &Document) -> Option<&OutletProfile> {
        let host = document
            .url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .and_then(|u| u.host_str().map(normalize_domain));

        if let Some(mut host) = host {
            // news.bbc.co.uk falls back to bbc.co.uk
            loop {
                if let Some(profile) = self.outlets.get(&host) {
                    return Some(profile);
                }
                match host.split_once('.') {
                    Some((_, rest)) if rest.contains('.') => host = rest.to_owned(),
                    _ => break,
                }
            }
        }
        None
    }
}

#[async_trait]
impl FactChecker for StaticFactChecker {
    async fn check(&self, document: &Document) -> Result<FactCheckReport, KnowledgeError> {
        Ok(match self.lookup(document) {
            Some(profile) => FactCheckReport {
                verdict: verdict_for(profile.credibility),
                bias: Some(profile.bias.clone()),
                credibility: Some(profile.credibility),
            },
            None => FactCheckReport::unverified(),
        })
    }
}

/// Map an outlet credibility onto a verdict.
pub fn verdict_for(credibility: f64) -> FactCheckVerdict {
    if credibility >= VERIFIED_THRESHOLD {
        FactCheckVerdict::Verified
    } else if credibility >= MIXED_THRESHOLD {
        FactCheckVerdict::Mixed
    } else if credibility >= FALSE_THRESHOLD {
        FactCheckVerdict::Disputed
    } else {
        FactCheckVerdict::False
    }
}

fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_owned(),
        None => lower,
    }
}
