//! Core types for documents, reliability scores and search results.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document retrieved from a knowledge provider.
///
/// `id` is unique within the provider's namespace only; the manager
/// deduplicates across providers by URL or title instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Provider-scoped identifier.
    pub id: String,
    /// Document title.
    pub title: String,
    /// Cleaned body text.
    pub content: String,
    /// Canonical URL, when the source has one.
    pub url: Option<String>,
    /// Author or byline.
    pub author: Option<String>,
    /// When the document was first published.
    pub publication_date: Option<DateTime<Utc>>,
    /// When the document was last edited.
    pub last_modified: Option<DateTime<Utc>>,
    /// ISO 639-1 language code.
    pub language: Option<String>,
    /// Topical categories or sections.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Provider scoring inputs and manager annotations.
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document with the required fields; everything else empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            url: None,
            author: None,
            publication_date: None,
            last_modified: None,
            language: None,
            categories: Vec::new(),
            metadata: DocumentMetadata::default(),
        }
    }

    /// Set the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the publication date.
    pub fn with_publication_date(mut self, date: DateTime<Utc>) -> Self {
        self.publication_date = Some(date);
        self
    }

    /// The most recent of `last_modified` and `publication_date`.
    pub fn freshest_date(&self) -> Option<DateTime<Utc>> {
        match (self.last_modified, self.publication_date) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Provider-specific scoring inputs plus fields assigned during merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Registered name of the provider that returned this document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Known citation count (academic sources, reference markers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,
    /// Editorial assessment class, e.g. `"FA"` or `"Stub"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_class: Option<String>,
    /// Whether the document passed peer review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_reviewed: Option<bool>,
    /// Journal or venue name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    /// Publishing outlet (news) or upstream index (academic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// Political bias class of the outlet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias: Option<String>,
    /// Outlet credibility in `[0,1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credibility: Option<f64>,
    /// Fact-check verdict attached by the augmentation pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_check: Option<FactCheckVerdict>,
    /// Weight of the contributing provider (set by the manager).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_weight: Option<f64>,
    /// Overall reliability of the contributing provider's result set
    /// (set by the manager).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_reliability: Option<f64>,
    /// Anything else an adapter wants to carry along.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Outcome of the news fact-check augmentation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactCheckVerdict {
    /// Source has a strong factual record.
    Verified,
    /// Source has a mixed factual record.
    Mixed,
    /// Source's reporting is frequently disputed.
    Disputed,
    /// Source is known to publish false claims.
    False,
    /// Nothing known about the source.
    Unverified,
}

impl FactCheckVerdict {
    /// Adjustment applied to a document's source quality.
    pub fn source_quality_adjustment(self) -> f64 {
        match self {
            Self::Verified => 0.1,
            Self::Mixed => -0.1,
            Self::Disputed => -0.2,
            Self::False => -0.3,
            Self::Unverified => 0.0,
        }
    }
}

/// Normalised reliability scores for a document or a result set.
///
/// Every field except `citations` lies in `[0,1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityMetrics {
    /// Trustworthiness of the source itself.
    pub source_quality: f64,
    /// Heuristic quality of the text.
    pub content_quality: f64,
    /// Freshness.
    pub recency: f64,
    /// Citation count.
    pub citations: u64,
    /// Weighted combination of the above.
    pub overall_score: f64,
}

/// Inclusive publication date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest accepted date.
    pub from: Option<DateTime<Utc>>,
    /// Latest accepted date.
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Whether `date` falls inside the window. Undated documents pass.
    pub fn contains(&self, date: Option<DateTime<Utc>>) -> bool {
        let Some(date) = date else {
            return true;
        };
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// Per-call search options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of documents to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Preferred language code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Restrict to these categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Restrict to a publication window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// Drop documents whose reliability falls below this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_reliability: Option<f64>,
}

impl SearchOptions {
    /// Options with only a result limit.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Whether a document passes the category and date filters.
    pub fn accepts(&self, document: &Document) -> bool {
        if let Some(range) = &self.date_range {
            if !range.contains(document.publication_date) {
                return false;
            }
        }
        match &self.categories {
            Some(wanted) if !wanted.is_empty() => document.categories.iter().any(|have| {
                wanted
                    .iter()
                    .any(|w| have.to_lowercase().contains(&w.to_lowercase()))
            }),
            _ => true,
        }
    }
}

/// Per-provider settings held by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Whether the provider takes part in searches.
    pub enabled: bool,
    /// Relative influence on ranking and aggregate reliability.
    pub weight: f64,
    /// Result cap requested from the provider.
    pub max_results: usize,
    /// Per-search timeout.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            max_results: 10,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Partial update for [`ProviderConfig`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfigUpdate {
    /// New enabled flag.
    pub enabled: Option<bool>,
    /// New weight.
    pub weight: Option<f64>,
    /// New result cap.
    pub max_results: Option<usize>,
    /// New timeout.
    #[serde(default, with = "option_duration_ms")]
    pub timeout: Option<Duration>,
}

impl ProviderConfigUpdate {
    /// Apply this update to `config` in place.
    pub fn apply_to(&self, config: &mut ProviderConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(weight) = self.weight {
            config.weight = weight;
        }
        if let Some(max_results) = self.max_results {
            config.max_results = max_results;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
    }
}

/// Which family of knowledge source a provider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Curated encyclopedia.
    Encyclopedia,
    /// Preprint servers and peer-reviewed indexes.
    Academic,
    /// News outlets.
    News,
    /// Anything else plugged in by a caller.
    Custom,
}

impl ProviderKind {
    /// Returns the human-readable name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Encyclopedia => "encyclopedia",
            Self::Academic => "academic",
            Self::News => "news",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name.
    pub name: String,
    /// Provider family.
    pub kind: ProviderKind,
    /// Source quality before per-document adjustments.
    pub base_reliability: f64,
    /// Language codes the provider can serve.
    pub supported_languages: Vec<String>,
    /// Minimum delay between the provider's own outbound requests.
    #[serde(with = "duration_ms")]
    pub rate_limit: Duration,
}

/// Bookkeeping attached to every search result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    /// The query as issued.
    pub query: String,
    /// Providers that contributed documents.
    pub providers: Vec<String>,
    /// Providers that failed, timed out or were skipped.
    #[serde(default)]
    pub failed_providers: Vec<String>,
    /// Number of documents returned.
    pub total_results: usize,
    /// Wall time spent searching.
    pub search_time_ms: u64,
    /// Whether this result was served from cache.
    #[serde(default)]
    pub cached: bool,
}

/// Documents plus the reliability of the set that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeProviderResult {
    /// Retrieved documents in rank order.
    pub documents: Vec<Document>,
    /// Reliability of the result set.
    pub reliability: ReliabilityMetrics,
    /// Search bookkeeping.
    pub search_metadata: SearchMetadata,
}

impl KnowledgeProviderResult {
    /// A result with no documents, as returned when every sub-source of a
    /// provider came back empty or failed.
    pub fn empty(query: &str, provider: &str) -> Self {
        Self {
            documents: Vec::new(),
            reliability: ReliabilityMetrics::default(),
            search_metadata: SearchMetadata {
                query: query.to_owned(),
                providers: vec![provider.to_owned()],
                ..Default::default()
            },
        }
    }
}

/// Verdict for a single claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
    /// At least two matching documents support it and none contradict it.
    Verified,
    /// At least two matching documents contradict it.
    Contradicted,
    /// Evidence is thin or conflicting.
    Partial,
    /// No usable evidence.
    Unsupported,
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Verified => "verified",
            Self::Contradicted => "contradicted",
            Self::Partial => "partial",
            Self::Unsupported => "unsupported",
        })
    }
}

/// Result of verifying one claim against retrieved evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimVerificationResult {
    /// The claim as given.
    pub claim: String,
    /// Verdict.
    pub verification: Verification,
    /// Confidence in `[0,1]`.
    pub confidence: f64,
    /// Matching documents without a denial marker.
    pub supporting_documents: Vec<Document>,
    /// Matching documents with a denial marker.
    pub contradicting_documents: Vec<Document>,
    /// Human-readable summary of the evidence counts.
    pub explanation: String,
}

/// Serde helper storing a [`Duration`] as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

pub(crate) mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer
                .serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
