//! Merging provider results: tagging, weighted ranking and the aggregate
//! reliability block.

use chrono::{DateTime, Utc};

use crate::scoring::{clamp_unit, document_recency};
use crate::types::{Document, KnowledgeProviderResult, ReliabilityMetrics};

/// Weights of (source, content, recency) in the aggregate overall score.
const OVERALL_WEIGHTS: (f64, f64, f64) = (0.4, 0.4, 0.2);

/// A successful provider answer together with the provider's weight.
#[derive(Debug, Clone)]
pub struct Contribution {
    /// Registered provider name.
    pub provider: String,
    /// Configured provider weight.
    pub weight: f64,
    /// What the provider returned.
    pub result: KnowledgeProviderResult,
}

impl Contribution {
    /// Documents stamped with provider name, weight and the provider's
    /// overall reliability.
    pub fn tagged_documents(&self) -> Vec<Document> {
        self.result
            .documents
            .iter()
            .cloned()
            .map(|mut doc| {
                doc.metadata.provider = Some(self.provider.clone());
                doc.metadata.provider_weight = Some(self.weight);
                doc.metadata.original_reliability = Some(self.result.reliability.overall_score);
                doc
            })
            .collect()
    }
}

/// `original_reliability * provider_weight`, zero for untagged documents.
pub fn rank_score(document: &Document) -> f64 {
    document.metadata.original_reliability.unwrap_or(0.0)
        * document.metadata.provider_weight.unwrap_or(0.0)
}

/// Stable sort by [`rank_score`], highest first. Ties keep input order.
pub fn rank(documents: &mut [Document]) {
    documents.sort_by(|a, b| rank_score(b).total_cmp(&rank_score(a)));
}

/// Reliability of the merged result.
///
/// Source and content quality are the weight-weighted mean of the overall
/// scores of providers that contributed at least one document; citations
/// are summed over `documents`; recency is the mean linear one-year decay
/// of `documents`.
pub fn aggregate_reliability(
    contributions: &[Contribution],
    documents: &[Document],
    now: DateTime<Utc>,
) -> ReliabilityMetrics {
    let (weighted, total_weight) = contributions
        .iter()
        .filter(|c| !c.result.documents.is_empty())
        .fold((0.0, 0.0), |(sum, weights), c| {
            (sum + c.weight * c.result.reliability.overall_score, weights + c.weight)
        });
    let provider_quality = if total_weight > 0.0 {
        clamp_unit(weighted / total_weight)
    } else {
        0.0
    };

    let citations = documents
        .iter()
        .filter_map(|d| d.metadata.citation_count)
        .sum();

    let recency = if documents.is_empty() {
        0.0
    } else {
        let total: f64 = documents.iter().map(|d| document_recency(d, now)).sum();
        clamp_unit(total / documents.len() as f64)
    };

    let (ws, wc, wr) = OVERALL_WEIGHTS;
    ReliabilityMetrics {
        source_quality: provider_quality,
        content_quality: provider_quality,
        recency,
        citations,
        overall_score: clamp_unit(ws * provider_quality + wc * provider_quality + wr * recency),
    }
}
