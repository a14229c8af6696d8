//! Trait definition for pluggable knowledge providers.
//!
//! Each knowledge source (encyclopedia, academic indexes, news outlets)
//! implements [`KnowledgeProvider`] so the manager can fan out to them
//! uniformly. Shared scoring lives in [`crate::scoring`]; adapters call it
//! rather than inheriting from a common base.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::KnowledgeError;
use crate::scoring::clamp_unit;
use crate::types::{
    Document, KnowledgeProviderResult, ProviderInfo, ReliabilityMetrics, SearchMetadata,
    SearchOptions,
};

/// A pluggable knowledge source.
///
/// Implementors handle their own:
///
/// - Request construction and query encoding
/// - Throttling of their own outbound calls (see [`crate::http::RequestGate`])
/// - Response parsing
/// - Per-document reliability scoring
///
/// `search` should tolerate partial upstream failure: if some sub-sources
/// fail, return what the others produced; if all fail, return an empty
/// document list rather than an error.
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    /// Search the source and return scored documents.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] only when the provider cannot run at all
    /// (for example, the query cannot be encoded).
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<KnowledgeProviderResult, KnowledgeError>;

    /// Fetch one document by its provider-scoped id.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] on transport or parse failure; a missing
    /// document is `Ok(None)`.
    async fn get_document(&self, id: &str) -> Result<Option<Document>, KnowledgeError>;

    /// Score a single document.
    fn calculate_reliability(&self, document: &Document) -> ReliabilityMetrics;

    /// Describe this provider.
    fn provider_info(&self) -> ProviderInfo;
}

/// Builds a fresh adapter instance; used when a disabled provider is
/// re-enabled.
pub type ProviderFactory =
    Arc<dyn Fn() -> Result<Arc<dyn KnowledgeProvider>, KnowledgeError> + Send + Sync>;

/// Combine scored documents into a provider-level result.
///
/// The set's reliability is the mean of the per-document metrics, with
/// citations summed. Shared by every built-in adapter.
pub fn assemble_result(
    query: &str,
    provider: &str,
    scored: Vec<(Document, ReliabilityMetrics)>,
    search_time_ms: u64,
) -> KnowledgeProviderResult {
    let count = scored.len();
    let reliability = if count == 0 {
        ReliabilityMetrics::default()
    } else {
        let n = count as f64;
        let sum = scored
            .iter()
            .fold(ReliabilityMetrics::default(), |mut acc, (_, m)| {
                acc.source_quality += m.source_quality;
                acc.content_quality += m.content_quality;
                acc.recency += m.recency;
                acc.citations += m.citations;
                acc.overall_score += m.overall_score;
                acc
            });
        ReliabilityMetrics {
            source_quality: clamp_unit(sum.source_quality / n),
            content_quality: clamp_unit(sum.content_quality / n),
            recency: clamp_unit(sum.recency / n),
            citations: sum.citations,
            overall_score: clamp_unit(sum.overall_score / n),
        }
    };

    KnowledgeProviderResult {
        documents: scored.into_iter().map(|(doc, _)| doc).collect(),
        reliability,
        search_metadata: SearchMetadata {
            query: query.to_owned(),
            providers: vec![provider.to_owned()],
            failed_providers: Vec::new(),
            total_results: count,
            search_time_ms,
            cached: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderKind;
    use std::time::Duration;

    /// A mock provider for testing trait bounds and async execution.
    struct MockProvider {
        documents: Vec<Document>,
    }

    #[async_trait]
    impl KnowledgeProvider for MockProvider {
        async fn search(
            &self,
            query: &str,
            _options: &SearchOptions,
        ) -> Result<KnowledgeProviderResult, KnowledgeError> {
            if self.documents.is_empty() {
                return Err(KnowledgeError::Parse("mock provider failure".into()));
            }
            let scored = self
                .documents
                .iter()
                .map(|d| (d.clone(), self.calculate_reliability(d)))
                .collect();
            Ok(assemble_result(query, "mock", scored, 1))
        }

        async fn get_document(&self, id: &str) -> Result<Option<Document>, KnowledgeError> {
            Ok(self.documents.iter().find(|d| d.id == id).cloned())
        }

        fn calculate_reliability(&self, _document: &Document) -> ReliabilityMetrics {
            ReliabilityMetrics {
                source_quality: 0.8,
                content_quality: 0.6,
                recency: 0.4,
                citations: 3,
                overall_score: 0.7,
            }
        }

        fn provider_info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "mock".into(),
                kind: ProviderKind::Custom,
                base_reliability: 0.8,
                supported_languages: vec!["en".into()],
                rate_limit: Duration::ZERO,
            }
        }
    }

    #[test]
    fn trait_objects_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn KnowledgeProvider>();
    }

    #[tokio::test]
    async fn mock_provider_returns_documents() {
        let provider: Arc<dyn KnowledgeProvider> = Arc::new(MockProvider {
            documents: vec![Document::new("1", "One", "first"), Document::new("2", "Two", "second")],
        });
        let result = provider
            .search("q", &SearchOptions::default())
            .await
            .expect("should succeed");
        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.search_metadata.total_results, 2);
        assert_eq!(result.reliability.citations, 6);
        assert!((result.reliability.overall_score - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn mock_provider_propagates_errors() {
        let provider = MockProvider { documents: vec![] };
        let err = provider
            .search("q", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mock provider failure"));
    }

    #[tokio::test]
    async fn get_document_missing_is_none() {
        let provider = MockProvider {
            documents: vec![Document::new("1", "One", "first")],
        };
        assert!(provider.get_document("2").await.expect("ok").is_none());
        assert!(provider.get_document("1").await.expect("ok").is_some());
    }

    #[test]
    fn empty_assembly_has_zero_reliability() {
        let result = assemble_result("q", "p", Vec::new(), 0);
        assert!(result.documents.is_empty());
        assert_eq!(result.reliability, ReliabilityMetrics::default());
        assert_eq!(result.search_metadata.providers, vec!["p".to_owned()]);
    }
}
