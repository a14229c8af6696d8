//! News provider federating NewsAPI and The Guardian Open Platform.
//!
//! Both upstreams are queried concurrently and merged. The ranked
//! survivors then go through a fact-check augmentation pass, one
//! independent check per document, whose verdict shifts each document's
//! source quality. NewsAPI is skipped when no key is configured; the
//! Guardian falls back to its public `test` key.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;

use crate::content::{extract_article, parse_timestamp, strip_html};
use crate::error::KnowledgeError;
use crate::http::{self, RequestGate};
use crate::provider::{assemble_result, KnowledgeProvider};
use crate::scoring::{
    clamp_unit, clean_content, content_quality, extract_key_info, news_recency_score,
    weighted_overall, ContentSignals,
};
use crate::types::{
    Document, KnowledgeProviderResult, ProviderInfo, ProviderKind, ReliabilityMetrics,
    SearchOptions,
};

use super::fact_check::{FactChecker, StaticFactChecker};
use super::{sanitize_language, AdapterSettings};

/// Registered name of this provider.
pub const NAME: &str = "news";

/// Source quality for an outlet with no credibility record.
const BASE_RELIABILITY: f64 = 0.75;

/// Weights for (source, content, recency, impact).
const WEIGHTS: (f64, f64, f64, f64) = (0.4, 0.3, 0.2, 0.1);

/// Key points (statistics, attributions) needed for a full impact term.
const KEY_POINTS_FOR_FULL_SCORE: f64 = 5.0;

/// NewsAPI developer plans allow roughly one request per second.
const NEWSAPI_INTERVAL: Duration = Duration::from_secs(1);
/// The Guardian allows a handful of calls per second.
const GUARDIAN_INTERVAL: Duration = Duration::from_millis(200);
/// Spacing between article page fetches.
const ARTICLE_INTERVAL: Duration = Duration::from_millis(500);

const GUARDIAN_PUBLIC_KEY: &str = "test";

/// Upstream base URLs, overridable for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsEndpoints {
    /// NewsAPI v2 base.
    pub newsapi: String,
    /// Guardian content API base.
    pub guardian: String,
}

impl Default for NewsEndpoints {
    fn default() -> Self {
        Self {
            newsapi: "https://newsapi.org/v2".to_owned(),
            guardian: "https://content.guardianapis.com".to_owned(),
        }
    }
}

/// NewsAPI + Guardian adapter with fact-check augmentation.
pub struct NewsProvider {
    client: reqwest::Client,
    endpoints: NewsEndpoints,
    newsapi_key: Option<String>,
    guardian_key: String,
    newsapi_gate: RequestGate,
    guardian_gate: RequestGate,
    article_gate: RequestGate,
    fact_checker: Arc<dyn FactChecker>,
}

impl NewsProvider {
    /// Create an adapter against the public endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Http`] if the HTTP client cannot be built.
    pub fn new(
        settings: &AdapterSettings,
        newsapi_key: Option<String>,
        guardian_key: Option<String>,
    ) -> Result<Self, KnowledgeError> {
        Self::with_endpoints(settings, NewsEndpoints::default(), newsapi_key, guardian_key)
    }

    /// Create an adapter against custom endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Http`] if the HTTP client cannot be built.
    pub fn with_endpoints(
        settings: &AdapterSettings,
        endpoints: NewsEndpoints,
        newsapi_key: Option<String>,
        guardian_key: Option<String>,
    ) -> Result<Self, KnowledgeError> {
        Ok(Self {
            client: http::build_client(&settings.user_agent, settings.request_timeout)?,
            endpoints,
            newsapi_key: newsapi_key.filter(|k| !k.trim().is_empty()),
            guardian_key: guardian_key
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_else(|| GUARDIAN_PUBLIC_KEY.to_owned()),
            newsapi_gate: RequestGate::with_jitter(NEWSAPI_INTERVAL, settings.jitter_ms),
            guardian_gate: RequestGate::with_jitter(GUARDIAN_INTERVAL, settings.jitter_ms),
            article_gate: RequestGate::with_jitter(ARTICLE_INTERVAL, settings.jitter_ms),
            fact_checker: Arc::new(StaticFactChecker::default()),
        })
    }

    /// Replace the fact checker used by the augmentation pass.
    pub fn with_fact_checker(mut self, checker: Arc<dyn FactChecker>) -> Self {
        self.fact_checker = checker;
        self
    }

    /// Override the minimum interval of every upstream gate.
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.newsapi_gate = RequestGate::new(interval);
        self.guardian_gate = RequestGate::new(interval);
        self.article_gate = RequestGate::new(interval);
        self
    }

    async fn search_newsapi(
        &self,
        query: &str,
        limit: usize,
        language: Option<&str>,
    ) -> Result<Vec<Document>, KnowledgeError> {
        let Some(key) = &self.newsapi_key else {
            tracing::debug!(provider = NAME, "NewsAPI key not configured, skipping");
            return Ok(Vec::new());
        };
        let mut params = vec![
            ("q", query.to_owned()),
            ("pageSize", limit.to_string()),
            ("sortBy", "relevancy".to_owned()),
        ];
        if let Some(lang) = sanitize_language(language).filter(|l| l.len() == 2) {
            params.push(("language", lang));
        }
        let request = self
            .client
            .get(format!("{}/everything", self.endpoints.newsapi))
            .header("X-Api-Key", key)
            .query(&params);
        let response: NewsApiResponse = {
            let _pass = self.newsapi_gate.acquire().await;
            http::get_json(request, "NewsAPI").await?
        };
        Ok(response
            .articles
            .into_iter()
            .filter_map(NewsApiArticle::into_document)
            .collect())
    }

    async fn search_guardian(&self, query: &str, limit: usize) -> Result<Vec<Document>, KnowledgeError> {
        let request = self
            .client
            .get(format!("{}/search", self.endpoints.guardian))
            .query(&[
                ("q", query.to_owned()),
                ("page-size", limit.to_string()),
                ("order-by", "relevance".to_owned()),
                ("show-fields", "bodyText,byline,trailText".to_owned()),
                ("api-key", self.guardian_key.clone()),
            ]);
        let response: GuardianResponse = {
            let _pass = self.guardian_gate.acquire().await;
            http::get_json(request, "Guardian").await?
        };
        Ok(response
            .response
            .results
            .into_iter()
            .map(GuardianResult::into_document)
            .collect())
    }

    /// Run one fact check per document concurrently. A failed check leaves
    /// the document as it was.
    async fn augment(&self, documents: Vec<Document>) -> Vec<Document> {
        let checks = documents.into_iter().map(|mut doc| {
            let checker = Arc::clone(&self.fact_checker);
            async move {
                match checker.check(&doc).await {
                    Ok(report) => report.apply_to(&mut doc),
                    Err(err) => {
                        tracing::warn!(provider = NAME, document = %doc.id, error = %err, "fact check failed");
                    }
                }
                doc
            }
        });
        join_all(checks).await
    }

    fn score_all(&self, documents: Vec<Document>) -> Vec<(Document, ReliabilityMetrics)> {
        let mut scored = documents
            .into_iter()
            .map(|doc| {
                let metrics = self.calculate_reliability(&doc);
                (doc, metrics)
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.1.overall_score.total_cmp(&a.1.overall_score));
        scored
    }
}

#[async_trait]
impl KnowledgeProvider for NewsProvider {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<KnowledgeProviderResult, KnowledgeError> {
        tracing::trace!(query, "news search");
        let started = Instant::now();
        let limit = options.limit.unwrap_or(10).clamp(1, 50);

        let (newsapi, guardian) = tokio::join!(
            self.search_newsapi(query, limit, options.language.as_deref()),
            self.search_guardian(query, limit)
        );

        let mut merged = Vec::new();
        for (upstream, outcome) in [("NewsAPI", newsapi), ("Guardian", guardian)] {
            match outcome {
                Ok(docs) => merged.extend(docs),
                Err(err) => {
                    tracing::warn!(provider = NAME, upstream, error = %err, "news upstream failed");
                }
            }
        }

        let mut seen = HashSet::new();
        let candidates = merged
            .into_iter()
            .filter(|doc| options.accepts(doc))
            .filter(|doc| seen.insert(doc.id.clone()))
            .collect::<Vec<_>>();

        let ranked = self
            .score_all(candidates)
            .into_iter()
            .take(limit)
            .map(|(doc, _)| doc)
            .collect::<Vec<_>>();

        let augmented = self.augment(ranked).await;
        let scored = self.score_all(augmented);

        tracing::debug!(provider = NAME, count = scored.len(), "news returned documents");
        Ok(assemble_result(
            query,
            NAME,
            scored,
            started.elapsed().as_millis() as u64,
        ))
    }

    /// Documents are identified by their article URL.
    async fn get_document(&self, id: &str) -> Result<Option<Document>, KnowledgeError> {
        let is_web_url = url::Url::parse(id)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !is_web_url {
            return Ok(None);
        }

        let request = self.client.get(id);
        let html = {
            let _pass = self.article_gate.acquire().await;
            http::get_text(request, "article").await?
        };
        let article = extract_article(&html, id)?;

        let mut doc = Document::new(id, article.title, article.text).with_url(id);
        doc.author = article.author;
        doc.publication_date = article.published;
        doc.last_modified = article.modified;

        Ok(self.augment(vec![doc]).await.into_iter().next())
    }

    fn calculate_reliability(&self, document: &Document) -> ReliabilityMetrics {
        let adjustment = document
            .metadata
            .fact_check
            .map_or(0.0, |v| v.source_quality_adjustment());
        let source_quality =
            clamp_unit(document.metadata.credibility.unwrap_or(BASE_RELIABILITY) + adjustment);
        let content_quality = content_quality(&document.content, &ContentSignals::of(document));
        let recency = news_recency_score(document.publication_date);
        let impact = extract_key_info(&document.content).key_points.len() as f64
            / KEY_POINTS_FOR_FULL_SCORE;
        let overall_score = weighted_overall(WEIGHTS, source_quality, content_quality, recency, impact);
        ReliabilityMetrics {
            source_quality,
            content_quality,
            recency,
            citations: 0,
            overall_score,
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: NAME.to_owned(),
            kind: ProviderKind::News,
            base_reliability: BASE_RELIABILITY,
            supported_languages: vec!["en".to_owned()],
            rate_limit: self.newsapi_gate.min_interval(),
        }
    }
}

/// NewsAPI cuts `content` at ~200 chars and appends `… [+1234 chars]`.
fn strip_truncation_marker(content: &str) -> &str {
    match content.rfind(" [+") {
        Some(idx) if content.ends_with(" chars]") => content[..idx].trim_end_matches('…').trim_end(),
        _ => content,
    }
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    #[serde(default)]
    source: Option<NewsApiSource>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    #[serde(default)]
    name: Option<String>,
}

impl NewsApiArticle {
    fn into_document(self) -> Option<Document> {
        let url = self.url.filter(|u| !u.is_empty())?;
        let title = self.title.filter(|t| !t.is_empty() && t != "[Removed]")?;
        let description = self.description.as_deref().map(strip_html).unwrap_or_default();
        let body = self
            .content
            .as_deref()
            .map(|c| strip_html(strip_truncation_marker(c)))
            .unwrap_or_default();
        let text = if body.starts_with(&description) {
            body
        } else {
            format!("{description}\n\n{body}")
        };

        let mut doc = Document::new(url.clone(), title, clean_content(&text)).with_url(url);
        doc.author = self.author.filter(|a| !a.trim().is_empty());
        doc.publication_date = self.published_at.as_deref().and_then(parse_timestamp);
        doc.metadata.source_name = self.source.and_then(|s| s.name);
        Some(doc)
    }
}

#[derive(Debug, Deserialize)]
struct GuardianResponse {
    response: GuardianBody,
}

#[derive(Debug, Deserialize)]
struct GuardianBody {
    #[serde(default)]
    results: Vec<GuardianResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianResult {
    web_title: String,
    web_url: String,
    #[serde(default)]
    web_publication_date: Option<String>,
    #[serde(default)]
    section_name: Option<String>,
    #[serde(default)]
    fields: GuardianFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianFields {
    #[serde(default)]
    body_text: Option<String>,
    #[serde(default)]
    byline: Option<String>,
    #[serde(default)]
    trail_text: Option<String>,
}

impl GuardianResult {
    fn into_document(self) -> Document {
        let text = self
            .fields
            .body_text
            .filter(|b| !b.trim().is_empty())
            .or_else(|| self.fields.trail_text.as_deref().map(strip_html))
            .unwrap_or_default();

        let mut doc =
            Document::new(self.web_url.clone(), self.web_title, clean_content(&text)).with_url(self.web_url);
        doc.author = self.fields.byline.filter(|b| !b.trim().is_empty());
        doc.publication_date = self.web_publication_date.as_deref().and_then(parse_timestamp);
        doc.language = Some("en".to_owned());
        doc.categories = self.section_name.into_iter().collect();
        doc.metadata.source_name = Some("The Guardian".to_owned());
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fact_check::FactCheckReport;
    use crate::types::FactCheckVerdict;

    fn provider() -> NewsProvider {
        NewsProvider::new(&AdapterSettings::default(), None, None).expect("client builds")
    }

    struct FailingChecker;

    #[async_trait]
    impl FactChecker for FailingChecker {
        async fn check(&self, _document: &Document) -> Result<FactCheckReport, KnowledgeError> {
            Err(KnowledgeError::Http("checker offline".into()))
        }
    }

    #[test]
    fn newsapi_article_maps_to_document() {
        let raw = r#"{
            "status": "ok",
            "totalResults": 1,
            "articles": [{
                "source": {"id": "reuters", "name": "Reuters"},
                "author": "Jane Doe",
                "title": "Rates held steady",
                "description": "The central bank <b>held</b> rates.",
                "url": "https://www.reuters.com/markets/rates",
                "publishedAt": "2024-05-01T12:00:00Z",
                "content": "The central bank held rates. Officials said inflation… [+2048 chars]"
            }, {
                "source": {"id": null, "name": "Removed"},
                "title": "[Removed]",
                "url": "https://removed.com"
            }]
        }"#;
        let response: NewsApiResponse = serde_json::from_str(raw).expect("decode");
        let docs = response
            .articles
            .into_iter()
            .filter_map(NewsApiArticle::into_document)
            .collect::<Vec<_>>();
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.id, "https://www.reuters.com/markets/rates");
        assert_eq!(doc.url.as_deref(), Some("https://www.reuters.com/markets/rates"));
        assert_eq!(doc.content, "The central bank held rates. Officials said inflation");
        assert_eq!(doc.metadata.source_name.as_deref(), Some("Reuters"));
        assert_eq!(doc.author.as_deref(), Some("Jane Doe"));
        assert!(doc.publication_date.is_some());
    }

    #[test]
    fn guardian_result_maps_to_document() {
        let raw = r#"{"response": {"status": "ok", "total": 1, "results": [{
            "id": "science/2024/jan/01/x",
            "sectionName": "Science",
            "webPublicationDate": "2024-01-01T09:00:00Z",
            "webTitle": "Chlorophyll explained",
            "webUrl": "https://www.theguardian.com/science/2024/jan/01/x",
            "fields": {"bodyText": "Plants convert light.", "byline": "Sam Writer"}
        }]}}"#;
        let response: GuardianResponse = serde_json::from_str(raw).expect("decode");
        let doc = response
            .response
            .results
            .into_iter()
            .next()
            .map(GuardianResult::into_document)
            .expect("one result");
        assert_eq!(doc.title, "Chlorophyll explained");
        assert_eq!(doc.content, "Plants convert light.");
        assert_eq!(doc.categories, vec!["Science".to_owned()]);
        assert_eq!(doc.author.as_deref(), Some("Sam Writer"));
        assert_eq!(doc.metadata.source_name.as_deref(), Some("The Guardian"));
    }

    #[test]
    fn truncation_marker_is_removed() {
        assert_eq!(strip_truncation_marker("Some text… [+123 chars]"), "Some text");
        assert_eq!(strip_truncation_marker("No marker here"), "No marker here");
    }

    #[test]
    fn fact_check_verdict_moves_source_quality() {
        let p = provider();
        let mut doc = Document::new("u", "t", "c");
        assert!((p.calculate_reliability(&doc).source_quality - 0.75).abs() < 1e-9);

        doc.metadata.credibility = Some(0.8);
        doc.metadata.fact_check = Some(FactCheckVerdict::Verified);
        assert!((p.calculate_reliability(&doc).source_quality - 0.9).abs() < 1e-9);

        doc.metadata.credibility = Some(0.35);
        doc.metadata.fact_check = Some(FactCheckVerdict::False);
        assert!((p.calculate_reliability(&doc).source_quality - 0.05).abs() < 1e-9);
    }

    #[test]
    fn news_has_no_citations() {
        let metrics = provider().calculate_reliability(&Document::new("u", "t", "c"));
        assert_eq!(metrics.citations, 0);
        assert!(metrics.overall_score > 0.0 && metrics.overall_score <= 1.0);
    }

    #[tokio::test]
    async fn augmentation_applies_known_outlets() {
        let docs = vec![
            Document::new("a", "t", "c").with_url("https://apnews.com/a"),
            Document::new("b", "t", "c").with_url("https://unknown.example/b"),
        ];
        let out = provider().augment(docs).await;
        assert_eq!(out[0].metadata.fact_check, Some(FactCheckVerdict::Verified));
        assert_eq!(out[1].metadata.fact_check, Some(FactCheckVerdict::Unverified));
    }

    #[tokio::test]
    async fn failed_fact_check_leaves_document_unaugmented() {
        let p = provider().with_fact_checker(Arc::new(FailingChecker));
        let docs = vec![Document::new("a", "t", "c").with_url("https://apnews.com/a")];
        let out = p.augment(docs).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].metadata.fact_check.is_none());
        assert!(out[0].metadata.credibility.is_none());
    }

    #[tokio::test]
    async fn non_url_ids_are_not_found() {
        assert!(provider().get_document("guardian:123").await.expect("ok").is_none());
        assert!(provider().get_document("ftp://x/y").await.expect("ok").is_none());
    }
}
