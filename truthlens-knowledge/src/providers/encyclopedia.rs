//! Encyclopedia provider backed by the Wikipedia MediaWiki API.
//!
//! A single `generator=search` query returns matching pages together with
//! their plain-text intro extracts, categories, last-touched timestamps and
//! WikiProject assessment classes, so one request per search is enough.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::KnowledgeError;
use crate::http::{self, RequestGate};
use crate::provider::{assemble_result, KnowledgeProvider};
use crate::scoring::{
    clean_content, content_quality, count_citation_markers, recency_score, weighted_overall,
    ContentSignals,
};
use crate::types::{
    Document, KnowledgeProviderResult, ProviderInfo, ProviderKind, ReliabilityMetrics,
    SearchOptions,
};

use super::{sanitize_language, AdapterSettings};

/// Registered name of this provider.
pub const NAME: &str = "wikipedia";

/// Source quality when no assessment class is available.
const BASE_RELIABILITY: f64 = 0.85;

/// Weights for (source, content, recency, citations).
const WEIGHTS: (f64, f64, f64, f64) = (0.3, 0.4, 0.2, 0.1);

/// Citation markers needed for a full citation term.
const CITATIONS_FOR_FULL_SCORE: f64 = 20.0;

/// MediaWiki asks API clients to keep request rates modest.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

const SUPPORTED_LANGUAGES: &[&str] = &[
    "en", "de", "fr", "es", "it", "pt", "nl", "pl", "ru", "ja", "zh", "sv", "uk",
];

/// Source quality implied by a WikiProject assessment class.
pub fn assessment_quality(class: &str) -> Option<f64> {
    match class.trim().to_ascii_uppercase().as_str() {
        "FA" => Some(1.0),
        "A" => Some(0.95),
        "GA" => Some(0.9),
        "B" => Some(0.8),
        "C" => Some(0.7),
        "START" => Some(0.6),
        "STUB" => Some(0.5),
        _ => None,
    }
}

/// Wikipedia adapter.
pub struct EncyclopediaProvider {
    client: reqwest::Client,
    gate: RequestGate,
    base_url: Option<String>,
}

impl EncyclopediaProvider {
    /// Create an adapter that picks the wiki from the search language.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &AdapterSettings) -> Result<Self, KnowledgeError> {
        Ok(Self {
            client: http::build_client(&settings.user_agent, settings.request_timeout)?,
            gate: RequestGate::with_jitter(MIN_REQUEST_INTERVAL, settings.jitter_ms),
            base_url: None,
        })
    }

    /// Pin every request to one wiki (or a mock server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    fn api_url(&self, language: Option<&str>) -> String {
        let base = match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => {
                let lang = sanitize_language(language).unwrap_or_else(|| "en".to_owned());
                format!("https://{lang}.wikipedia.org")
            }
        };
        format!("{base}/w/api.php")
    }

    async fn query(&self, params: &[(&str, String)], language: Option<&str>) -> Result<ApiResponse, KnowledgeError> {
        let request = self.client.get(self.api_url(language)).query(params);
        let _pass = self.gate.acquire().await;
        http::get_json(request, "Wikipedia").await
    }
}

#[async_trait]
impl KnowledgeProvider for EncyclopediaProvider {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<KnowledgeProviderResult, KnowledgeError> {
        tracing::trace!(query, "Wikipedia search");
        let started = Instant::now();
        let limit = options.limit.unwrap_or(10).clamp(1, 20);
        let language = options.language.as_deref();

        let mut params = page_props();
        params.extend([
            ("generator", "search".to_owned()),
            ("gsrsearch", query.to_owned()),
            ("gsrlimit", limit.to_string()),
            ("exintro", "1".to_owned()),
        ]);

        let response = match self.query(&params, language).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(provider = NAME, error = %err, "encyclopedia search failed");
                return Ok(KnowledgeProviderResult::empty(query, NAME));
            }
        };

        let mut pages = response.query.map(|q| q.pages).unwrap_or_default();
        pages.sort_by_key(|p| p.index.unwrap_or(u32::MAX));

        let lang = sanitize_language(language).unwrap_or_else(|| "en".to_owned());
        let scored = pages
            .into_iter()
            .filter(|p| !p.missing)
            .map(|p| p.into_document(&lang))
            .filter(|doc| options.accepts(doc))
            .take(limit)
            .map(|doc| {
                let metrics = self.calculate_reliability(&doc);
                (doc, metrics)
            })
            .collect::<Vec<_>>();

        tracing::debug!(provider = NAME, count = scored.len(), "encyclopedia returned documents");
        Ok(assemble_result(
            query,
            NAME,
            scored,
            started.elapsed().as_millis() as u64,
        ))
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, KnowledgeError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Ok(None);
        }
        let mut params = page_props();
        params.push(("pageids", id.to_owned()));
        let response = self.query(&params, None).await?;
        Ok(response
            .query
            .and_then(|q| q.pages.into_iter().find(|p| !p.missing))
            .map(|p| p.into_document("en")))
    }

    fn calculate_reliability(&self, document: &Document) -> ReliabilityMetrics {
        let source_quality = document
            .metadata
            .assessment_class
            .as_deref()
            .and_then(assessment_quality)
            .unwrap_or(BASE_RELIABILITY);
        let content_quality = content_quality(&document.content, &ContentSignals::of(document));
        let recency = recency_score(document.freshest_date());
        let citations = document.metadata.citation_count.unwrap_or(0);
        let overall_score = weighted_overall(
            WEIGHTS,
            source_quality,
            content_quality,
            recency,
            citations as f64 / CITATIONS_FOR_FULL_SCORE,
        );
        ReliabilityMetrics {
            source_quality,
            content_quality,
            recency,
            citations,
            overall_score,
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: NAME.to_owned(),
            kind: ProviderKind::Encyclopedia,
            base_reliability: BASE_RELIABILITY,
            supported_languages: SUPPORTED_LANGUAGES.iter().map(|s| (*s).to_owned()).collect(),
            rate_limit: self.gate.min_interval(),
        }
    }
}

/// Query parameters shared by search and page lookup.
fn page_props() -> Vec<(&'static str, String)> {
    vec![
        ("action", "query".to_owned()),
        ("format", "json".to_owned()),
        ("formatversion", "2".to_owned()),
        ("prop", "extracts|info|pageassessments|categories".to_owned()),
        ("explaintext", "1".to_owned()),
        ("exlimit", "max".to_owned()),
        ("inprop", "url".to_owned()),
        ("cllimit", "max".to_owned()),
        ("clshow", "!hidden".to_owned()),
        ("palimit", "max".to_owned()),
    ]
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    query: Option<QueryBlock>,
}

#[derive(Debug, Deserialize)]
struct QueryBlock {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    pageid: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    extract: String,
    touched: Option<DateTime<Utc>>,
    fullurl: Option<String>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    pageassessments: BTreeMap<String, Assessment>,
}

#[derive(Debug, Deserialize)]
struct Category {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Assessment {
    #[serde(default)]
    class: String,
}

impl Page {
    fn into_document(self, language: &str) -> Document {
        let citation_count = count_citation_markers(&self.extract) as u64;
        // Highest class across WikiProjects; projects disagree occasionally.
        let assessment_class = self
            .pageassessments
            .values()
            .filter(|a| assessment_quality(&a.class).is_some())
            .max_by(|a, b| {
                let qa = assessment_quality(&a.class).unwrap_or(0.0);
                let qb = assessment_quality(&b.class).unwrap_or(0.0);
                qa.total_cmp(&qb)
            })
            .map(|a| a.class.clone());

        let mut doc = Document::new(self.pageid.to_string(), self.title, clean_content(&self.extract));
        doc.url = self.fullurl;
        doc.last_modified = self.touched;
        doc.language = Some(language.to_owned());
        doc.categories = self
            .categories
            .into_iter()
            .map(|c| c.title.trim_start_matches("Category:").to_owned())
            .collect();
        doc.metadata.assessment_class = assessment_class;
        doc.metadata.citation_count = Some(citation_count);
        doc.metadata.source_name = Some("Wikipedia".to_owned());
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> EncyclopediaProvider {
        EncyclopediaProvider::new(&AdapterSettings::default()).expect("client builds")
    }

    const SEARCH_JSON: &str = r#"{
        "batchcomplete": true,
        "query": {"pages": [
            {"pageid": 2, "ns": 0, "title": "Flat Earth", "index": 2,
             "extract": "The flat Earth model is an archaic conception.[1]",
             "touched": "2024-05-01T10:00:00Z",
             "fullurl": "https://en.wikipedia.org/wiki/Flat_Earth",
             "categories": [{"ns": 14, "title": "Category:Obsolete scientific theories"}],
             "pageassessments": {"Astronomy": {"class": "B", "importance": "Mid"},
                                 "History": {"class": "GA", "importance": "Low"}}},
            {"pageid": 1, "ns": 0, "title": "Earth", "index": 1,
             "extract": "Earth is the third planet from the Sun.",
             "touched": "2024-06-01T10:00:00Z",
             "fullurl": "https://en.wikipedia.org/wiki/Earth"}
        ]}
    }"#;

    #[test]
    fn assessment_table_orders_classes() {
        assert_eq!(assessment_quality("FA"), Some(1.0));
        assert_eq!(assessment_quality("ga"), Some(0.9));
        assert_eq!(assessment_quality("Stub"), Some(0.5));
        assert_eq!(assessment_quality("Start"), Some(0.6));
        assert_eq!(assessment_quality("List"), None);
    }

    #[test]
    fn pages_map_to_documents() {
        let response: ApiResponse = serde_json::from_str(SEARCH_JSON).expect("parse");
        let pages = response.query.expect("query block").pages;
        let doc = pages.into_iter().next().expect("page").into_document("en");
        assert_eq!(doc.id, "2");
        assert_eq!(doc.title, "Flat Earth");
        assert_eq!(doc.content, "The flat Earth model is an archaic conception.");
        assert_eq!(doc.categories, vec!["Obsolete scientific theories".to_owned()]);
        assert_eq!(doc.metadata.assessment_class.as_deref(), Some("GA"));
        assert_eq!(doc.metadata.citation_count, Some(1));
        assert!(doc.last_modified.is_some());
    }

    #[test]
    fn empty_response_has_no_pages() {
        let response: ApiResponse = serde_json::from_str(r#"{"batchcomplete": true}"#).expect("parse");
        assert!(response.query.is_none());
    }

    #[test]
    fn assessment_class_overrides_base_quality() {
        let p = provider();
        let mut doc = Document::new("1", "t", "c");
        assert!((p.calculate_reliability(&doc).source_quality - BASE_RELIABILITY).abs() < 1e-9);
        doc.metadata.assessment_class = Some("FA".into());
        assert!((p.calculate_reliability(&doc).source_quality - 1.0).abs() < 1e-9);
        doc.metadata.assessment_class = Some("Stub".into());
        assert!((p.calculate_reliability(&doc).source_quality - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reliability_is_weighted_sum() {
        let p = provider();
        let mut doc = Document::new("1", "t", "short text");
        doc.metadata.assessment_class = Some("FA".into());
        let m = p.calculate_reliability(&doc);
        // 0.3*1.0 + 0.4*0.5 + 0.2*0.3 (undated) + 0.1*0
        assert!((m.overall_score - 0.56).abs() < 1e-9);
        assert!(m.overall_score <= 1.0);
    }

    #[test]
    fn api_url_uses_language_subdomain() {
        let p = provider();
        assert_eq!(p.api_url(None), "https://en.wikipedia.org/w/api.php");
        assert_eq!(p.api_url(Some("de")), "https://de.wikipedia.org/w/api.php");
        assert_eq!(p.api_url(Some("bad/lang")), "https://en.wikipedia.org/w/api.php");
        let pinned = provider().with_base_url("http://127.0.0.1:9000/");
        assert_eq!(pinned.api_url(Some("de")), "http://127.0.0.1:9000/w/api.php");
    }

    #[test]
    fn provider_info_describes_encyclopedia() {
        let info = provider().provider_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.kind, ProviderKind::Encyclopedia);
        assert!(info.supported_languages.contains(&"en".to_owned()));
        assert_eq!(info.rate_limit, MIN_REQUEST_INTERVAL);
    }

    #[tokio::test]
    async fn non_numeric_ids_are_not_found() {
        let doc = provider().get_document("Earth").await.expect("no request made");
        assert!(doc.is_none());
    }
}
