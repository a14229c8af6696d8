//! Academic provider federating arXiv and PubMed.
//!
//! Both upstreams are queried concurrently. arXiv answers with an Atom
//! feed; PubMed needs an `esearch` call for ids followed by an `efetch`
//! call for the records. Each upstream has its own [`RequestGate`], so the
//! fan-out stays concurrent while calls to any one upstream are serialised.
//!
//! Feeds are XML; `scraper` parses them leniently and elements are matched
//! by lowercased local name.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::content::parse_timestamp;
use crate::error::KnowledgeError;
use crate::http::{self, RequestGate};
use crate::provider::{assemble_result, KnowledgeProvider};
use crate::scoring::{
    clamp_unit, clean_content, content_quality, recency_score, weighted_overall, ContentSignals,
};
use crate::types::{
    Document, KnowledgeProviderResult, ProviderInfo, ProviderKind, ReliabilityMetrics,
    SearchOptions,
};

use super::AdapterSettings;

/// Registered name of this provider.
pub const NAME: &str = "academic";

const BASE_RELIABILITY: f64 = 0.9;
const PEER_REVIEW_BONUS: f64 = 0.05;
const PREPRINT_PENALTY: f64 = 0.1;

/// Weights for (source, content, recency, citations); citation-heavy.
const WEIGHTS: (f64, f64, f64, f64) = (0.35, 0.25, 0.15, 0.25);

/// Citations needed for a full citation term.
const CITATIONS_FOR_FULL_SCORE: f64 = 100.0;

/// arXiv API terms ask for one request every three seconds.
const ARXIV_INTERVAL: Duration = Duration::from_secs(3);
/// NCBI allows three requests per second without an API key.
const PUBMED_INTERVAL: Duration = Duration::from_millis(340);

/// Upstream base URLs, overridable for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcademicEndpoints {
    /// arXiv query endpoint.
    pub arxiv: String,
    /// NCBI E-utilities base (without trailing slash).
    pub eutils: String,
}

impl Default for AcademicEndpoints {
    fn default() -> Self {
        Self {
            arxiv: "https://export.arxiv.org/api/query".to_owned(),
            eutils: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_owned(),
        }
    }
}

/// arXiv + PubMed adapter.
pub struct AcademicProvider {
    client: reqwest::Client,
    endpoints: AcademicEndpoints,
    arxiv_gate: RequestGate,
    pubmed_gate: RequestGate,
}

impl AcademicProvider {
    /// Create an adapter against the public endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &AdapterSettings) -> Result<Self, KnowledgeError> {
        Self::with_endpoints(settings, AcademicEndpoints::default())
    }

    /// Create an adapter against custom endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Http`] if the HTTP client cannot be built.
    pub fn with_endpoints(
        settings: &AdapterSettings,
        endpoints: AcademicEndpoints,
    ) -> Result<Self, KnowledgeError> {
        Ok(Self {
            client: http::build_client(&settings.user_agent, settings.request_timeout)?,
            endpoints,
            arxiv_gate: RequestGate::with_jitter(ARXIV_INTERVAL, settings.jitter_ms),
            pubmed_gate: RequestGate::with_jitter(PUBMED_INTERVAL, settings.jitter_ms),
        })
    }

    /// Override the minimum interval of both upstream gates.
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.arxiv_gate = RequestGate::new(interval);
        self.pubmed_gate = RequestGate::new(interval);
        self
    }

    async fn search_arxiv(&self, query: &str, limit: usize) -> Result<Vec<Document>, KnowledgeError> {
        let request = self.client.get(&self.endpoints.arxiv).query(&[
            ("search_query", format!("all:{query}")),
            ("start", "0".to_owned()),
            ("max_results", limit.to_string()),
            ("sortBy", "relevance".to_owned()),
        ]);
        let feed = {
            let _pass = self.arxiv_gate.acquire().await;
            http::get_text(request, "arXiv").await?
        };
        parse_arxiv_feed(&feed)
    }

    async fn fetch_arxiv(&self, arxiv_id: &str) -> Result<Option<Document>, KnowledgeError> {
        let request = self
            .client
            .get(&self.endpoints.arxiv)
            .query(&[("id_list", arxiv_id)]);
        let feed = {
            let _pass = self.arxiv_gate.acquire().await;
            http::get_text(request, "arXiv").await?
        };
        Ok(parse_arxiv_feed(&feed)?.into_iter().next())
    }

    async fn search_pubmed(&self, query: &str, limit: usize) -> Result<Vec<Document>, KnowledgeError> {
        let request = self
            .client
            .get(format!("{}/esearch.fcgi", self.endpoints.eutils))
            .query(&[
                ("db", "pubmed".to_owned()),
                ("term", query.to_owned()),
                ("retmode", "json".to_owned()),
                ("retmax", limit.to_string()),
                ("sort", "relevance".to_owned()),
            ]);
        let ids: ESearchResponse = {
            let _pass = self.pubmed_gate.acquire().await;
            http::get_json(request, "PubMed esearch").await?
        };
        let ids = ids.esearchresult.idlist;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_pubmed(&ids).await
    }

    async fn fetch_pubmed(&self, pmids: &[String]) -> Result<Vec<Document>, KnowledgeError> {
        let request = self
            .client
            .get(format!("{}/efetch.fcgi", self.endpoints.eutils))
            .query(&[
                ("db", "pubmed"),
                ("id", &pmids.join(",")),
                ("retmode", "xml"),
            ]);
        let xml = {
            let _pass = self.pubmed_gate.acquire().await;
            http::get_text(request, "PubMed efetch").await?
        };
        let mut docs = parse_pubmed_articles(&xml)?;
        // efetch does not preserve esearch relevance order.
        docs.sort_by_key(|d| {
            pmids
                .iter()
                .position(|id| d.id.strip_prefix("pubmed:") == Some(id.as_str()))
                .unwrap_or(usize::MAX)
        });
        Ok(docs)
    }
}

#[async_trait]
impl KnowledgeProvider for AcademicProvider {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<KnowledgeProviderResult, KnowledgeError> {
        tracing::trace!(query, "academic search");
        let started = Instant::now();
        let limit = options.limit.unwrap_or(10).clamp(1, 50);

        let (arxiv, pubmed) = tokio::join!(
            self.search_arxiv(query, limit),
            self.search_pubmed(query, limit)
        );

        let mut merged = Vec::new();
        for (upstream, outcome) in [("arXiv", arxiv), ("PubMed", pubmed)] {
            match outcome {
                Ok(docs) => {
                    tracing::debug!(provider = NAME, upstream, count = docs.len(), "upstream returned documents");
                    merged.extend(docs);
                }
                Err(err) => {
                    tracing::warn!(provider = NAME, upstream, error = %err, "academic upstream failed");
                }
            }
        }

        let mut seen = HashSet::new();
        let mut scored = merged
            .into_iter()
            .filter(|doc| options.accepts(doc))
            .filter(|doc| seen.insert(title_key(&doc.title)))
            .map(|doc| {
                let metrics = self.calculate_reliability(&doc);
                (doc, metrics)
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.1.overall_score.total_cmp(&a.1.overall_score));
        scored.truncate(limit);

        Ok(assemble_result(
            query,
            NAME,
            scored,
            started.elapsed().as_millis() as u64,
        ))
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, KnowledgeError> {
        if let Some(arxiv_id) = id.strip_prefix("arxiv:") {
            return self.fetch_arxiv(arxiv_id).await;
        }
        if let Some(pmid) = id.strip_prefix("pubmed:") {
            if pmid.is_empty() || !pmid.chars().all(|c| c.is_ascii_digit()) {
                return Ok(None);
            }
            return Ok(self.fetch_pubmed(&[pmid.to_owned()]).await?.into_iter().next());
        }
        Ok(None)
    }

    fn calculate_reliability(&self, document: &Document) -> ReliabilityMetrics {
        let peer_reviewed = document.metadata.peer_reviewed;
        let source_quality = clamp_unit(match peer_reviewed {
            Some(true) => BASE_RELIABILITY + PEER_REVIEW_BONUS,
            Some(false) => BASE_RELIABILITY - PREPRINT_PENALTY,
            None => BASE_RELIABILITY,
        });
        let content_quality = content_quality(&document.content, &ContentSignals::of(document));
        let recency = recency_score(document.publication_date);
        let citations = document.metadata.citation_count.unwrap_or(0);
        let citation_term = match document.metadata.citation_count {
            Some(count) => count as f64 / CITATIONS_FOR_FULL_SCORE,
            None if peer_reviewed == Some(true) => 0.5,
            None => 0.2,
        };
        let overall_score = weighted_overall(
            WEIGHTS,
            source_quality,
            content_quality,
            recency,
            citation_term,
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
            kind: ProviderKind::Academic,
            base_reliability: BASE_RELIABILITY,
            supported_languages: vec!["en".to_owned()],
            rate_limit: self.arxiv_gate.min_interval().max(self.pubmed_gate.min_interval()),
        }
    }
}

fn title_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// Descendant elements of `root` with the given lowercased local name.
fn named<'a>(root: ElementRef<'a>, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(root: ElementRef<'_>, name: &str) -> Option<String> {
    named(root, name).next().map(text_of).filter(|t| !t.is_empty())
}

/// Parse an arXiv Atom feed into documents.
pub(crate) fn parse_arxiv_feed(xml: &str) -> Result<Vec<Document>, KnowledgeError> {
    let document = Html::parse_document(xml);
    let entry_sel = Selector::parse("entry")
        .map_err(|e| KnowledgeError::Parse(format!("invalid entry selector: {e:?}")))?;

    let mut docs = Vec::new();
    for entry in document.select(&entry_sel) {
        let Some(abs_url) = first_text(entry, "id") else {
            continue;
        };
        let Some(title) = first_text(entry, "title") else {
            continue;
        };
        let arxiv_id = abs_url.rsplit("/abs/").next().unwrap_or(&abs_url).to_owned();
        let summary = first_text(entry, "summary").unwrap_or_default();
        let authors = named(entry, "author")
            .filter_map(|a| first_text(a, "name"))
            .collect::<Vec<_>>();
        let journal_ref = first_text(entry, "arxiv:journal_ref");
        let categories = named(entry, "category")
            .filter_map(|c| c.value().attr("term").map(str::to_owned))
            .collect::<Vec<_>>();

        let mut doc = Document::new(format!("arxiv:{arxiv_id}"), title, clean_content(&summary));
        doc.url = Some(abs_url);
        doc.author = (!authors.is_empty()).then(|| authors.join(", "));
        doc.publication_date = first_text(entry, "published").and_then(|d| parse_timestamp(&d));
        doc.last_modified = first_text(entry, "updated").and_then(|d| parse_timestamp(&d));
        doc.language = Some("en".to_owned());
        doc.categories = categories;
        doc.metadata.peer_reviewed = Some(journal_ref.is_some());
        doc.metadata.journal = journal_ref;
        doc.metadata.source_name = Some("arXiv".to_owned());
        docs.push(doc);
    }
    Ok(docs)
}

/// Parse a PubMed `efetch` XML payload into documents.
pub(crate) fn parse_pubmed_articles(xml: &str) -> Result<Vec<Document>, KnowledgeError> {
    let document = Html::parse_document(xml);
    let article_sel = Selector::parse("pubmedarticle")
        .map_err(|e| KnowledgeError::Parse(format!("invalid article selector: {e:?}")))?;

    let mut docs = Vec::new();
    for article in document.select(&article_sel) {
        let Some(pmid) = first_text(article, "pmid") else {
            continue;
        };
        let Some(title) = first_text(article, "articletitle") else {
            continue;
        };
        let abstract_text = named(article, "abstracttext")
            .map(|el| match el.value().attr("label") {
                Some(label) => format!("{label}: {}", text_of(el)),
                None => text_of(el),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let journal = named(article, "journal").next().and_then(|j| first_text(j, "title"));
        let authors = named(article, "author")
            .filter_map(|a| {
                let last = first_text(a, "lastname")?;
                Some(match first_text(a, "forename") {
                    Some(first) => format!("{first} {last}"),
                    None => last,
                })
            })
            .collect::<Vec<_>>();
        let publication_types = named(article, "publicationtype").map(text_of).collect::<Vec<_>>();
        let keywords = named(article, "keyword").map(text_of).collect::<Vec<_>>();
        let pub_date = named(article, "pubdate").next().and_then(parse_pub_date);
        let preprint = publication_types.iter().any(|t| t.eq_ignore_ascii_case("preprint"));

        let mut doc = Document::new(format!("pubmed:{pmid}"), title, clean_content(&abstract_text));
        doc.url = Some(format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/"));
        doc.author = (!authors.is_empty()).then(|| authors.join(", "));
        doc.publication_date = pub_date;
        doc.language = Some("en".to_owned());
        doc.categories = keywords;
        doc.metadata.peer_reviewed = Some(!preprint);
        doc.metadata.journal = journal;
        doc.metadata.source_name = Some("PubMed".to_owned());
        docs.push(doc);
    }
    Ok(docs)
}

/// `<PubDate><Year>2020</Year><Month>Jan</Month><Day>5</Day></PubDate>`,
/// with month and day optional.
fn parse_pub_date(el: ElementRef<'_>) -> Option<DateTime<Utc>> {
    let year: i32 = first_text(el, "year")?.parse().ok()?;
    let month = first_text(el, "month").and_then(|m| parse_month(&m)).unwrap_or(1);
    let day: u32 = first_text(el, "day").and_then(|d| d.parse().ok()).unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

fn parse_month(raw: &str) -> Option<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix = raw.get(..3)?.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARXIV_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v2</id>
    <updated>2021-02-01T00:00:00Z</updated>
    <published>2021-01-01T00:00:00Z</published>
    <title>Light harvesting in
      synthetic photosynthesis</title>
    <summary>We study artificial photosynthesis.[3] Results are promising.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <arxiv:journal_ref xmlns:arxiv="http://arxiv.org/schemas/atom">Nature 1 (2021)</arxiv:journal_ref>
    <link href="http://arxiv.org/abs/2101.00001v2" rel="alternate" type="text/html"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="physics.chem-ph"/>
    <category term="physics.chem-ph" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2202.00002v1</id>
    <published>2022-02-02T00:00:00Z</published>
    <title>Unreviewed result</title>
    <summary>Preprint only.</summary>
  </entry>
</feed>"#;

    const PUBMED_XML: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2019//EN" "x.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE">
      <PMID Version="1">31234567</PMID>
      <Article>
        <Journal>
          <JournalIssue><PubDate><Year>2020</Year><Month>Mar</Month><Day>15</Day></PubDate></JournalIssue>
          <Title>Plant Physiology</Title>
        </Journal>
        <ArticleTitle>Photosynthesis under drought.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Drought limits carbon fixation.</AbstractText>
          <AbstractText Label="RESULTS">Yield fell by 20 percent.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Curie</LastName><ForeName>Marie</ForeName></Author>
        </AuthorList>
        <PublicationTypeList><PublicationType>Journal Article</PublicationType></PublicationTypeList>
      </Article>
      <KeywordList><Keyword>drought</Keyword><Keyword>photosynthesis</Keyword></KeywordList>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    fn provider() -> AcademicProvider {
        AcademicProvider::new(&AdapterSettings::default()).expect("client builds")
    }

    #[test]
    fn arxiv_feed_parses_entries() {
        let docs = parse_arxiv_feed(ARXIV_FEED).expect("parse");
        assert_eq!(docs.len(), 2);
        let first = &docs[0];
        assert_eq!(first.id, "arxiv:2101.00001v2");
        assert_eq!(first.title, "Light harvesting in synthetic photosynthesis");
        assert_eq!(first.content, "We study artificial photosynthesis. Results are promising.");
        assert_eq!(first.author.as_deref(), Some("Ada Lovelace, Alan Turing"));
        assert_eq!(first.metadata.peer_reviewed, Some(true));
        assert_eq!(first.metadata.journal.as_deref(), Some("Nature 1 (2021)"));
        assert!(first.categories.contains(&"physics.chem-ph".to_owned()));
        assert!(first.publication_date.is_some());
        assert_eq!(docs[1].metadata.peer_reviewed, Some(false));
    }

    #[test]
    fn pubmed_xml_parses_articles() {
        let docs = parse_pubmed_articles(PUBMED_XML).expect("parse");
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.id, "pubmed:31234567");
        assert_eq!(doc.title, "Photosynthesis under drought.");
        assert!(doc.content.contains("BACKGROUND: Drought limits carbon fixation."));
        assert!(doc.content.contains("RESULTS: Yield fell by 20 percent."));
        assert_eq!(doc.author.as_deref(), Some("Marie Curie"));
        assert_eq!(doc.metadata.journal.as_deref(), Some("Plant Physiology"));
        assert_eq!(doc.metadata.peer_reviewed, Some(true));
        assert_eq!(doc.categories, vec!["drought".to_owned(), "photosynthesis".to_owned()]);
        assert_eq!(
            doc.publication_date.map(|d| d.date_naive().to_string()),
            Some("2020-03-15".to_owned())
        );
        assert_eq!(doc.url.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/31234567/"));
    }

    #[test]
    fn months_parse_by_name_or_number() {
        assert_eq!(parse_month("Jan"), Some(1));
        assert_eq!(parse_month("december"), Some(12));
        assert_eq!(parse_month("7"), Some(7));
        assert_eq!(parse_month("13"), None);
        assert_eq!(parse_month("Xy"), None);
    }

    #[test]
    fn peer_review_outranks_preprint() {
        let p = provider();
        let mut reviewed = Document::new("a", "t", "c");
        reviewed.metadata.peer_reviewed = Some(true);
        let mut preprint = Document::new("b", "t", "c");
        preprint.metadata.peer_reviewed = Some(false);

        let r = p.calculate_reliability(&reviewed);
        let q = p.calculate_reliability(&preprint);
        assert!((r.source_quality - 0.95).abs() < 1e-9);
        assert!((q.source_quality - 0.8).abs() < 1e-9);
        assert!(r.overall_score > q.overall_score);
    }

    #[test]
    fn citations_dominate_when_known() {
        let p = provider();
        let mut cited = Document::new("a", "t", "c");
        cited.metadata.peer_reviewed = Some(true);
        cited.metadata.citation_count = Some(250);
        let m = p.calculate_reliability(&cited);
        assert_eq!(m.citations, 250);
        // 0.35*0.95 + 0.25*0.5 + 0.15*0.3 + 0.25*1.0
        assert!((m.overall_score - 0.7525).abs() < 1e-9);
    }

    #[test]
    fn title_key_ignores_case_and_punctuation() {
        assert_eq!(title_key("Photosynthesis, Revisited!"), title_key("photosynthesis revisited"));
    }

    #[tokio::test]
    async fn unknown_id_prefix_is_not_found() {
        assert!(provider().get_document("doi:10.1/x").await.expect("ok").is_none());
        assert!(provider().get_document("pubmed:abc").await.expect("ok").is_none());
    }
}
