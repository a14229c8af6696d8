//! HTML text extraction for article pages and API snippets.
//!
//! News adapters fetch full article pages when a single document is
//! requested; this module strips page chrome (scripts, navigation, ads),
//! finds the article body and reads the publication metadata that the
//! reliability scoring uses.

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

use crate::error::{KnowledgeError, Result};
use crate::scoring::clean_content;

/// Default maximum characters kept from an article body.
pub const DEFAULT_MAX_CHARS: usize = 50_000;

/// Elements removed together with their content before parsing.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe", "form",
];

/// Readable content of a fetched article page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedArticle {
    /// The URL that was fetched.
    pub url: String,
    /// Headline from `og:title` or `<title>`.
    pub title: String,
    /// Cleaned article text.
    pub text: String,
    /// Byline from `<meta name="author">`.
    pub author: Option<String>,
    /// From `article:published_time`.
    pub published: Option<DateTime<Utc>>,
    /// From `article:modified_time`.
    pub modified: Option<DateTime<Utc>>,
    /// Number of words in `text`.
    pub word_count: usize,
}

/// Extract the article body and metadata from an HTML page.
///
/// # Errors
///
/// Returns [`KnowledgeError::Parse`] if no readable text is found.
pub fn extract_article(html: &str, url: &str) -> Result<ExtractedArticle> {
    extract_article_with_limit(html, url, DEFAULT_MAX_CHARS)
}

/// Same as [`extract_article`] with a custom character limit.
///
/// # Errors
///
/// Returns [`KnowledgeError::Parse`] if no readable text is found.
pub fn extract_article_with_limit(html: &str, url: &str, max_chars: usize) -> Result<ExtractedArticle> {
    let document = Html::parse_document(html);
    let title = meta_content(&document, r#"meta[property="og:title"]"#)
        .or_else(|| first_text(&document, "title"))
        .unwrap_or_default();
    let author = meta_content(&document, r#"meta[name="author"]"#);
    let published = meta_content(&document, r#"meta[property="article:published_time"]"#)
        .and_then(|v| parse_timestamp(&v));
    let modified = meta_content(&document, r#"meta[property="article:modified_time"]"#)
        .and_then(|v| parse_timestamp(&v));

    let body = Html::parse_document(&strip_boilerplate(html));
    let text = clean_content(&main_text(&body));
    if text.is_empty() {
        return Err(KnowledgeError::Parse("no readable article text".into()));
    }
    let text = truncate_chars(&text, max_chars);
    let word_count = text.split_whitespace().count();

    Ok(ExtractedArticle {
        url: url.to_owned(),
        title,
        text,
        author,
        published,
        modified,
        word_count,
    })
}

/// Plain text of an HTML fragment such as a search snippet.
pub fn strip_html(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    let text: String = parsed.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse RFC 3339 or `YYYY-MM-DD` timestamps.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_owned())
        .filter(|c| !c.is_empty())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_owned())
        .filter(|t| !t.is_empty())
}

/// Text of the first non-empty content root, falling back to `<body>`.
fn main_text(document: &Html) -> String {
    for selector in ["article", "[itemprop=\"articleBody\"]", "main", "[role=\"main\"]", "body"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<Vec<_>>().join(" ");
            if !text.trim().is_empty() {
                return text;
            }
        }
    }
    String::new()
}

fn strip_boilerplate(html: &str) -> String {
    BOILERPLATE_TAGS
        .iter()
        .fold(html.to_owned(), |acc, tag| strip_tag(&acc, tag))
}

/// Remove every `<tag ...>...</tag>` span, matching the tag name exactly.
fn strip_tag(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(offset) = lower[pos..].find(&open) {
        let start = pos + offset;
        let after = start + open.len();
        let boundary = lower.as_bytes().get(after).copied();
        if !matches!(boundary, None | Some(b' ' | b'>' | b'/' | b'\n' | b'\r' | b'\t')) {
            // `<navigate>` is not `<nav>`.
            result.push_str(&html[pos..after]);
            pos = after;
            continue;
        }

        result.push_str(&html[pos..start]);
        pos = match lower[start..].find(&close) {
            Some(end) => start + end + close.len(),
            None => lower[start..].find('>').map_or(html.len(), |end| start + end + 1),
        };
    }
    result.push_str(&html[pos..]);
    result
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].trim_end().to_owned(),
        None => text.to_owned(),
    }
}
