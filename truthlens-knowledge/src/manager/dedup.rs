//! Cross-provider document deduplication.
//!
//! Two documents are the same when their canonical URLs match, or, for
//! documents without a usable URL, when their titles match after
//! lowercasing and removing whitespace. The first occurrence in rank order
//! wins.

use std::collections::HashSet;

use url::Url;

use crate::types::Document;

/// Query parameters that never change the page being referenced.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid", "ref", "cmpid", "ocid"];

/// Canonical form of a URL for equality checks.
///
/// Lowercases scheme and host, drops `www.` and the `m.` mobile label,
/// default ports, fragments, `utm_*` and other tracking parameters and a
/// trailing path slash, and sorts what is left of the query. Input that
/// does not parse as an absolute URL is returned trimmed.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_owned();
    };
    url.set_fragment(None);

    if let Some(host) = url.host_str() {
        let host = host.strip_prefix("www.").unwrap_or(host);
        // en.m.wikipedia.org and en.wikipedia.org are the same article.
        let host = host.replacen(".m.", ".", 1);
        let host = host.strip_prefix("m.").map(str::to_owned).unwrap_or(host);
        if url.set_host(Some(&host)).is_err() {
            return raw.to_owned();
        }
    }

    if matches!((url.scheme(), url.port()), ("http", Some(80)) | ("https", Some(443))) {
        // Only fails for URLs that cannot carry a port, which have none.
        let _ = url.set_port(None);
    }

    let mut params = url
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect::<Vec<_>>();
    params.sort();
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    let trimmed = url.path().trim_end_matches('/').to_owned();
    if !trimmed.is_empty() {
        url.set_path(&trimmed);
    }

    // http and https copies of a page are the same page.
    url.as_str()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_owned()
}

/// Lowercased title with all whitespace removed.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Dedup key of a document: URL when present, title otherwise.
pub fn dedup_key(document: &Document) -> String {
    match document.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => format!("url:{}", normalize_url(url)),
        None => format!("title:{}", normalize_title(&document.title)),
    }
}

/// Keep the first document for each dedup key, preserving order.
pub fn deduplicate(documents: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::with_capacity(documents.len());
    documents
        .into_iter()
        .filter(|doc| seen.insert(dedup_key(doc)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, url: Option<&str>) -> Document {
        let d = Document::new(id, title, "body");
        match url {
            Some(u) => d.with_url(u),
            None => d,
        }
    }

    #[test]
    fn equivalent_urls_share_a_key() {
        let a = normalize_url("https://www.Example.COM/path/?b=2&a=1&utm_source=x#top");
        let b = normalize_url("http://example.com:80/path?a=1&b=2");
        assert_eq!(a, b);
        assert_eq!(a, "example.com/path?a=1&b=2");
    }

    #[test]
    fn mobile_hosts_collapse() {
        assert_eq!(
            normalize_url("https://en.m.wikipedia.org/wiki/Photosynthesis"),
            normalize_url("https://en.wikipedia.org/wiki/Photosynthesis")
        );
        assert_eq!(
            normalize_url("https://m.example.com/a"),
            normalize_url("https://example.com/a")
        );
    }

    #[test]
    fn distinct_paths_stay_distinct() {
        assert_ne!(
            normalize_url("https://example.com/a"),
            normalize_url("https://example.com/b")
        );
        assert_ne!(
            normalize_url("https://example.com/a?id=1"),
            normalize_url("https://example.com/a?id=2")
        );
    }

    #[test]
    fn tracking_params_removed() {
        assert_eq!(
            normalize_url("https://news.example/story?fbclid=1&utm_medium=e&id=7"),
            "news.example/story?id=7"
        );
    }

    #[test]
    fn unparseable_input_passes_through() {
        assert_eq!(normalize_url("  not a url "), "not a url");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn titles_ignore_case_and_whitespace() {
        assert_eq!(normalize_title("The  Earth\tis Round"), "theearthisround");
    }

    #[test]
    fn url_takes_precedence_over_title() {
        let with_url = doc("1", "Same", Some("https://a.example/x"));
        let other_url = doc("2", "Same", Some("https://b.example/x"));
        assert_ne!(dedup_key(&with_url), dedup_key(&other_url));

        let blank_url = doc("3", "Same Title", Some("  "));
        let no_url = doc("4", "same title", None);
        assert_eq!(dedup_key(&blank_url), dedup_key(&no_url));
    }

    #[test]
    fn first_occurrence_wins() {
        let docs = vec![
            doc("wiki-1", "Photosynthesis", Some("https://en.wikipedia.org/wiki/Photosynthesis")),
            doc("news-9", "Photosynthesis explained", Some("https://example.com/p")),
            doc("acad-3", "Photosynthesis (copy)", Some("https://en.wikipedia.org/wiki/Photosynthesis/")),
            doc("t-1", "Light Reactions", None),
            doc("t-2", "light reactions", None),
        ];
        let kept = deduplicate(docs);
        let ids = kept.iter().map(|d| d.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["wiki-1", "news-9", "t-1"]);
    }
}
