//! Claim verification heuristics.
//!
//! A claim is reduced to keywords; a retrieved document *matches* when it
//! contains at least [`MATCH_THRESHOLD`] of them, and a matching document
//! *contradicts* when its text carries a negation or denial marker. The
//! verdict then follows a fixed table over the supporting and
//! contradicting counts.

use crate::error::KnowledgeError;
use crate::types::{ClaimVerificationResult, Document, Verification};

/// Fraction of claim keywords a document must contain to match.
pub const MATCH_THRESHOLD: f64 = 0.6;

/// Maximum keywords taken from one claim.
pub const MAX_KEYWORDS: usize = 10;

/// Documents requested per claim.
pub const EVIDENCE_LIMIT: usize = 8;

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "being", "but", "by", "can", "could", "did", "do", "does", "for", "from",
    "had", "has", "have", "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "more", "most", "of", "on", "or", "our", "she", "should", "so", "some", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "those", "to", "too",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your",
];

const NEGATION_MARKERS: &[&str] = &[
    "not", "no", "never", "false", "incorrect", "wrong", "untrue", "dispute", "disputed",
    "disputes", "deny", "denies", "denied", "refute", "refutes", "refuted", "debunk",
    "debunked", "myth", "isn't", "aren't", "wasn't", "weren't", "doesn't", "don't", "didn't",
    "cannot", "can't",
];

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|t| t.replace('\u{2019}', "'").trim_matches('\'').to_lowercase())
        .filter(|t| !t.is_empty())
}

/// Lowercased content words of a claim: stop words and words of two
/// characters or fewer removed, at most [`MAX_KEYWORDS`]. Repeated words
/// are kept and count once per occurrence in [`keyword_overlap`].
pub fn claim_keywords(claim: &str) -> Vec<String> {
    tokens(claim)
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(&t.as_str()))
        .take(MAX_KEYWORDS)
        .collect()
}

/// Fraction of `keywords` found in `haystack` (already lowercased).
pub fn keyword_overlap(keywords: &[String], haystack: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let found = keywords.iter().filter(|k| haystack.contains(k.as_str())).count();
    found as f64 / keywords.len() as f64
}

/// Whether the text contains a negation or denial word.
pub fn has_negation(text: &str) -> bool {
    tokens(text).any(|t| NEGATION_MARKERS.contains(&t.as_str()))
}

/// Matching documents split by stance.
#[derive(Debug, Default)]
pub struct Evidence {
    /// Matching documents without a negation marker.
    pub supporting: Vec<Document>,
    /// Matching documents with a negation marker.
    pub contradicting: Vec<Document>,
}

/// Sort documents into supporting and contradicting evidence. Documents
/// below the match threshold are ignored.
pub fn classify(keywords: &[String], documents: Vec<Document>) -> Evidence {
    let mut evidence = Evidence::default();
    for doc in documents {
        let text = format!("{} {}", doc.title, doc.content).to_lowercase();
        if keyword_overlap(keywords, &text) < MATCH_THRESHOLD {
            continue;
        }
        if has_negation(&text) {
            evidence.contradicting.push(doc);
        } else {
            evidence.supporting.push(doc);
        }
    }
    evidence
}

/// Verdict and confidence for the given counts.
///
/// `retrieved` is the number of documents the search returned, matched or
/// not; it only separates "nothing found" from "nothing relevant".
pub fn verdict(supporting: usize, contradicting: usize, retrieved: usize) -> (Verification, f64) {
    let (s, c) = (supporting as f64, contradicting as f64);
    match (supporting, contradicting) {
        (2.., 0) => (Verification::Verified, (0.7 + 0.05 * s).min(0.95)),
        (_, 2..) => (Verification::Contradicted, (0.7 + 0.05 * c).min(0.95)),
        (1.., 1..) => (Verification::Partial, (0.5 + 0.05 * (s + c)).min(0.7)),
        (1, 0) => (Verification::Partial, 0.5),
        (0, 1) => (Verification::Unsupported, 0.4),
        _ if retrieved > 0 => (Verification::Unsupported, 0.3),
        _ => (Verification::Unsupported, 0.2),
    }
}

/// Verify one claim against retrieved documents.
pub fn assess(claim: &str, documents: Vec<Document>) -> ClaimVerificationResult {
    let retrieved = documents.len();
    let keywords = claim_keywords(claim);
    let evidence = classify(&keywords, documents);
    let (s, c) = (evidence.supporting.len(), evidence.contradicting.len());
    let (verification, confidence) = verdict(s, c, retrieved);

    let explanation = match verification {
        Verification::Verified => format!(
            "{s} supporting and no contradicting documents among {retrieved} retrieved"
        ),
        Verification::Contradicted => format!(
            "{c} contradicting and {s} supporting documents among {retrieved} retrieved"
        ),
        Verification::Partial => format!(
            "mixed or limited evidence: {s} supporting, {c} contradicting among {retrieved} retrieved"
        ),
        Verification::Unsupported if retrieved == 0 => {
            "no documents found for this claim".to_owned()
        }
        Verification::Unsupported => format!(
            "insufficient evidence: {s} supporting, {c} contradicting among {retrieved} retrieved"
        ),
    };

    ClaimVerificationResult {
        claim: claim.to_owned(),
        verification,
        confidence,
        supporting_documents: evidence.supporting,
        contradicting_documents: evidence.contradicting,
        explanation,
    }
}

/// Result recorded when the search behind a claim failed.
pub fn search_failed(claim: &str, error: &KnowledgeError) -> ClaimVerificationResult {
    ClaimVerificationResult {
        claim: claim.to_owned(),
        verification: Verification::Unsupported,
        confidence: 0.1,
        supporting_documents: Vec::new(),
        contradicting_documents: Vec::new(),
        explanation: format!("evidence search failed: {error}"),
    }
}

/// Result for a claim with nothing to search for.
pub fn empty_claim(claim: &str) -> ClaimVerificationResult {
    ClaimVerificationResult {
        claim: claim.to_owned(),
        verification: Verification::Unsupported,
        confidence: 0.2,
        supporting_documents: Vec::new(),
        contradicting_documents: Vec::new(),
        explanation: "claim has no searchable keywords".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, content: &str) -> Document {
        Document::new(title, title, content)
    }

    #[test]
    fn keywords_drop_stop_and_short_words() {
        assert_eq!(claim_keywords("The Earth is flat"), vec!["earth", "flat"]);
        assert_eq!(
            claim_keywords("Water boils at 100 degrees at sea level, water!"),
            vec!["water", "boils", "100", "degrees", "sea", "level", "water"]
        );
        assert!(claim_keywords("It is so").is_empty());
    }

    #[test]
    fn keywords_are_capped() {
        let claim = "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima";
        assert_eq!(claim_keywords(claim).len(), MAX_KEYWORDS);
    }

    #[test]
    fn overlap_counts_substrings() {
        let kw = claim_keywords("photosynthesis converts light energy");
        let overlap = keyword_overlap(&kw, "plants use light for photosynthesis");
        assert!((overlap - 0.5).abs() < 1e-9);
        assert_eq!(keyword_overlap(&[], "anything"), 0.0);
    }

    #[test]
    fn repeated_keywords_weigh_per_occurrence() {
        let kw = claim_keywords("vaccines cause autism, vaccines");
        assert_eq!(kw, vec!["vaccines", "cause", "autism", "vaccines"]);
        let overlap = keyword_overlap(&kw, "vaccines were studied at length");
        assert!((overlap - 0.5).abs() < 1e-9);
    }

    #[test]
    fn negation_is_token_based() {
        assert!(has_negation("the earth is not flat"));
        assert!(has_negation("scientists refuted it"));
        assert!(has_negation("it isn't true"));
        assert!(has_negation("it doesn\u{2019}t hold"));
        assert!(!has_negation("nothing notable happened"));
        assert!(!has_negation("a knot in the rope"));
    }

    fn assert_verdict(got: (Verification, f64), verification: Verification, confidence: f64) {
        assert_eq!(got.0, verification);
        assert!((got.1 - confidence).abs() < 1e-9, "confidence {} != {confidence}", got.1);
    }

    #[test]
    fn verdict_table() {
        assert_verdict(verdict(2, 0, 5), Verification::Verified, 0.8);
        assert_verdict(verdict(10, 0, 10), Verification::Verified, 0.95);
        assert_verdict(verdict(0, 3, 3), Verification::Contradicted, 0.85);
        assert_eq!(verdict(3, 2, 5).0, Verification::Contradicted);
        assert_verdict(verdict(1, 1, 2), Verification::Partial, 0.6);
        assert_verdict(verdict(6, 1, 7), Verification::Partial, 0.7);
        assert_verdict(verdict(1, 0, 1), Verification::Partial, 0.5);
        assert_verdict(verdict(0, 1, 1), Verification::Unsupported, 0.4);
        assert_verdict(verdict(0, 0, 4), Verification::Unsupported, 0.3);
        assert_verdict(verdict(0, 0, 0), Verification::Unsupported, 0.2);
    }

    #[test]
    fn two_supporting_documents_verify() {
        let docs = vec![
            doc("Water", "Pure water boils at 100 degrees Celsius at sea level."),
            doc("Boiling point", "At sea level water boils at 100 degrees."),
            doc("Unrelated", "Cats sleep a lot."),
        ];
        let result = assess("Water boils at 100 degrees at sea level", docs);
        assert_eq!(result.verification, Verification::Verified);
        assert!(result.confidence >= 0.7);
        assert_eq!(result.supporting_documents.len(), 2);
        assert!(result.explanation.contains("2 supporting"));
    }

    #[test]
    fn denials_contradict() {
        let docs = vec![
            doc("Flat Earth", "The earth is not flat; it is an oblate spheroid."),
            doc("Myths", "The flat earth idea has been refuted for centuries."),
            doc("Geodesy", "Measurements show the earth is never flat."),
        ];
        let result = assess("The earth is flat", docs);
        assert_eq!(result.verification, Verification::Contradicted);
        assert!(result.confidence >= 0.7);
        assert_eq!(result.contradicting_documents.len(), 3);
    }

    #[test]
    fn no_matches_is_unsupported() {
        let result = assess("Quantum gravity unified", vec![doc("Cooking", "Pasta recipes")]);
        assert_eq!(result.verification, Verification::Unsupported);
        assert!(result.confidence <= 0.4);
        let empty = assess("Quantum gravity unified", vec![]);
        assert_eq!(empty.confidence, 0.2);
        assert_eq!(empty.explanation, "no documents found for this claim");
    }

    #[test]
    fn failures_and_empty_claims_degrade() {
        let err = KnowledgeError::NoProviders;
        let failed = search_failed("x", &err);
        assert_eq!(failed.verification, Verification::Unsupported);
        assert!(failed.explanation.contains("no knowledge providers"));
        assert_eq!(empty_claim("is a").confidence, 0.2);
    }
}
