//! Content patterns: scientific-document detection and the low-value filter
//!
//! Paper detection runs in priority order and the first match wins:
//! 1. attachment that looks like a scientific document
//! 2. bare link to a document file
//! 3. publisher/repository domain, DOI, or keyword heuristic over the text

use crate::config::ClassifierConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ARXIV_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(arxiv[_-]?)?\d{4}\.\d{4,5}(v\d+)?\.pdf$").expect("valid arXiv pattern")
});

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bhttps?://([^\s/?#<>"']+)([^\s<>"']*)"#).expect("valid URL pattern")
});

static DOI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b10\.\d{4,9}/\S+").expect("valid DOI pattern"));

static GREETING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(hi|hii+|hello|hey+|heya|yo|sup|gm|gn|good (morning|night|evening|afternoon)|thanks|thank you|thx|ty|ok|okay|k|kk|lol|lmao|haha+|yes|no|yep|yup|nope|nice|cool|great|awesome|welcome|bye|\+1)( (all|everyone|guys|team|there|so much))?[\s!.?]*$",
    )
    .expect("valid greeting pattern")
});

const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".ps", ".djvu"];

const DOCUMENT_NAME_HINTS: &[&str] = &[
    "paper",
    "preprint",
    "manuscript",
    "article",
    "journal",
    "thesis",
    "study",
    "doi",
    "arxiv",
    "biorxiv",
    "medrxiv",
    "supplement",
];

const PUBLISHER_DOMAINS: &[&str] = &[
    "doi.org",
    "arxiv.org",
    "biorxiv.org",
    "medrxiv.org",
    "chemrxiv.org",
    "pubmed.ncbi.nlm.nih.gov",
    "ncbi.nlm.nih.gov",
    "europepmc.org",
    "nature.com",
    "science.org",
    "sciencedirect.com",
    "cell.com",
    "springer.com",
    "wiley.com",
    "plos.org",
    "frontiersin.org",
    "mdpi.com",
    "pnas.org",
    "elifesciences.org",
    "nejm.org",
    "thelancet.com",
    "jamanetwork.com",
    "bmj.com",
    "acs.org",
    "ieee.org",
    "acm.org",
    "researchgate.net",
    "semanticscholar.org",
    "scholar.google.com",
    "zenodo.org",
    "osf.io",
];

const SCIENTIFIC_KEYWORDS: &[&str] = &[
    "paper",
    "preprint",
    "publication",
    "published",
    "journal",
    "peer-reviewed",
    "peer reviewed",
    "manuscript",
    "abstract",
    "doi",
    "study",
    "clinical trial",
    "meta-analysis",
    "dataset",
    "findings",
];

/// File attached to a community message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name as uploaded
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

impl Attachment {
    /// Create attachment
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Which detector recognised scientific content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperSignal {
    /// Attachment looks like a scientific document
    Attachment,
    /// Bare link to a document file
    DocumentLink,
    /// Link to a publisher or repository domain
    PublisherDomain,
    /// DOI in the text
    Doi,
    /// Scientific keywords alongside a link
    Keywords,
}

/// Why a message was excluded from the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Greeting or acknowledgement
    Greeting,
    /// Emoji or punctuation only
    NoText,
    /// Below the minimum length
    TooShort,
    /// Below the minimum word count
    TooFewWords,
}

fn has_document_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    DOCUMENT_EXTENSIONS.iter().any(|ext| lower.ends_with(*ext))
}

fn is_scientific_attachment(attachment: &Attachment, config: &ClassifierConfig) -> bool {
    if ARXIV_FILENAME.is_match(attachment.name.trim()) {
        return true;
    }
    if !has_document_extension(&attachment.name) {
        return false;
    }
    let lower = attachment.name.to_ascii_lowercase();
    attachment.size >= config.min_document_bytes
        || DOCUMENT_NAME_HINTS.iter().any(|hint| lower.contains(*hint))
}

/// Host (lowercase, without `www.`, userinfo or port) and path of every link
fn links(text: &str) -> impl Iterator<Item = (String, &str)> {
    URL.captures_iter(text).filter_map(|caps| {
        let authority = caps.get(1)?.as_str();
        let host = authority.rsplit('@').next()?.split(':').next()?;
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        let rest = caps.get(2).map_or("", |m| m.as_str());
        Some((host, rest))
    })
}

fn is_document_path(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    has_document_extension(path.trim_end_matches('/'))
}

fn is_publisher(host: &str) -> bool {
    PUBLISHER_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// Detect scientific content in a message
#[must_use]
pub fn detect_paper(
    text: &str,
    attachments: &[Attachment],
    config: &ClassifierConfig,
) -> Option<PaperSignal> {
    if attachments
        .iter()
        .any(|a| is_scientific_attachment(a, config))
    {
        return Some(PaperSignal::Attachment);
    }

    let found: Vec<(String, &str)> = links(text).collect();
    if found.iter().any(|(_, path)| is_document_path(path)) {
        return Some(PaperSignal::DocumentLink);
    }
    if found.iter().any(|(host, _)| is_publisher(host)) {
        return Some(PaperSignal::PublisherDomain);
    }
    if DOI.is_match(text) {
        return Some(PaperSignal::Doi);
    }

    let lower = text.to_lowercase();
    let keywords = SCIENTIFIC_KEYWORDS
        .iter()
        .filter(|k| lower.contains(**k))
        .count();
    (!found.is_empty() && keywords >= 2).then_some(PaperSignal::Keywords)
}

/// Low-value filter; `None` means the message is worth counting
#[must_use]
pub fn low_value_reason(text: &str, config: &ClassifierConfig) -> Option<IgnoreReason> {
    let trimmed = text.trim();
    if GREETING.is_match(trimmed) {
        return Some(IgnoreReason::Greeting);
    }
    if !trimmed.chars().any(char::is_alphanumeric) {
        return Some(IgnoreReason::NoText);
    }
    if trimmed.chars().count() < config.min_length {
        return Some(IgnoreReason::TooShort);
    }
    if trimmed.split_whitespace().count() < config.min_words {
        return Some(IgnoreReason::TooFewWords);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClassifierConfig {
        ClassifierConfig::default()
    }

    #[test]
    fn arxiv_attachment_is_paper() {
        let attachments = [Attachment::new("2504.11091.pdf", 10_000)];
        assert_eq!(
            detect_paper("", &attachments, &config()),
            Some(PaperSignal::Attachment)
        );
    }

    #[test]
    fn small_unnamed_pdf_is_not_paper() {
        let attachments = [Attachment::new("menu.pdf", 20_000)];
        assert_eq!(detect_paper("lunch options", &attachments, &config()), None);
    }

    #[test]
    fn large_or_hinted_pdf_is_paper() {
        let large = [Attachment::new("scan.pdf", 2_000_000)];
        let hinted = [Attachment::new("Smith_preprint_v2.PDF", 1_000)];
        assert!(detect_paper("", &large, &config()).is_some());
        assert!(detect_paper("", &hinted, &config()).is_some());
    }

    #[test]
    fn images_are_not_documents() {
        let attachments = [Attachment::new("2504.11091.png", 5_000_000)];
        assert_eq!(detect_paper("", &attachments, &config()), None);
    }

    #[test]
    fn bare_document_link_is_paper() {
        let text = "see https://lab.example.com/files/results.pdf?dl=1";
        assert_eq!(
            detect_paper(text, &[], &config()),
            Some(PaperSignal::DocumentLink)
        );
    }

    #[test]
    fn publisher_domain_is_paper() {
        let text =
            "Check out this result from our trial, full writeup at https://doi.org/10.1000/xyz";
        assert_eq!(
            detect_paper(text, &[], &config()),
            Some(PaperSignal::PublisherDomain)
        );
        assert_eq!(
            detect_paper("new one: https://www.biorxiv.org/content/1", &[], &config()),
            Some(PaperSignal::PublisherDomain)
        );
    }

    #[test]
    fn lookalike_domain_is_not_publisher() {
        assert!(!is_publisher("notnature.com"));
        assert!(is_publisher("www.nature.com".trim_start_matches("www.")));
        assert!(is_publisher("link.springer.com"));
    }

    #[test]
    fn raw_doi_is_paper() {
        assert_eq!(
            detect_paper("cite as 10.1038/s41586-020-2649-2 please", &[], &config()),
            Some(PaperSignal::Doi)
        );
    }

    #[test]
    fn keywords_need_a_link() {
        let without = "the study findings in that journal were wild";
        let with = "the study findings are up at https://lab.example.com/post";
        assert_eq!(detect_paper(without, &[], &config()), None);
        assert_eq!(
            detect_paper(with, &[], &config()),
            Some(PaperSignal::Keywords)
        );
    }

    #[test]
    fn greetings_are_low_value() {
        for text in ["hey", "Hello everyone!", "gm", "thank you so much", "+1"] {
            assert_eq!(
                low_value_reason(text, &config()),
                Some(IgnoreReason::Greeting),
                "{text}"
            );
        }
    }

    #[test]
    fn emoji_only_is_low_value() {
        assert_eq!(
            low_value_reason("🎉🎉🎉 !!!", &config()),
            Some(IgnoreReason::NoText)
        );
    }

    #[test]
    fn short_and_sparse_messages_are_low_value() {
        assert_eq!(
            low_value_reason("sounds good", &config()),
            Some(IgnoreReason::TooShort)
        );
        assert_eq!(
            low_value_reason("pharmacokinetically-interesting", &config()),
            Some(IgnoreReason::TooFewWords)
        );
    }

    #[test]
    fn ordinary_message_passes_filter() {
        assert_eq!(
            low_value_reason("The assay results look promising so far!", &config()),
            None
        );
    }
}
