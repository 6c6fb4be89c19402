//! Keyword classification of tariff-related text.
//!
//! Article and announcement text is matched against fixed lexicons (country
//! aliases, industry terms, tariff types, action verbs) using whole-word
//! case-insensitive regexes compiled once per [`Classifier`]. Matched labels
//! keep lexicon order, so output is deterministic for a given text.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// Keyword lexicon: label → alias list.
pub type Lexicon = &'static [(&'static str, &'static [&'static str])];

pub const COUNTRY_LEXICON: Lexicon = &[
    ("United States", &["united states", "u.s.", "usa", "america"]),
    ("China", &["china", "chinese"]),
    ("European Union", &["european union", "eu", "europe"]),
    ("Canada", &["canada", "canadian"]),
    ("Mexico", &["mexico", "mexican"]),
    ("Japan", &["japan", "japanese"]),
    ("South Korea", &["south korea", "korean"]),
    ("United Kingdom", &["uk", "britain", "british", "united kingdom"]),
    ("Brazil", &["brazil", "brazilian"]),
    ("India", &["india", "indian"]),
    ("Australia", &["australia", "australian"]),
    ("Vietnam", &["vietnam", "vietnamese"]),
    ("Taiwan", &["taiwan", "taiwanese"]),
    ("Russia", &["russia", "russian"]),
    ("Germany", &["germany", "german"]),
];

pub const INDUSTRY_LEXICON: Lexicon = &[
    ("Steel", &["steel", "metal", "metallurgical"]),
    ("Aluminum", &["aluminum", "aluminium"]),
    ("Automotive", &["automotive", "car", "vehicle", "auto"]),
    ("Agriculture", &["agriculture", "farm", "crop", "food", "livestock"]),
    ("Technology", &["technology", "tech", "electronics"]),
    ("Energy", &["energy", "oil", "gas", "solar", "renewable"]),
    ("Textiles", &["textile", "clothing", "apparel", "fabric"]),
    ("Pharmaceuticals", &["pharmaceutical", "drug", "medicine"]),
    ("Chemicals", &["chemical", "petrochemical"]),
    ("Semiconductor", &["semiconductor", "chip", "microchip"]),
];

pub const TARIFF_TYPE_LEXICON: Lexicon = &[
    ("Reciprocal", &["reciprocal", "reciprocity"]),
    ("Retaliatory", &["retaliatory", "retaliation", "retaliate"]),
    ("Protective", &["protective", "protection", "safeguard"]),
    ("Anti-dumping", &["anti-dumping", "dumping"]),
    ("Countervailing", &["countervailing", "subsidy", "subsidies"]),
    ("De Minimis", &["de minimis", "minimum threshold", "duty free"]),
    ("Section 301", &["section 301", "301 tariff"]),
    ("Section 232", &["section 232", "232 tariff"]),
];

pub const ACTION_LEXICON: Lexicon = &[
    (
        "Implementation",
        &["implemented", "imposed", "introduced", "announced", "enacted"],
    ),
    ("Increase", &["increased", "raised", "hiked"]),
    ("Removal", &["removed", "eliminated", "dropped", "lifted"]),
    ("Reduction", &["reduced", "lowered", "cut", "decreased"]),
    ("Exemption", &["exempted", "exemption", "waived", "waiver"]),
    ("Response", &["responded", "retaliated", "counter"]),
];

/// Substring keywords that mark a document as trade-relevant at all.
pub const RELEVANCE_KEYWORDS: &[&str] = &[
    "tariff",
    "trade",
    "import duty",
    "export",
    "customs",
    "section 301",
    "section 232",
];

const HIGHLIGHT_KEYWORDS: &[&str] = &["tariff", "percent", "duty", "import", "export", "trade"];

static NEWS_RATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(\d+(?:\.\d+)?)\s*percent(?:\s+tariff|\s+duty)?",
        r"(?i)(\d+(?:\.\d+)?)\s*%(?:\s+tariff|\s+duty)?",
        r"(?i)tariff\s*of\s*(\d+(?:\.\d+)?)\s*%",
        r"(?i)(\d+(?:\.\d+)?)\s*%\s*duty",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static ANNOUNCEMENT_RATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(\d+(?:\.\d+)?)\s*percent",
        r"(?i)(\d+(?:\.\d+)?)\s*%",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}(?:st|nd|rd|th)?,\s+\d{4}",
    )
    .unwrap()
});

/// Labels detected in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub countries: Vec<String>,
    pub industries: Vec<String>,
    pub tariff_types: Vec<String>,
    pub actions: Vec<String>,
}

impl Classification {
    /// A measure is `active` if the text describes a tariff being put in
    /// place or raised; anything else (removal, exemption, pure commentary)
    /// is `inactive`.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self
            .actions
            .iter()
            .any(|a| a == "Implementation" || a == "Increase")
        {
            "active"
        } else {
            "inactive"
        }
    }

    /// First detected tariff type, `"Unknown"` when none matched.
    #[must_use]
    pub fn tariff_type(&self) -> &str {
        self.tariff_types.first().map_or("Unknown", String::as_str)
    }
}

/// Compiled lexicon matcher. Construction is the expensive part; share one
/// instance across a cycle.
pub struct Classifier {
    countries: Vec<(&'static str, Regex)>,
    industries: Vec<(&'static str, Regex)>,
    tariff_types: Vec<(&'static str, Regex)>,
    actions: Vec<(&'static str, Regex)>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            countries: compile_lexicon(COUNTRY_LEXICON),
            industries: compile_lexicon(INDUSTRY_LEXICON),
            tariff_types: compile_lexicon(TARIFF_TYPE_LEXICON),
            actions: compile_lexicon(ACTION_LEXICON),
        }
    }

    /// Runs all four lexicons over `text`.
    #[must_use]
    pub fn classify(&self, text: &str) -> Classification {
        Classification {
            countries: match_labels(&self.countries, text),
            industries: match_labels(&self.industries, text),
            tariff_types: match_labels(&self.tariff_types, text),
            actions: match_labels(&self.actions, text),
        }
    }
}

fn compile_lexicon(lexicon: Lexicon) -> Vec<(&'static str, Regex)> {
    lexicon
        .iter()
        .map(|(label, aliases)| {
            let alternation = aliases
                .iter()
                .map(|a| regex::escape(a))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)\b(?:{alternation})\b");
            // Patterns are built from fixed escaped literals.
            (*label, Regex::new(&pattern).unwrap())
        })
        .collect()
}

fn match_labels(compiled: &[(&'static str, Regex)], text: &str) -> Vec<String> {
    compiled
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(label, _)| (*label).to_string())
        .collect()
}

/// Cheap substring relevance check used to pre-filter announcements.
#[must_use]
pub fn is_trade_relevant(text: &str) -> bool {
    let lowered = text.to_lowercase();
    RELEVANCE_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Extracts tariff rates from article text as percentages (four overlapping
/// patterns, all matches kept in pattern order, duplicates included;
/// captures that fail numeric parsing are dropped).
#[must_use]
pub fn extract_article_rates(text: &str) -> Vec<f64> {
    extract_rates(&NEWS_RATE_PATTERNS, text)
}

/// Extracts tariff rates from announcement text (bare percent patterns).
#[must_use]
pub fn extract_announcement_rates(text: &str) -> Vec<f64> {
    extract_rates(&ANNOUNCEMENT_RATE_PATTERNS, text)
}

fn extract_rates(patterns: &[Regex], text: &str) -> Vec<f64> {
    patterns
        .iter()
        .flat_map(|re| {
            re.captures_iter(text)
                .filter_map(|c| c.get(1))
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Extracts spelled-out dates ("April 2nd, 2025"). Only the month-name form
/// is recognized; numeric dates are ignored.
#[must_use]
pub fn extract_dates(text: &str) -> Vec<String> {
    DATE_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Splits on sentence-final punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    for (idx, ch) in text.char_indices() {
        if prev_terminal && ch.is_whitespace() {
            if idx > start {
                sentences.push(&text[start..idx]);
            }
            start = idx + ch.len_utf8();
        }
        prev_terminal = matches!(ch, '.' | '!' | '?');
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

fn sentence_is_highlight(sentence: &str) -> bool {
    let lowered = sentence.to_lowercase();
    HIGHLIGHT_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Highlight sentences from an announcement body, capped at 5.
#[must_use]
pub fn announcement_highlights(body: &str) -> Vec<String> {
    split_sentences(body)
        .into_iter()
        .filter(|s| sentence_is_highlight(s))
        .map(|s| s.trim().to_string())
        .take(5)
        .collect()
}

/// Highlights for a news article: the description leads, then keyword-bearing
/// content sentences, capped at 3 entries total.
#[must_use]
pub fn article_highlights(description: &str, content: &str) -> Vec<String> {
    let mut highlights = Vec::new();
    if !description.is_empty() {
        highlights.push(description.to_string());
    }
    for sentence in split_sentences(content) {
        if highlights.len() >= 3 {
            break;
        }
        if sentence_is_highlight(sentence) {
            highlights.push(sentence.trim().to_string());
        }
    }
    highlights
}

/// Stable measure id: source prefix + first 16 hex chars of SHA-256(url).
///
/// Re-collecting the same URL always maps to the same row, so repeated
/// cycles upsert instead of duplicating.
#[must_use]
pub fn measure_id(prefix: &str, url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hex: String = digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect();
    format!("{prefix}{hex}")
}
