//! Theme extraction and two-step regeneration.
//!
//! Used when the first pass yields too few candidates: step 1 asks the service
//! only for a short numbered list of themes, step 2 asks for questions built
//! from those themes in the regular question markup.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::generation::classifier::{classify, ResponseClass};
use crate::generation::extractor::{extract_candidates, strip_markdown};
use crate::generation::models::{Candidate, DocumentRef, DocumentType, QuotaMap};
use crate::generation::prompts::{build_theme_prompt, build_themed_question_prompt};
use crate::llm_client::{complete_text, GenerationRequest, TextGenerator};

/// Themes kept from a numbered list.
const MAX_THEMES: usize = 8;
/// Longest description carried into the step-2 prompt, in characters.
const MAX_DESCRIPTION_CHARS: usize = 160;

/// Vocabulary scanned when the service does not return a numbered list.
const THEME_KEYWORDS: &[&str] = &[
    "leadership",
    "communication",
    "decision",
    "strategy",
    "vision",
    "teamwork",
    "collaboration",
    "empathy",
    "innovation",
    "integrity",
    "accountability",
    "performance",
    "development",
    "coaching",
    "feedback",
];

const DEFAULT_THEMES: &[(&str, &str)] = &[
    ("Leadership", "Sets direction and inspires others to achieve shared goals"),
    ("Communication", "Shares information clearly and listens actively"),
    ("Collaboration", "Works effectively with others across teams"),
    ("Decision Making", "Makes timely, well-reasoned decisions"),
    ("Professional Development", "Grows own capabilities and supports the growth of others"),
];

static NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t>*_#]*\d{1,2}[.)][ \t]+(?P<item>.+)$").unwrap());

static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+|\n+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub title: String,
    pub description: String,
}

/// Turns a step-1 response into themes. Never returns an empty list.
pub fn extract_themes(response: Option<&str>) -> Vec<Theme> {
    let text = match (classify(response), response) {
        (ResponseClass::NoText | ResponseClass::CannotSeeDocument, _) | (_, None) => {
            return default_themes()
        }
        (_, Some(text)) => text,
    };

    let listed = parse_numbered_themes(text);
    if !listed.is_empty() {
        return listed;
    }

    let scanned = keyword_themes(text);
    if !scanned.is_empty() {
        return scanned;
    }

    default_themes()
}

/// Parses `1. Title: description` style lines.
pub fn parse_numbered_themes(text: &str) -> Vec<Theme> {
    NUMBERED_ITEM
        .captures_iter(text)
        .filter_map(|caps| {
            let item = strip_markdown(&caps["item"]);
            let (title, description) = split_title(&item);
            let title = strip_markdown(title);
            if title.is_empty() {
                return None;
            }
            let description = strip_markdown(description);
            Some(Theme {
                description: if description.is_empty() {
                    title.clone()
                } else {
                    truncate_chars(&description, MAX_DESCRIPTION_CHARS)
                },
                title,
            })
        })
        .take(MAX_THEMES)
        .collect()
}

/// One theme per vocabulary keyword found, described by the first sentence
/// that mentions it.
pub fn keyword_themes(text: &str) -> Vec<Theme> {
    let sentences: Vec<&str> = SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    THEME_KEYWORDS
        .iter()
        .filter_map(|keyword| {
            sentences
                .iter()
                .find(|s| s.to_lowercase().contains(keyword))
                .map(|sentence| Theme {
                    title: capitalize(keyword),
                    description: truncate_chars(&strip_markdown(sentence), MAX_DESCRIPTION_CHARS),
                })
        })
        .take(MAX_THEMES)
        .collect()
}

pub fn default_themes() -> Vec<Theme> {
    DEFAULT_THEMES
        .iter()
        .map(|(title, description)| Theme {
            title: (*title).to_string(),
            description: (*description).to_string(),
        })
        .collect()
}

/// Result of the two-step path.
#[derive(Debug, Clone)]
pub struct TwoStepOutcome {
    pub themes: Vec<Theme>,
    pub candidates: Vec<Candidate>,
}

/// Runs both two-step requests. Always issues exactly two calls; failures in
/// either step degrade to default themes or an empty candidate list.
pub async fn regenerate(
    service: &dyn TextGenerator,
    documents: &[DocumentRef],
    document_type: &DocumentType,
    quotas: &QuotaMap,
    per_perspective: usize,
    timeout: Duration,
) -> TwoStepOutcome {
    let theme_request = GenerationRequest::new(build_theme_prompt(document_type))
        .with_documents(documents);
    let theme_text = complete_text(service, &theme_request, timeout).await;
    let themes = extract_themes(theme_text.as_deref());
    info!("Two-step: extracted {} themes", themes.len());

    let question_request =
        GenerationRequest::new(build_themed_question_prompt(&themes, quotas, per_perspective));
    let candidates = match complete_text(service, &question_request, timeout).await {
        Some(text) => extract_candidates(&text, quotas.enabled().map(|(p, _)| p)),
        None => {
            warn!("Two-step: themed question request returned no text");
            Vec::new()
        }
    };
    info!("Two-step: extracted {} candidates", candidates.len());

    TwoStepOutcome { themes, candidates }
}

fn split_title(item: &str) -> (&str, &str) {
    for separator in [": ", " - ", " – ", " — "] {
        if let Some((title, description)) = item.split_once(separator) {
            return (title, description);
        }
    }
    match item.strip_suffix(':') {
        Some(title) => (title, ""),
        None => (item, ""),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let mut truncated: String = value.chars().take(max).collect();
        truncated.push('…');
        truncated
    }
}
