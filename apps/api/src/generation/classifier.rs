//! Response classification. Decides which branch of the pipeline a raw
//! generation-service response takes.

use serde::Serialize;

use crate::generation::models::Perspective;

/// Phrasings the service uses when it could not read the attached document.
/// Matched case-insensitively; apostrophes are normalised first.
const CANNOT_SEE_PHRASES: &[&str] = &[
    "i don't see any attached",
    "i don't see any document",
    "i don't see the document",
    "i don't see an attached",
    "i do not see any attached",
    "i do not see the document",
    "i don't have access to the document",
    "i don't have access to any document",
    "i do not have access to the document",
    "i can't see the document",
    "i cannot see the document",
    "i can't see any attached",
    "i cannot see any attached",
    "no document was attached",
    "no documents were attached",
    "no document has been attached",
    "unable to access the document",
    "unable to view the document",
    "i'm unable to open the document",
    "could you please upload the document",
    "please share the document",
];

const REQUIRED_MARKERS: [&str; 3] = ["Question:", "Type:", "Category:"];

/// Default number of distinct section headers a well-formed response carries.
pub const MIN_SECTION_HEADERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    NoText,
    CannotSeeDocument,
    WellFormed,
    Unstructured,
}

/// Classifies a response using the default section threshold.
pub fn classify(response: Option<&str>) -> ResponseClass {
    classify_expecting(response, MIN_SECTION_HEADERS)
}

/// Classifies a response, requiring at least `min_sections` distinct section
/// headers for `WellFormed`. Rules apply in order: empty, cannot-see, well-formed.
pub fn classify_expecting(response: Option<&str>, min_sections: usize) -> ResponseClass {
    let text = match response.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return ResponseClass::NoText,
    };

    if mentions_missing_document(text) {
        return ResponseClass::CannotSeeDocument;
    }

    let has_markers = REQUIRED_MARKERS.iter().all(|m| text.contains(m));
    if has_markers && count_section_headers(text) >= min_sections {
        ResponseClass::WellFormed
    } else {
        ResponseClass::Unstructured
    }
}

/// Number of distinct perspective headers present in the text.
pub fn count_section_headers(text: &str) -> usize {
    Perspective::ALL
        .iter()
        .filter(|p| text.contains(p.section_header()))
        .count()
}

fn mentions_missing_document(text: &str) -> bool {
    let normalized = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    CANNOT_SEE_PHRASES.iter().any(|p| normalized.contains(p))
}
