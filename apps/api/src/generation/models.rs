//! Data model for assessment template generation: perspectives, quotas, candidates
//! and the final `GenerationResult`.

use std::collections::HashSet;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Perspectives & question types
// ────────────────────────────────────────────────────────────────────────────

/// The feedback relationship a question is asked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    #[serde(rename = "self")]
    SelfAssessment,
    Manager,
    Peer,
    DirectReport,
    External,
}

impl Perspective {
    pub const ALL: [Perspective; 5] = [
        Perspective::SelfAssessment,
        Perspective::Manager,
        Perspective::Peer,
        Perspective::DirectReport,
        Perspective::External,
    ];

    /// Wire key used in quota maps and JSON payloads.
    pub fn key(self) -> &'static str {
        match self {
            Perspective::SelfAssessment => "self",
            Perspective::Manager => "manager",
            Perspective::Peer => "peer",
            Perspective::DirectReport => "direct_report",
            Perspective::External => "external",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Section header the generation service must emit for this perspective.
    /// Case-sensitive; no header is a substring of another.
    pub fn section_header(self) -> &'static str {
        match self {
            Perspective::SelfAssessment => "SELF ASSESSMENT QUESTIONS",
            Perspective::Manager => "MANAGER ASSESSMENT QUESTIONS",
            Perspective::Peer => "PEER ASSESSMENT QUESTIONS",
            Perspective::DirectReport => "DIRECT REPORT ASSESSMENT QUESTIONS",
            Perspective::External => "EXTERNAL STAKEHOLDER ASSESSMENT QUESTIONS",
        }
    }

    /// Human description used in prompts.
    pub fn audience(self) -> &'static str {
        match self {
            Perspective::SelfAssessment => "the person being assessed, reflecting on themselves",
            Perspective::Manager => "the person's manager",
            Perspective::Peer => "colleagues working at the same level",
            Perspective::DirectReport => "people who report to the person",
            Perspective::External => "clients, partners and other external stakeholders",
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Rating,
    OpenEnded,
}

impl QuestionType {
    /// Resolves a free-form type label from generated text. The label is cut
    /// at the first character that cannot be part of a type name, so
    /// `Rating (1-5)` reads as `rating`. `multiple_choice` and anything
    /// unrecognised resolve to `None` and are dropped by callers.
    pub fn resolve(label: &str) -> Option<Self> {
        let head: String = label
            .trim()
            .trim_start_matches(|c: char| c == '*' || c == '_' || c == '`')
            .chars()
            .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' '))
            .collect();
        let normalized: String = head
            .trim()
            .trim_end_matches(|c: char| c == '_' || c == '-')
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "rating" | "rating_scale" | "likert" => Some(QuestionType::Rating),
            "open_ended" | "openended" | "open" | "text" | "textarea" => {
                Some(QuestionType::OpenEnded)
            }
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QuestionType::Rating => "rating",
            QuestionType::OpenEnded => "open_ended",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Questions
// ────────────────────────────────────────────────────────────────────────────

/// Category used when extraction cannot determine one.
pub const DEFAULT_CATEGORY: &str = "General";

/// A question produced before quota balancing. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub category: String,
    pub perspective: Perspective,
    pub required: bool,
}

impl Candidate {
    pub fn new(
        text: impl Into<String>,
        kind: QuestionType,
        category: impl Into<String>,
        perspective: Perspective,
    ) -> Self {
        let category = category.into();
        Self {
            text: text.into(),
            kind,
            category: if category.trim().is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                category
            },
            perspective,
            required: true,
        }
    }

    pub fn into_question(self, order: u32) -> Question {
        Question {
            text: self.text,
            kind: self.kind,
            category: self.category,
            perspective: self.perspective,
            required: self.required,
            order,
        }
    }
}

/// A question in the final template. `order` starts at 1 and is contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub category: String,
    pub perspective: Perspective,
    pub required: bool,
    pub order: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Document types & metadata
// ────────────────────────────────────────────────────────────────────────────

/// Declared type of the source document. Unrecognised labels are kept verbatim
/// and routed to the generic fallback table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentType {
    LeadershipModel,
    JobDescription,
    CompetencyFramework,
    Other(String),
}

impl DocumentType {
    pub fn label(&self) -> &str {
        match self {
            DocumentType::LeadershipModel => "leadership_model",
            DocumentType::JobDescription => "job_description",
            DocumentType::CompetencyFramework => "competency_framework",
            DocumentType::Other(label) => label,
        }
    }

    /// Readable name used inside prompts.
    pub fn display_name(&self) -> String {
        match self {
            DocumentType::LeadershipModel => "leadership model".to_string(),
            DocumentType::JobDescription => "job description".to_string(),
            DocumentType::CompetencyFramework => "competency framework".to_string(),
            DocumentType::Other(label) if label.trim().is_empty() => "document".to_string(),
            DocumentType::Other(label) => label.replace('_', " "),
        }
    }
}

impl From<String> for DocumentType {
    fn from(value: String) -> Self {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "leadership_model" => DocumentType::LeadershipModel,
            "job_description" => DocumentType::JobDescription,
            "competency_framework" => DocumentType::CompetencyFramework,
            _ => DocumentType::Other(value),
        }
    }
}

impl From<&str> for DocumentType {
    fn from(value: &str) -> Self {
        DocumentType::from(value.to_string())
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.label().to_string()
    }
}

/// Template metadata. Opaque to the pipeline except for prompt construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

/// Reference to a document already uploaded to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Quotas
// ────────────────────────────────────────────────────────────────────────────

/// Largest question count a single perspective may request.
pub const MAX_QUESTIONS_PER_PERSPECTIVE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveQuota {
    pub enabled: bool,
    pub question_count: usize,
}

/// Caller contract violations on the quota map. The only condition the
/// pipeline rejects outright.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("unknown perspective '{0}'")]
    UnknownPerspective(String),

    #[error("perspective '{perspective}' requests a negative question count ({count})")]
    NegativeCount { perspective: String, count: i64 },

    #[error("perspective '{0}' is declared more than once")]
    DuplicatePerspective(String),

    #[error("perspective '{perspective}' requests {count} questions (at most {max} allowed)")]
    CountTooLarge {
        perspective: String,
        count: i64,
        max: usize,
    },
}

/// A quota entry exactly as the caller sent it, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuota {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(rename = "questionCount", alias = "question_count", default)]
    pub question_count: i64,
}

fn default_enabled() -> bool {
    true
}

/// Quota map as sent by the caller, keeping declaration order.
#[derive(Debug, Clone, Default)]
pub struct RawQuotaMap(pub Vec<(String, RawQuota)>);

impl<'de> Deserialize<'de> for RawQuotaMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = RawQuotaMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of perspective keys to quota objects")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, quota)) = map.next_entry::<String, RawQuota>()? {
                    entries.push((key, quota));
                }
                Ok(RawQuotaMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Validated per-perspective quotas in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaMap {
    entries: Vec<(Perspective, PerspectiveQuota)>,
}

impl QuotaMap {
    pub fn new(
        entries: impl IntoIterator<Item = (Perspective, PerspectiveQuota)>,
    ) -> Result<Self, QuotaError> {
        let mut seen = HashSet::new();
        let mut validated = Vec::new();
        for (perspective, quota) in entries {
            if !seen.insert(perspective) {
                return Err(QuotaError::DuplicatePerspective(perspective.key().to_string()));
            }
            if quota.question_count > MAX_QUESTIONS_PER_PERSPECTIVE {
                return Err(QuotaError::CountTooLarge {
                    perspective: perspective.key().to_string(),
                    count: i64::try_from(quota.question_count).unwrap_or(i64::MAX),
                    max: MAX_QUESTIONS_PER_PERSPECTIVE,
                });
            }
            validated.push((perspective, quota));
        }
        Ok(Self { entries: validated })
    }

    /// All declared entries, enabled or not, in declaration order.
    pub fn entries(&self) -> &[(Perspective, PerspectiveQuota)] {
        &self.entries
    }

    /// Enabled perspectives with their counts, in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = (Perspective, usize)> + '_ {
        self.entries
            .iter()
            .filter(|(_, q)| q.enabled)
            .map(|(p, q)| (*p, q.question_count))
    }

    pub fn disabled(&self) -> impl Iterator<Item = Perspective> + '_ {
        self.entries
            .iter()
            .filter(|(_, q)| !q.enabled)
            .map(|(p, _)| *p)
    }

    pub fn total_required(&self) -> usize {
        self.enabled()
            .fold(0usize, |total, (_, count)| total.saturating_add(count))
    }
}

impl TryFrom<RawQuotaMap> for QuotaMap {
    type Error = QuotaError;

    fn try_from(raw: RawQuotaMap) -> Result<Self, Self::Error> {
        let mut entries = Vec::with_capacity(raw.0.len());
        for (key, quota) in raw.0 {
            let perspective = Perspective::from_key(key.trim())
                .ok_or_else(|| QuotaError::UnknownPerspective(key.clone()))?;
            if quota.question_count < 0 {
                return Err(QuotaError::NegativeCount {
                    perspective: key,
                    count: quota.question_count,
                });
            }
            let question_count = usize::try_from(quota.question_count)
                .ok()
                .filter(|count| *count <= MAX_QUESTIONS_PER_PERSPECTIVE)
                .ok_or_else(|| QuotaError::CountTooLarge {
                    perspective: key.clone(),
                    count: quota.question_count,
                    max: MAX_QUESTIONS_PER_PERSPECTIVE,
                })?;
            entries.push((
                perspective,
                PerspectiveQuota {
                    enabled: quota.enabled,
                    question_count,
                },
            ));
        }
        QuotaMap::new(entries)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Result
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    Ai,
    TwoStep,
    Fallback,
}

impl GenerationMethod {
    pub fn label(self) -> &'static str {
        match self {
            GenerationMethod::Ai => "ai",
            GenerationMethod::TwoStep => "two_step",
            GenerationMethod::Fallback => "fallback",
        }
    }
}

/// The sole output artifact of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub questions: Vec<Question>,
    pub generation_method: GenerationMethod,
}

#[cfg(test)]
pub(crate) fn quotas(entries: &[(Perspective, bool, usize)]) -> QuotaMap {
    QuotaMap::new(entries.iter().map(|&(p, enabled, count)| {
        (
            p,
            PerspectiveQuota {
                enabled,
                question_count: count,
            },
        )
    }))
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_quota_map_keeps_declaration_order() {
        let json = r#"{
            "peer": {"enabled": true, "questionCount": 3},
            "manager": {"enabled": true, "questionCount": 2},
            "self": {"enabled": false, "questionCount": 4}
        }"#;
        let raw: RawQuotaMap = serde_json::from_str(json).unwrap();
        let map = QuotaMap::try_from(raw).unwrap();

        let order: Vec<_> = map.entries().iter().map(|(p, _)| *p).collect();
        assert_eq!(
            order,
            vec![
                Perspective::Peer,
                Perspective::Manager,
                Perspective::SelfAssessment
            ]
        );
        assert_eq!(map.total_required(), 5);
        assert_eq!(
            map.disabled().collect::<Vec<_>>(),
            vec![Perspective::SelfAssessment]
        );
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let raw: RawQuotaMap =
            serde_json::from_str(r#"{"manager": {"enabled": true, "questionCount": -1}}"#)
                .unwrap();
        assert_eq!(
            QuotaMap::try_from(raw),
            Err(QuotaError::NegativeCount {
                perspective: "manager".to_string(),
                count: -1
            })
        );
    }

    #[test]
    fn test_unknown_perspective_is_rejected() {
        let raw: RawQuotaMap =
            serde_json::from_str(r#"{"customer": {"enabled": true, "questionCount": 2}}"#)
                .unwrap();
        assert!(matches!(
            QuotaMap::try_from(raw),
            Err(QuotaError::UnknownPerspective(key)) if key == "customer"
        ));
    }

    #[test]
    fn test_duplicate_perspective_is_rejected() {
        let raw: RawQuotaMap = serde_json::from_str(
            r#"{"peer": {"questionCount": 1}, "peer": {"questionCount": 2}}"#,
        )
        .unwrap();
        assert!(matches!(
            QuotaMap::try_from(raw),
            Err(QuotaError::DuplicatePerspective(_))
        ));
    }

    #[test]
    fn test_oversized_count_is_rejected() {
        let raw: RawQuotaMap = serde_json::from_str(
            r#"{"peer": {"enabled": true, "questionCount": 9223372036854775807}}"#,
        )
        .unwrap();
        assert_eq!(
            QuotaMap::try_from(raw),
            Err(QuotaError::CountTooLarge {
                perspective: "peer".to_string(),
                count: i64::MAX,
                max: MAX_QUESTIONS_PER_PERSPECTIVE,
            })
        );
    }

    #[test]
    fn test_count_at_limit_is_accepted() {
        let json = format!(
            r#"{{"peer": {{"questionCount": {max}}}, "manager": {{"questionCount": {max}}}}}"#,
            max = MAX_QUESTIONS_PER_PERSPECTIVE
        );
        let raw: RawQuotaMap = serde_json::from_str(&json).unwrap();
        let map = QuotaMap::try_from(raw).unwrap();
        assert_eq!(map.total_required(), 2 * MAX_QUESTIONS_PER_PERSPECTIVE);
    }

    #[test]
    fn test_new_rejects_count_above_limit() {
        let result = QuotaMap::new([(
            Perspective::External,
            PerspectiveQuota {
                enabled: false,
                question_count: usize::MAX,
            },
        )]);
        assert!(matches!(result, Err(QuotaError::CountTooLarge { .. })));
    }

    #[test]
    fn test_snake_case_count_alias_accepted() {
        let raw: RawQuotaMap =
            serde_json::from_str(r#"{"direct_report": {"enabled": true, "question_count": 6}}"#)
                .unwrap();
        let map = QuotaMap::try_from(raw).unwrap();
        assert_eq!(
            map.enabled().collect::<Vec<_>>(),
            vec![(Perspective::DirectReport, 6)]
        );
    }

    #[test]
    fn test_question_type_resolution() {
        assert_eq!(QuestionType::resolve("rating"), Some(QuestionType::Rating));
        assert_eq!(QuestionType::resolve("Rating"), Some(QuestionType::Rating));
        assert_eq!(
            QuestionType::resolve("open-ended"),
            Some(QuestionType::OpenEnded)
        );
        assert_eq!(
            QuestionType::resolve("Open Ended"),
            Some(QuestionType::OpenEnded)
        );
        assert_eq!(
            QuestionType::resolve("Rating (1-5)"),
            Some(QuestionType::Rating)
        );
        assert_eq!(
            QuestionType::resolve("**open_ended**."),
            Some(QuestionType::OpenEnded)
        );
        assert_eq!(
            QuestionType::resolve("Likert: 1-5 scale"),
            Some(QuestionType::Rating)
        );
        assert_eq!(QuestionType::resolve("multiple_choice"), None);
        assert_eq!(QuestionType::resolve("(rating)"), None);
        assert_eq!(QuestionType::resolve(""), None);
    }

    #[test]
    fn test_document_type_round_trips_known_and_unknown_labels() {
        assert_eq!(
            DocumentType::from("Leadership Model"),
            DocumentType::LeadershipModel
        );
        let other = DocumentType::from("values_charter");
        assert_eq!(other, DocumentType::Other("values_charter".to_string()));
        assert_eq!(String::from(other), "values_charter");
    }

    #[test]
    fn test_question_serializes_with_wire_names() {
        let question = Candidate::new(
            "How clearly does this person communicate?",
            QuestionType::OpenEnded,
            "",
            Perspective::DirectReport,
        )
        .into_question(1);
        let value = serde_json::to_value(&question).unwrap();
        assert_eq!(value["type"], "open_ended");
        assert_eq!(value["perspective"], "direct_report");
        assert_eq!(value["category"], DEFAULT_CATEGORY);
        assert_eq!(value["order"], 1);
    }

    #[test]
    fn test_self_perspective_serializes_as_self() {
        let value = serde_json::to_value(Perspective::SelfAssessment).unwrap();
        assert_eq!(value, "self");
    }
}
