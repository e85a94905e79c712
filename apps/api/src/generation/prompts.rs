//! Prompt construction for template generation.
//!
//! Every builder is a pure function of its inputs. The markup described here is
//! the exact contract `extractor` parses, so the two must change together.

use crate::generation::models::{DocumentType, QuotaMap, TemplateMetadata};
use crate::generation::themes::Theme;
use crate::llm_client::prompts::{DOCUMENT_GROUNDING_INSTRUCTION, NO_PROSE_INSTRUCTION};

/// Markup every question block must follow.
pub const QUESTION_MARKUP: &str = "\
Format each section exactly like this:

<SECTION HEADER>
Question: <the question text>
Type: rating OR open_ended
Category: <the competency or theme the question measures>

Question: <the next question text>
Type: rating OR open_ended
Category: <category>";

/// Main generation prompt. Replace: {document_type}, {context}, {perspectives},
/// {skipped}, {markup}, {grounding}, {no_prose}
pub const GENERATION_PROMPT_TEMPLATE: &str = r#"Create a 360-degree feedback assessment from the attached {document_type}.

{context}

Write questions for these perspectives ONLY, with EXACTLY the number of questions stated:
{perspectives}
{skipped}
Start each perspective with its section header written exactly as shown above, on its own line.

{markup}

Rating questions must be answerable on a 1-5 scale. Open-ended questions must invite specific examples.

{grounding}

{no_prose}"#;

/// Retry prompt used after an unstructured response. Same contract, no context.
/// Replace: {document_type}, {perspectives}, {skipped}, {markup}, {no_prose}
pub const SIMPLIFIED_PROMPT_TEMPLATE: &str = r#"Read the attached {document_type}. Output assessment questions in this exact format and nothing else.

Sections and exact question counts:
{perspectives}
{skipped}
{markup}

{no_prose}"#;

/// Step 1 of two-step regeneration. Replace: {document_type}
pub const THEME_PROMPT_TEMPLATE: &str = r#"Read the attached {document_type} and list its 5 to 8 most important themes.

Respond ONLY with a numbered list, one theme per line, in this exact format:
1. Theme title: one-line description
2. Theme title: one-line description

Do NOT write anything before or after the list."#;

/// Step 2 of two-step regeneration. Replace: {themes}, {perspectives}, {skipped}, {markup}, {no_prose}
pub const THEMED_QUESTION_PROMPT_TEMPLATE: &str = r#"Write 360-degree feedback questions based ONLY on these themes:
{themes}

Sections and exact question counts (rating questions, or a mix of rating and open_ended):
{perspectives}
{skipped}
{markup}

{no_prose}"#;

/// Splits a perspective count into (rating, open-ended): ceil(70%) rating,
/// floor(30%) open-ended. Integer arithmetic keeps the split exact.
pub fn question_split(count: usize) -> (usize, usize) {
    let rating = (count * 7 + 9) / 10;
    let open_ended = count * 3 / 10;
    (rating, open_ended)
}

/// Builds the full generation prompt for the first pass.
pub fn build_generation_prompt(
    document_type: &DocumentType,
    metadata: &TemplateMetadata,
    quotas: &QuotaMap,
) -> String {
    GENERATION_PROMPT_TEMPLATE
        .replace("{document_type}", &document_type.display_name())
        .replace("{context}", &context_block(document_type, metadata))
        .replace("{perspectives}", &perspective_lines(quotas, None))
        .replace("{skipped}", &skipped_line(quotas))
        .replace("{markup}", QUESTION_MARKUP)
        .replace("{grounding}", DOCUMENT_GROUNDING_INSTRUCTION)
        .replace("{no_prose}", NO_PROSE_INSTRUCTION)
}

/// Builds the rigid retry prompt: same output contract, stripped of context.
pub fn build_simplified_prompt(document_type: &DocumentType, quotas: &QuotaMap) -> String {
    SIMPLIFIED_PROMPT_TEMPLATE
        .replace("{document_type}", &document_type.display_name())
        .replace("{perspectives}", &perspective_lines(quotas, None))
        .replace("{skipped}", &skipped_line(quotas))
        .replace("{markup}", QUESTION_MARKUP)
        .replace("{no_prose}", NO_PROSE_INSTRUCTION)
}

pub fn build_theme_prompt(document_type: &DocumentType) -> String {
    THEME_PROMPT_TEMPLATE.replace("{document_type}", &document_type.display_name())
}

/// Builds the second two-step request from extracted themes, asking for a
/// fixed number of questions per enabled perspective.
pub fn build_themed_question_prompt(
    themes: &[Theme],
    quotas: &QuotaMap,
    per_perspective: usize,
) -> String {
    let themes = themes
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {}: {}", i + 1, t.title, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    THEMED_QUESTION_PROMPT_TEMPLATE
        .replace("{themes}", &themes)
        .replace("{perspectives}", &perspective_lines(quotas, Some(per_perspective)))
        .replace("{skipped}", &skipped_line(quotas))
        .replace("{markup}", QUESTION_MARKUP)
        .replace("{no_prose}", NO_PROSE_INSTRUCTION)
}

fn context_block(document_type: &DocumentType, metadata: &TemplateMetadata) -> String {
    let mut lines = vec![format!("Document type: {}", document_type.label())];
    if !metadata.name.trim().is_empty() {
        lines.push(format!("Assessment name: {}", metadata.name));
    }
    if let Some(purpose) = non_empty(&metadata.purpose) {
        lines.push(format!("Purpose: {purpose}"));
    }
    if let Some(department) = non_empty(&metadata.department) {
        lines.push(format!("Department: {department}"));
    }
    if let Some(description) = non_empty(&metadata.description) {
        lines.push(format!("Description: {description}"));
    }
    lines.join("\n")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// One line per enabled perspective. `fixed` overrides the quota count.
fn perspective_lines(quotas: &QuotaMap, fixed: Option<usize>) -> String {
    quotas
        .enabled()
        .map(|(perspective, count)| {
            let count = fixed.unwrap_or(count);
            let (rating, open_ended) = question_split(count);
            format!(
                "- {}: exactly {} questions ({} rating, {} open_ended), answered by {}",
                perspective.section_header(),
                count,
                rating,
                open_ended,
                perspective.audience()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn skipped_line(quotas: &QuotaMap) -> String {
    let skipped: Vec<_> = quotas.disabled().map(|p| p.section_header()).collect();
    if skipped.is_empty() {
        String::new()
    } else {
        format!(
            "SKIP these perspectives entirely and do not write their sections: {}\n",
            skipped.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::models::{quotas, Perspective};

    fn metadata() -> TemplateMetadata {
        TemplateMetadata {
            name: "Senior Leader 360".to_string(),
            description: None,
            purpose: Some("Annual leadership development review".to_string()),
            department: Some("Global Operations".to_string()),
        }
    }

    #[test]
    fn test_question_split_matches_seventy_thirty() {
        assert_eq!(question_split(0), (0, 0));
        assert_eq!(question_split(1), (1, 0));
        assert_eq!(question_split(3), (3, 0));
        assert_eq!(question_split(4), (3, 1));
        assert_eq!(question_split(5), (4, 1));
        assert_eq!(question_split(10), (7, 3));
        for count in 0..50 {
            let (rating, open_ended) = question_split(count);
            assert_eq!(rating + open_ended, count);
        }
    }

    #[test]
    fn test_prompt_contains_context_verbatim() {
        let q = quotas(&[(Perspective::Manager, true, 4)]);
        let prompt = build_generation_prompt(&DocumentType::LeadershipModel, &metadata(), &q);
        assert!(prompt.contains("leadership model"));
        assert!(prompt.contains("Document type: leadership_model"));
        assert!(prompt.contains("Purpose: Annual leadership development review"));
        assert!(prompt.contains("Department: Global Operations"));
        assert!(!prompt.contains("Description:"));
    }

    #[test]
    fn test_prompt_enumerates_enabled_and_skips_disabled() {
        let q = quotas(&[
            (Perspective::Manager, true, 4),
            (Perspective::SelfAssessment, true, 10),
            (Perspective::Peer, false, 3),
        ]);
        let prompt = build_generation_prompt(&DocumentType::JobDescription, &metadata(), &q);
        assert!(prompt.contains(
            "- MANAGER ASSESSMENT QUESTIONS: exactly 4 questions (3 rating, 1 open_ended)"
        ));
        assert!(prompt.contains(
            "- SELF ASSESSMENT QUESTIONS: exactly 10 questions (7 rating, 3 open_ended)"
        ));
        assert!(!prompt.contains("- PEER ASSESSMENT QUESTIONS"));
        assert!(prompt.contains("SKIP these perspectives entirely"));
        assert!(prompt.contains("Question: <the question text>"));
        assert!(prompt.contains(NO_PROSE_INSTRUCTION));
    }

    #[test]
    fn test_simplified_prompt_drops_context() {
        let q = quotas(&[(Perspective::Peer, true, 2)]);
        let prompt = build_simplified_prompt(&DocumentType::CompetencyFramework, &q);
        assert!(!prompt.contains("Global Operations"));
        assert!(prompt.contains("PEER ASSESSMENT QUESTIONS: exactly 2 questions"));
        assert!(prompt.contains("Type: rating OR open_ended"));
    }

    #[test]
    fn test_themed_prompt_uses_fixed_count_and_lists_themes() {
        let q = quotas(&[(Perspective::Peer, true, 9), (Perspective::External, true, 1)]);
        let themes = vec![Theme {
            title: "Accountability".to_string(),
            description: "Owns outcomes".to_string(),
        }];
        let prompt = build_themed_question_prompt(&themes, &q, 4);
        assert!(prompt.contains("1. Accountability: Owns outcomes"));
        assert!(prompt.contains("PEER ASSESSMENT QUESTIONS: exactly 4 questions"));
        assert!(prompt.contains("EXTERNAL STAKEHOLDER ASSESSMENT QUESTIONS: exactly 4 questions"));
    }

    #[test]
    fn test_prompt_is_pure() {
        let q = quotas(&[(Perspective::DirectReport, true, 3)]);
        let a = build_generation_prompt(&DocumentType::LeadershipModel, &metadata(), &q);
        let b = build_generation_prompt(&DocumentType::LeadershipModel, &metadata(), &q);
        assert_eq!(a, b);
    }
}
