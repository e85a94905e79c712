//! Section & question extraction from well-formed generation output.
//!
//! Sections are located by their fixed, case-sensitive headers; a section runs
//! until the next header of another perspective (or the end of the text).
//! Question blocks are parsed with a strict pattern first and a line scan second.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::generation::models::{Candidate, Perspective, QuestionType, DEFAULT_CATEGORY};

/// `Question: …` / `Type: …` / `Category: …`, tolerating blocks that share a
/// line or are separated by blank lines.
static QUESTION_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Question:[ \t]*(?P<text>[^\n]+?)\s*Type:[ \t]*(?P<kind>[^\n]+?)\s*Category:[ \t]*(?P<category>[^\n]*)",
    )
    .unwrap()
});

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[-*+•]|\d+[.)])\s+").unwrap());

/// Extracts candidates for the given perspectives. Output follows document
/// order: sections in the order they appear, blocks in the order written.
pub fn extract_candidates(
    text: &str,
    perspectives: impl IntoIterator<Item = Perspective>,
) -> Vec<Candidate> {
    let mut sections: Vec<(usize, Perspective, &str)> = perspectives
        .into_iter()
        .filter_map(|p| locate_section(text, p).map(|(start, body)| (start, p, body)))
        .collect();
    sections.sort_by_key(|(start, _, _)| *start);

    sections
        .into_iter()
        .flat_map(|(_, perspective, body)| {
            let parsed = parse_section(body, perspective);
            debug!("Extracted {} {} candidates", parsed.len(), perspective);
            parsed
        })
        .collect()
}

/// Finds the section for `perspective`, returning its start offset and body.
/// First occurrence of the header wins.
pub fn locate_section(text: &str, perspective: Perspective) -> Option<(usize, &str)> {
    let header = perspective.section_header();
    let header_at = text.find(header)?;
    let start = header_at + header.len();
    let rest = &text[start..];

    let end = Perspective::ALL
        .iter()
        .filter(|other| **other != perspective)
        .filter_map(|other| rest.find(other.section_header()))
        .min()
        .unwrap_or(rest.len());

    Some((header_at, &rest[..end]))
}

/// Parses one section body into candidates for `perspective`.
pub fn parse_section(body: &str, perspective: Perspective) -> Vec<Candidate> {
    let cleaned = clean_markup(body);

    let strict: Vec<Candidate> = QUESTION_BLOCK
        .captures_iter(&cleaned)
        .filter_map(|caps| {
            build_candidate(
                &caps["text"],
                Some(&caps["kind"]),
                Some(&caps["category"]),
                perspective,
            )
        })
        .collect();

    // Blocks dropped for an unsupported type still count as strict matches.
    if QUESTION_BLOCK.is_match(&cleaned) {
        return strict;
    }
    scan_lines(&cleaned, perspective)
}

/// Line-oriented fallback: any line starting with `Question:` opens a
/// candidate; following `Type:`/`Category:` lines attach to it.
fn scan_lines(body: &str, perspective: Perspective) -> Vec<Candidate> {
    struct Pending {
        text: String,
        kind: Option<String>,
        category: Option<String>,
    }

    let mut out = Vec::new();
    let mut current: Option<Pending> = None;

    let flush = |pending: Option<Pending>, out: &mut Vec<Candidate>| {
        if let Some(p) = pending {
            if let Some(c) =
                build_candidate(&p.text, p.kind.as_deref(), p.category.as_deref(), perspective)
            {
                out.push(c);
            }
        }
    };

    for line in body.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Question:") {
            flush(current.take(), &mut out);
            current = Some(Pending {
                text: rest.trim().to_string(),
                kind: None,
                category: None,
            });
        } else if let Some(rest) = line.strip_prefix("Type:") {
            if let Some(p) = current.as_mut() {
                p.kind = Some(rest.trim().to_string());
            }
        } else if let Some(rest) = line.strip_prefix("Category:") {
            if let Some(p) = current.as_mut() {
                p.category = Some(rest.trim().to_string());
            }
        } else if !line.is_empty() {
            // Wrapped question text continues until the type line.
            if let Some(p) = current.as_mut().filter(|p| p.kind.is_none()) {
                p.text.push(' ');
                p.text.push_str(line);
            }
        }
    }
    flush(current.take(), &mut out);

    out
}

fn build_candidate(
    text: &str,
    kind: Option<&str>,
    category: Option<&str>,
    perspective: Perspective,
) -> Option<Candidate> {
    let text = strip_markdown(text);
    if text.is_empty() {
        return None;
    }
    let kind = QuestionType::resolve(kind?)?;
    let category = category
        .map(strip_markdown)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    Some(Candidate::new(text, kind, category, perspective))
}

/// Removes emphasis, code and heading markup line by line so the block
/// pattern sees bare `Question:`/`Type:`/`Category:` labels.
fn clean_markup(body: &str) -> String {
    body.lines()
        .map(|line| {
            let line = line.replace("**", "").replace("__", "").replace('`', "");
            let line = line.trim().trim_start_matches('#').trim_start();
            LIST_MARKER.replace(line, "").into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strips markdown emphasis, heading and code markup from a single value.
pub fn strip_markdown(value: &str) -> String {
    let value = value.replace("**", "").replace("__", "").replace('`', "");
    let value = value.trim().trim_start_matches('#').trim();
    let value = LIST_MARKER.replace(value, "");
    value
        .trim()
        .trim_matches(|c: char| c == '*' || c == '_')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str, kind: &str, category: &str) -> String {
        format!("Question: {text}\nType: {kind}\nCategory: {category}\n\n")
    }

    #[test]
    fn test_round_trip_of_known_tuples() {
        let tuples = [
            (Perspective::Manager, "How well does this person delegate?", QuestionType::Rating, "Delegation"),
            (Perspective::Manager, "What should this person start doing?", QuestionType::OpenEnded, "Development"),
            (Perspective::SelfAssessment, "How clearly do you set priorities?", QuestionType::Rating, "Planning"),
            (Perspective::Peer, "How reliable is this colleague?", QuestionType::Rating, "Reliability"),
            (Perspective::DirectReport, "What helps you most?", QuestionType::OpenEnded, "Support"),
            (Perspective::External, "How responsive is this person?", QuestionType::Rating, "Service"),
        ];

        let mut text = String::new();
        for perspective in [
            Perspective::Manager,
            Perspective::SelfAssessment,
            Perspective::Peer,
            Perspective::DirectReport,
            Perspective::External,
        ] {
            let rows: Vec<_> = tuples.iter().filter(|t| t.0 == perspective).collect();
            text.push_str(perspective.section_header());
            text.push('\n');
            for (_, q, kind, category) in rows {
                text.push_str(&block(q, kind.label(), category));
            }
        }

        let extracted = extract_candidates(&text, Perspective::ALL);
        assert_eq!(extracted.len(), tuples.len());
        for (candidate, (perspective, q, kind, category)) in extracted.iter().zip(tuples.iter()) {
            assert_eq!(candidate.perspective, *perspective);
            assert_eq!(candidate.text, *q);
            assert_eq!(candidate.kind, *kind);
            assert_eq!(candidate.category, *category);
        }
    }

    #[test]
    fn test_markdown_is_stripped() {
        let text = "## MANAGER ASSESSMENT QUESTIONS\n\
            1. **Question:** *How well does this leader coach?*\n\
            **Type:** `rating`\n\
            **Category:** __Coaching__\n";
        let extracted = extract_candidates(text, [Perspective::Manager]);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].text, "How well does this leader coach?");
        assert_eq!(extracted[0].kind, QuestionType::Rating);
        assert_eq!(extracted[0].category, "Coaching");
    }

    #[test]
    fn test_section_ends_at_next_header() {
        let text = format!(
            "PEER ASSESSMENT QUESTIONS\n{}SELF ASSESSMENT QUESTIONS\n{}",
            block("Peer question?", "rating", "A"),
            block("Self question?", "rating", "B"),
        );
        let peer = extract_candidates(&text, [Perspective::Peer]);
        assert_eq!(peer.len(), 1);
        assert_eq!(peer[0].text, "Peer question?");
    }

    #[test]
    fn test_document_order_across_sections() {
        let text = format!(
            "SELF ASSESSMENT QUESTIONS\n{}MANAGER ASSESSMENT QUESTIONS\n{}",
            block("Self first?", "rating", "A"),
            block("Manager second?", "rating", "B"),
        );
        let extracted = extract_candidates(&text, [Perspective::Manager, Perspective::SelfAssessment]);
        assert_eq!(extracted[0].perspective, Perspective::SelfAssessment);
        assert_eq!(extracted[1].perspective, Perspective::Manager);
    }

    #[test]
    fn test_only_requested_perspectives_are_extracted() {
        let text = format!(
            "PEER ASSESSMENT QUESTIONS\n{}MANAGER ASSESSMENT QUESTIONS\n{}",
            block("Peer?", "rating", "A"),
            block("Manager?", "rating", "B"),
        );
        let extracted = extract_candidates(&text, [Perspective::Manager]);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].perspective, Perspective::Manager);
    }

    #[test]
    fn test_unsupported_type_is_dropped() {
        let text = format!(
            "MANAGER ASSESSMENT QUESTIONS\n{}{}",
            block("Pick one option?", "multiple_choice", "Choice"),
            block("Kept?", "open_ended", "Kept"),
        );
        let extracted = extract_candidates(&text, [Perspective::Manager]);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].text, "Kept?");
    }

    #[test]
    fn test_blocks_on_one_line_are_tolerated() {
        let text = "MANAGER ASSESSMENT QUESTIONS\n\
            Question: How decisive is this leader? Type: rating Category: Decision Making\n";
        let extracted = extract_candidates(text, [Perspective::Manager]);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].text, "How decisive is this leader?");
        assert_eq!(extracted[0].category, "Decision Making");
    }

    #[test]
    fn test_line_scan_handles_wrapped_text_and_missing_category() {
        let text = "PEER ASSESSMENT QUESTIONS\n\
            Question: How well does this colleague share\n\
            credit with the team?\n\
            Type: rating\n\
            Category: Recognition\n\
            Question: What should this colleague keep doing?\n\
            Type: open-ended\n";
        let extracted = extract_candidates(text, [Perspective::Peer]);
        assert_eq!(extracted.len(), 2);
        assert_eq!(
            extracted[0].text,
            "How well does this colleague share credit with the team?"
        );
        assert_eq!(extracted[0].category, "Recognition");
        assert_eq!(extracted[1].kind, QuestionType::OpenEnded);
        assert_eq!(extracted[1].category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_type_label_with_scale_annotation_is_kept() {
        let text = format!(
            "MANAGER ASSESSMENT QUESTIONS\n{}{}",
            block("How well does this leader prioritise?", "Rating (1-5)", "Planning"),
            block("What should this leader change?", "Open-ended (free text)", "Growth"),
        );
        let extracted = extract_candidates(&text, [Perspective::Manager]);
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].kind, QuestionType::Rating);
        assert_eq!(extracted[0].category, "Planning");
        assert_eq!(extracted[1].kind, QuestionType::OpenEnded);
    }

    #[test]
    fn test_line_scan_accepts_annotated_type_label() {
        let text = "PEER ASSESSMENT QUESTIONS\n\
            Question: How dependable is this colleague\n\
            under deadline pressure?\n\
            Type: Rating (1-5 scale)\n";
        let extracted = extract_candidates(text, [Perspective::Peer]);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].kind, QuestionType::Rating);
        assert_eq!(extracted[0].category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_line_scan_drops_candidates_without_type() {
        let text = "PEER ASSESSMENT QUESTIONS\nQuestion: Orphan question?\nCategory: Lost\n";
        assert!(extract_candidates(text, [Perspective::Peer]).is_empty());
    }

    #[test]
    fn test_missing_section_yields_nothing() {
        let text = format!("MANAGER ASSESSMENT QUESTIONS\n{}", block("Q?", "rating", "C"));
        assert!(extract_candidates(&text, [Perspective::External]).is_empty());
    }

    #[test]
    fn test_strip_markdown() {
        assert_eq!(strip_markdown("  **Bold** text "), "Bold text");
        assert_eq!(strip_markdown("### Heading"), "Heading");
        assert_eq!(strip_markdown("`code`"), "code");
        assert_eq!(strip_markdown("- *listed*"), "listed");
        assert_eq!(strip_markdown("open_ended"), "open_ended");
    }
}
