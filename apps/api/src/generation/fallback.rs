//! Deterministic fallback question library.
//!
//! A static table keyed by (document type, perspective), plus a generic
//! per-perspective table for unrecognised document types. `generate` is pure
//! and total: it always returns exactly `count` questions, none byte-identical.

use std::collections::HashSet;

use crate::generation::models::{Candidate, DocumentType, Perspective, QuestionType};

/// A hand-authored fallback question.
#[derive(Debug, Clone, Copy)]
pub struct FallbackEntry {
    pub text: &'static str,
    pub kind: QuestionType,
    pub category: &'static str,
}

const fn rating(text: &'static str, category: &'static str) -> FallbackEntry {
    FallbackEntry {
        text,
        kind: QuestionType::Rating,
        category,
    }
}

const fn open(text: &'static str, category: &'static str) -> FallbackEntry {
    FallbackEntry {
        text,
        kind: QuestionType::OpenEnded,
        category,
    }
}

/// Qualifiers that keep reused items distinct from one pass to the next.
const CYCLE_QUALIFIERS: &[&str] = &[
    "over the last six months",
    "in high-pressure situations",
    "when working across teams",
    "in one-on-one settings",
];

// ────────────────────────────────────────────────────────────────────────────
// Tables
// ────────────────────────────────────────────────────────────────────────────

const LEADERSHIP_SELF: &[FallbackEntry] = &[
    rating("How effectively do you communicate the team's vision and direction?", "Vision"),
    rating("How consistently do you model the behaviours described in the leadership model?", "Role Modelling"),
    rating("How well do you empower others to make decisions?", "Empowerment"),
    open("What leadership behaviour would you most like to strengthen over the next year?", "Development"),
    open("Describe a recent situation where you led through uncertainty.", "Resilience"),
];

const LEADERSHIP_MANAGER: &[FallbackEntry] = &[
    rating("How effectively does this leader translate strategy into clear priorities?", "Strategy"),
    rating("How well does this leader build trust with their team?", "Trust"),
    rating("How consistently does this leader hold others accountable for commitments?", "Accountability"),
    open("What is the most significant leadership strength this person demonstrates?", "Strengths"),
    open("What should this leader focus on to grow their impact?", "Development"),
];

const LEADERSHIP_PEER: &[FallbackEntry] = &[
    rating("How effectively does this leader collaborate with peers across the organisation?", "Collaboration"),
    rating("How well does this leader share information that helps other teams succeed?", "Communication"),
    rating("How constructively does this leader handle disagreement?", "Conflict Resolution"),
    open("What could this leader do to be a more effective partner to you?", "Partnership"),
];

const LEADERSHIP_DIRECT_REPORT: &[FallbackEntry] = &[
    rating("How well does your manager communicate a compelling vision for the team?", "Vision"),
    rating("How effectively does your manager support your professional development?", "Coaching"),
    rating("How approachable is your manager when you need guidance?", "Approachability"),
    rating("How fairly does your manager recognise contributions across the team?", "Recognition"),
    open("What does your manager do that most helps you do your best work?", "Strengths"),
    open("What would you like your manager to start or stop doing?", "Development"),
];

const LEADERSHIP_EXTERNAL: &[FallbackEntry] = &[
    rating("How well does this leader represent the organisation's values in your interactions?", "Integrity"),
    rating("How effectively does this leader follow through on commitments made to you?", "Reliability"),
    open("What would make this leader a more effective partner for your organisation?", "Partnership"),
];

const JOB_SELF: &[FallbackEntry] = &[
    rating("How well do you meet the core responsibilities of your role?", "Role Performance"),
    rating("How effectively do you apply the technical skills your role requires?", "Technical Skills"),
    rating("How well do you prioritise competing demands in your role?", "Prioritisation"),
    open("Which responsibility of your role do you find most challenging, and why?", "Development"),
];

const JOB_MANAGER: &[FallbackEntry] = &[
    rating("How consistently does this employee meet the expectations set out in their job description?", "Role Performance"),
    rating("How effectively does this employee deliver work on time and to the expected quality?", "Delivery"),
    rating("How well does this employee adapt to changes in priorities?", "Adaptability"),
    open("What is this employee's most valuable contribution to the team?", "Strengths"),
    open("What skills should this employee develop to progress in their role?", "Development"),
];

const JOB_PEER: &[FallbackEntry] = &[
    rating("How reliable is this colleague in delivering on shared work?", "Reliability"),
    rating("How effectively does this colleague communicate progress and blockers?", "Communication"),
    rating("How willing is this colleague to help others on the team?", "Teamwork"),
    open("What is one thing this colleague could do to make collaboration easier?", "Collaboration"),
];

const JOB_DIRECT_REPORT: &[FallbackEntry] = &[
    rating("How clearly does this person set expectations for your work?", "Clarity"),
    rating("How effectively does this person remove obstacles that slow you down?", "Support"),
    rating("How timely and useful is the feedback this person gives you?", "Feedback"),
    open("What could this person do to help you perform better in your role?", "Development"),
];

const JOB_EXTERNAL: &[FallbackEntry] = &[
    rating("How responsive is this person to your requests?", "Responsiveness"),
    rating("How well does this person understand your needs?", "Customer Focus"),
    open("What would improve your experience of working with this person?", "Service"),
];

const COMPETENCY_SELF: &[FallbackEntry] = &[
    rating("How proficient are you in the core competencies defined for your role?", "Proficiency"),
    rating("How consistently do you demonstrate these competencies under pressure?", "Consistency"),
    rating("How actively do you seek opportunities to develop new competencies?", "Growth"),
    open("Which competency do you consider your greatest strength, and why?", "Strengths"),
    open("Which competency would you most like to develop next?", "Development"),
];

const COMPETENCY_MANAGER: &[FallbackEntry] = &[
    rating("How well does this person demonstrate the competencies expected at their level?", "Proficiency"),
    rating("How effectively does this person apply problem-solving competencies to new challenges?", "Problem Solving"),
    rating("How well does this person demonstrate interpersonal competencies with the team?", "Interpersonal Skills"),
    open("Which competency has this person developed most over the past year?", "Growth"),
    open("What competency gap most limits this person's effectiveness?", "Development"),
];

const COMPETENCY_PEER: &[FallbackEntry] = &[
    rating("How effectively does this colleague demonstrate collaboration competencies?", "Collaboration"),
    rating("How well does this colleague share expertise with others?", "Knowledge Sharing"),
    rating("How consistently does this colleague show initiative?", "Initiative"),
    open("What competency do you most value in this colleague?", "Strengths"),
];

const COMPETENCY_DIRECT_REPORT: &[FallbackEntry] = &[
    rating("How effectively does this person coach you on developing your competencies?", "Coaching"),
    rating("How well does this person demonstrate the competencies they expect from the team?", "Role Modelling"),
    rating("How fairly does this person assess your competencies?", "Fairness"),
    open("What support would help you build your competencies faster?", "Development"),
];

const COMPETENCY_EXTERNAL: &[FallbackEntry] = &[
    rating("How well does this person demonstrate professional expertise in your interactions?", "Expertise"),
    rating("How effectively does this person solve problems you bring to them?", "Problem Solving"),
    open("Which of this person's skills adds the most value to your work together?", "Strengths"),
];

const GENERIC_SELF: &[FallbackEntry] = &[
    rating("How effectively do you communicate with your colleagues?", "Communication"),
    rating("How well do you manage your time and priorities?", "Productivity"),
    rating("How consistently do you deliver high-quality work?", "Quality"),
    open("What are your most significant strengths?", "Strengths"),
    open("What areas would you most like to improve?", "Development"),
];

const GENERIC_MANAGER: &[FallbackEntry] = &[
    rating("How effectively does this person achieve their goals?", "Performance"),
    rating("How well does this person communicate with stakeholders?", "Communication"),
    rating("How effectively does this person solve problems?", "Problem Solving"),
    open("What are this person's key strengths?", "Strengths"),
    open("What should this person focus on developing?", "Development"),
];

const GENERIC_PEER: &[FallbackEntry] = &[
    rating("How effectively does this person collaborate with the team?", "Teamwork"),
    rating("How reliable is this person in meeting commitments?", "Reliability"),
    rating("How well does this person listen to other viewpoints?", "Communication"),
    open("What does this person do particularly well?", "Strengths"),
    open("What could this person do differently to be more effective?", "Development"),
];

const GENERIC_DIRECT_REPORT: &[FallbackEntry] = &[
    rating("How effectively does this person provide direction to the team?", "Leadership"),
    rating("How well does this person support your development?", "Coaching"),
    rating("How approachable is this person?", "Approachability"),
    open("What does this person do that helps you most?", "Strengths"),
    open("What could this person do to better support you?", "Development"),
];

const GENERIC_EXTERNAL: &[FallbackEntry] = &[
    rating("How professional is this person in your interactions?", "Professionalism"),
    rating("How responsive is this person to your needs?", "Responsiveness"),
    rating("How well does this person understand your requirements?", "Customer Focus"),
    open("What does this person do well when working with you?", "Strengths"),
    open("How could this person improve the way they work with you?", "Development"),
];

/// Returns the candidate table for a (document type, perspective) key.
pub fn table(document_type: &DocumentType, perspective: Perspective) -> &'static [FallbackEntry] {
    use Perspective::*;
    match (document_type, perspective) {
        (DocumentType::LeadershipModel, SelfAssessment) => LEADERSHIP_SELF,
        (DocumentType::LeadershipModel, Manager) => LEADERSHIP_MANAGER,
        (DocumentType::LeadershipModel, Peer) => LEADERSHIP_PEER,
        (DocumentType::LeadershipModel, DirectReport) => LEADERSHIP_DIRECT_REPORT,
        (DocumentType::LeadershipModel, External) => LEADERSHIP_EXTERNAL,
        (DocumentType::JobDescription, SelfAssessment) => JOB_SELF,
        (DocumentType::JobDescription, Manager) => JOB_MANAGER,
        (DocumentType::JobDescription, Peer) => JOB_PEER,
        (DocumentType::JobDescription, DirectReport) => JOB_DIRECT_REPORT,
        (DocumentType::JobDescription, External) => JOB_EXTERNAL,
        (DocumentType::CompetencyFramework, SelfAssessment) => COMPETENCY_SELF,
        (DocumentType::CompetencyFramework, Manager) => COMPETENCY_MANAGER,
        (DocumentType::CompetencyFramework, Peer) => COMPETENCY_PEER,
        (DocumentType::CompetencyFramework, DirectReport) => COMPETENCY_DIRECT_REPORT,
        (DocumentType::CompetencyFramework, External) => COMPETENCY_EXTERNAL,
        (DocumentType::Other(_), perspective) => generic_table(perspective),
    }
}

pub fn generic_table(perspective: Perspective) -> &'static [FallbackEntry] {
    match perspective {
        Perspective::SelfAssessment => GENERIC_SELF,
        Perspective::Manager => GENERIC_MANAGER,
        Perspective::Peer => GENERIC_PEER,
        Perspective::DirectReport => GENERIC_DIRECT_REPORT,
        Perspective::External => GENERIC_EXTERNAL,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generation
// ────────────────────────────────────────────────────────────────────────────

/// Returns exactly `count` fallback questions for the key.
pub fn generate(document_type: &DocumentType, perspective: Perspective, count: usize) -> Vec<Candidate> {
    generate_excluding(document_type, perspective, count, &HashSet::new())
}

/// Like [`generate`], but skips any text already in `used`. Used by the quota
/// balancer to pad a perspective without repeating texts already selected.
pub fn generate_excluding(
    document_type: &DocumentType,
    perspective: Perspective,
    count: usize,
    used: &HashSet<String>,
) -> Vec<Candidate> {
    let entries = table(document_type, perspective);
    let mut produced: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(count);

    // Every cycle >= 2 carries a distinct qualifier, so each pass through the
    // table yields at least one unseen text and the loop always terminates.
    let mut cycle = 0usize;
    while out.len() < count {
        for entry in entries {
            if out.len() == count {
                break;
            }
            let text = cycle_variant(entry.text, cycle);
            if used.contains(&text) || produced.contains(&text) {
                continue;
            }
            produced.insert(text.clone());
            out.push(Candidate::new(text, entry.kind, entry.category, perspective));
        }
        cycle += 1;
    }

    out
}

/// Rewrites a table question for the given pass through the table.
/// Pass 1 uses the prefix rewrite alone when it applies; every other pass
/// carries its own qualifier, so no two passes produce the same text.
fn cycle_variant(text: &str, cycle: usize) -> String {
    if cycle == 0 {
        return text.to_string();
    }

    let rewritten = rewrite_prefix(text);
    if cycle == 1 {
        if rewritten != text {
            return rewritten;
        }
        return format!("{text} ({})", CYCLE_QUALIFIERS[0]);
    }

    let slot = cycle - 1;
    match CYCLE_QUALIFIERS.get(slot) {
        Some(qualifier) => format!("{rewritten} ({qualifier})"),
        None => format!("{rewritten} (follow-up {slot})"),
    }
}

/// Mechanical rewrite applied to reused table items.
fn rewrite_prefix(text: &str) -> String {
    if let Some(rest) = text.strip_prefix("How ") {
        format!("To what extent {rest}")
    } else if let Some(rest) = text.strip_prefix("What ") {
        format!("Which {rest}")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_document_types() -> Vec<DocumentType> {
        vec![
            DocumentType::LeadershipModel,
            DocumentType::JobDescription,
            DocumentType::CompetencyFramework,
            DocumentType::Other("values_charter".to_string()),
        ]
    }

    #[test]
    fn test_every_table_has_three_to_six_entries() {
        for document_type in all_document_types() {
            for perspective in Perspective::ALL {
                let len = table(&document_type, perspective).len();
                assert!(
                    (3..=6).contains(&len),
                    "{document_type:?}/{perspective} has {len} entries"
                );
            }
        }
    }

    #[test]
    fn test_every_table_offers_an_open_ended_question() {
        for document_type in all_document_types() {
            for perspective in Perspective::ALL {
                assert!(table(&document_type, perspective)
                    .iter()
                    .any(|e| e.kind == QuestionType::OpenEnded));
            }
        }
    }

    #[test]
    fn test_generate_returns_exact_count_in_table_order() {
        let questions = generate(&DocumentType::JobDescription, Perspective::Manager, 3);
        assert_eq!(questions.len(), 3);
        for (question, entry) in questions.iter().zip(JOB_MANAGER) {
            assert_eq!(question.text, entry.text);
            assert_eq!(question.kind, entry.kind);
            assert_eq!(question.category, entry.category);
            assert_eq!(question.perspective, Perspective::Manager);
        }
    }

    #[test]
    fn test_generate_zero_is_empty() {
        assert!(generate(&DocumentType::LeadershipModel, Perspective::Peer, 0).is_empty());
    }

    #[test]
    fn test_unknown_document_type_uses_generic_table() {
        let questions = generate(&DocumentType::from("onboarding_guide"), Perspective::Peer, 2);
        assert_eq!(questions[0].text, GENERIC_PEER[0].text);
        assert_eq!(questions[1].text, GENERIC_PEER[1].text);
    }

    #[test]
    fn test_cycling_rewrites_prefixes() {
        let len = GENERIC_MANAGER.len();
        let questions = generate(&DocumentType::Other(String::new()), Perspective::Manager, len + 1);
        assert_eq!(
            questions[len].text,
            "To what extent effectively does this person achieve their goals?"
        );

        let what = GENERIC_MANAGER
            .iter()
            .position(|e| e.text.starts_with("What "))
            .unwrap();
        let questions =
            generate(&DocumentType::Other(String::new()), Perspective::Manager, len + what + 1);
        assert!(questions[len + what].text.starts_with("Which "));
    }

    #[test]
    fn test_padding_never_duplicates_verbatim() {
        for document_type in all_document_types() {
            for perspective in Perspective::ALL {
                let questions = generate(&document_type, perspective, 40);
                assert_eq!(questions.len(), 40);
                let unique: HashSet<_> = questions.iter().map(|q| q.text.as_str()).collect();
                assert_eq!(
                    unique.len(),
                    40,
                    "duplicate text for {document_type:?}/{perspective}"
                );
            }
        }
    }

    #[test]
    fn test_generate_excluding_skips_used_texts() {
        let used: HashSet<String> = [LEADERSHIP_PEER[0].text.to_string()].into_iter().collect();
        let questions =
            generate_excluding(&DocumentType::LeadershipModel, Perspective::Peer, 2, &used);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].text, LEADERSHIP_PEER[1].text);
        assert!(questions.iter().all(|q| !used.contains(&q.text)));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = generate(&DocumentType::CompetencyFramework, Perspective::DirectReport, 12);
        let b = generate(&DocumentType::CompetencyFramework, Perspective::DirectReport, 12);
        assert_eq!(a, b);
    }
}
