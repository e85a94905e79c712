// Shared prompt fragments used by every request sent to the generation service.
// Pipeline-specific prompts live in generation/prompts.rs.

/// Preamble sent with every generation request.
pub const STRUCTURED_OUTPUT_PREAMBLE: &str = "You are an expert in organisational psychology \
    and 360-degree feedback design. You follow output formats exactly. \
    You never add introductions, summaries, commentary or closing remarks.";

/// Instruction appended to every prompt that expects question markup.
pub const NO_PROSE_INSTRUCTION: &str = "\
    CRITICAL: Respond ONLY with the sections and question blocks described above. \
    Do NOT summarise the document. Do NOT write prose, explanations or introductions. \
    Do NOT use tables. Every question MUST use the exact Question:/Type:/Category: lines.";

/// Instruction reminding the service to ground its output in the attached documents.
pub const DOCUMENT_GROUNDING_INSTRUCTION: &str = "\
    Base every question on the attached document. Use its terminology, competencies \
    and behaviours rather than generic management vocabulary.";
