//! Generation orchestrator.
//!
//! The pipeline is an explicit state machine. Every transition that does not
//! talk to the generation service is the pure function [`advance`]; the two
//! effectful stages (`Prompting`, `TwoStep`) are resolved by
//! [`TemplateGenerator::generate`], which awaits the service with a bounded
//! timeout and feeds the outcome back in as the next stage.
//!
//! Each path visits every stage at most once, apart from the single
//! simplified-prompt retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::generation::balancer::{balance, BalancerConfig};
use crate::generation::classifier::{classify_expecting, ResponseClass, MIN_SECTION_HEADERS};
use crate::generation::extractor::extract_candidates;
use crate::generation::models::{
    Candidate, DocumentRef, DocumentType, GenerationMethod, GenerationResult, QuotaMap,
    TemplateMetadata,
};
use crate::generation::prompts::{build_generation_prompt, build_simplified_prompt};
use crate::generation::themes;
use crate::llm_client::{complete_text, GenerationRequest, TextGenerator};

/// Pool size below which the pipeline escalates to the next strategy.
pub const DEFAULT_MIN_CANDIDATES: usize = 5;
/// Questions requested per perspective in the second two-step call.
pub const DEFAULT_THEMED_QUESTIONS_PER_PERSPECTIVE: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub request_timeout: Duration,
    pub min_candidates: usize,
    pub themed_questions_per_perspective: usize,
    pub balancer: BalancerConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            min_candidates: DEFAULT_MIN_CANDIDATES,
            themed_questions_per_perspective: DEFAULT_THEMED_QUESTIONS_PER_PERSPECTIVE,
            balancer: BalancerConfig::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State machine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Ask the service for questions. `simplified` marks the rigid retry.
    Prompting { simplified: bool },
    /// Decide the branch for a response. `None` means the call failed.
    Classifying {
        response: Option<String>,
        simplified: bool,
    },
    Extracting { text: String },
    /// Run theme extraction and themed regeneration on top of `pool`.
    TwoStep { pool: Vec<Candidate> },
    /// Let the fallback library supply everything `pool` lacks.
    FallbackAll { pool: Vec<Candidate> },
    Balancing {
        pool: Vec<Candidate>,
        method: GenerationMethod,
    },
    Done(GenerationResult),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Prompting { .. } => "prompting",
            Stage::Classifying { .. } => "classifying",
            Stage::Extracting { .. } => "extracting",
            Stage::TwoStep { .. } => "two_step",
            Stage::FallbackAll { .. } => "fallback_all",
            Stage::Balancing { .. } => "balancing",
            Stage::Done(_) => "done",
        }
    }

    /// Whether resolving this stage needs a call to the generation service.
    pub fn is_effectful(&self) -> bool {
        matches!(self, Stage::Prompting { .. } | Stage::TwoStep { .. })
    }
}

/// Inputs shared by every transition of one generation run.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub document_type: &'a DocumentType,
    pub quotas: &'a QuotaMap,
    pub settings: &'a PipelineSettings,
}

impl RunContext<'_> {
    /// Headers a well-formed response must carry: the default, lowered when
    /// fewer perspectives are enabled.
    pub fn min_section_headers(&self) -> usize {
        MIN_SECTION_HEADERS.min(self.quotas.enabled().count()).max(1)
    }
}

/// Applies one pure transition. Effectful and terminal stages are returned
/// unchanged.
pub fn advance(stage: Stage, ctx: &RunContext<'_>) -> Stage {
    match stage {
        Stage::Classifying {
            response,
            simplified,
        } => {
            let class = classify_expecting(response.as_deref(), ctx.min_section_headers());
            info!("Response classified as {class:?} (simplified: {simplified})");
            match (class, response) {
                (ResponseClass::WellFormed, Some(text)) => Stage::Extracting { text },
                (ResponseClass::Unstructured, _) if !simplified => {
                    Stage::Prompting { simplified: true }
                }
                _ => Stage::FallbackAll { pool: Vec::new() },
            }
        }
        Stage::Extracting { text } => {
            let pool = extract_candidates(&text, ctx.quotas.enabled().map(|(p, _)| p));
            info!("Extracted {} candidates", pool.len());
            if pool.len() >= ctx.settings.min_candidates {
                Stage::Balancing {
                    pool,
                    method: GenerationMethod::Ai,
                }
            } else {
                Stage::TwoStep { pool }
            }
        }
        Stage::FallbackAll { pool } => Stage::Balancing {
            pool,
            method: GenerationMethod::Fallback,
        },
        Stage::Balancing { pool, method } => {
            let questions = balance(&pool, ctx.quotas, ctx.document_type, ctx.settings.balancer);
            Stage::Done(GenerationResult {
                questions,
                generation_method: method,
            })
        }
        effectful_or_done => effectful_or_done,
    }
}

/// Merges two-step output into the existing pool and picks the next stage.
pub fn after_two_step(
    mut pool: Vec<Candidate>,
    regenerated: Vec<Candidate>,
    ctx: &RunContext<'_>,
) -> Stage {
    pool.extend(regenerated);
    if pool.len() >= ctx.settings.min_candidates {
        Stage::Balancing {
            pool,
            method: GenerationMethod::TwoStep,
        }
    } else {
        Stage::FallbackAll { pool }
    }
}

/// Deterministic path: every question from the fallback library.
pub fn fallback_generate(
    document_type: &DocumentType,
    quotas: &QuotaMap,
    config: BalancerConfig,
) -> GenerationResult {
    GenerationResult {
        questions: balance(&[], quotas, document_type, config),
        generation_method: GenerationMethod::Fallback,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Driver
// ────────────────────────────────────────────────────────────────────────────

/// Runs the pipeline against an injected generation service.
#[derive(Clone)]
pub struct TemplateGenerator {
    service: Arc<dyn TextGenerator>,
    settings: PipelineSettings,
}

impl TemplateGenerator {
    pub fn new(service: Arc<dyn TextGenerator>, settings: PipelineSettings) -> Self {
        Self { service, settings }
    }

    /// Generates a template. Never fails: service problems degrade to the
    /// two-step and fallback paths.
    pub async fn generate(
        &self,
        documents: &[DocumentRef],
        document_type: &DocumentType,
        metadata: &TemplateMetadata,
        quotas: &QuotaMap,
    ) -> GenerationResult {
        let ctx = RunContext {
            document_type,
            quotas,
            settings: &self.settings,
        };

        if quotas.total_required() == 0 {
            info!("No questions requested, skipping generation service");
            return self.fallback_generate(document_type, quotas);
        }

        let mut stage = Stage::Prompting { simplified: false };
        loop {
            info!("Generation stage: {}", stage.name());
            stage = match stage {
                Stage::Prompting { simplified } => {
                    let prompt = if simplified {
                        build_simplified_prompt(document_type, quotas)
                    } else {
                        build_generation_prompt(document_type, metadata, quotas)
                    };
                    let request = GenerationRequest::new(prompt).with_documents(documents);
                    let response =
                        complete_text(self.service.as_ref(), &request, self.settings.request_timeout)
                            .await;
                    Stage::Classifying {
                        response,
                        simplified,
                    }
                }
                Stage::TwoStep { pool } => {
                    let outcome = themes::regenerate(
                        self.service.as_ref(),
                        documents,
                        document_type,
                        quotas,
                        self.settings.themed_questions_per_perspective,
                        self.settings.request_timeout,
                    )
                    .await;
                    let titles: Vec<&str> = outcome.themes.iter().map(|t| t.title.as_str()).collect();
                    info!("Two-step themes: {}", titles.join(", "));
                    after_two_step(pool, outcome.candidates, &ctx)
                }
                Stage::Done(result) => {
                    info!(
                        "Generated {} questions via {}",
                        result.questions.len(),
                        result.generation_method.label()
                    );
                    return result;
                }
                pure => {
                    debug_assert!(!pure.is_effectful());
                    if matches!(pure, Stage::FallbackAll { .. }) {
                        warn!("Falling back to the deterministic question library");
                    }
                    advance(pure, &ctx)
                }
            };
        }
    }

    pub fn fallback_generate(
        &self,
        document_type: &DocumentType,
        quotas: &QuotaMap,
    ) -> GenerationResult {
        fallback_generate(document_type, quotas, self.settings.balancer)
    }
}
