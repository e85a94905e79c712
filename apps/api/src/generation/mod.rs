// Assessment template generation.
// Prompting → classification → extraction → two-step regeneration → fallback → balancing.
// All generation-service calls go through llm_client; the balancer and fallback library are pure.

pub mod balancer;
pub mod classifier;
pub mod extractor;
pub mod fallback;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod store;
pub mod themes;
