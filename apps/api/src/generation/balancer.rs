//! Perspective quota balancer.
//!
//! Turns any candidate pool into a question set that matches the quota map
//! exactly: surplus candidates are trimmed with an open-ended-first policy,
//! shortfalls are padded from the fallback library. Pure and total.

use std::collections::HashSet;

use tracing::debug;

use crate::generation::fallback;
use crate::generation::models::{
    Candidate, DocumentType, Perspective, Question, QuestionType, QuotaMap,
};

pub const DEFAULT_OPEN_ENDED_FIRST_CAP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancerConfig {
    /// Open-ended candidates guaranteed a slot before rating candidates fill
    /// the rest.
    pub open_ended_first_cap: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            open_ended_first_cap: DEFAULT_OPEN_ENDED_FIRST_CAP,
        }
    }
}

/// Balances `pool` against `quotas`.
///
/// For every enabled perspective the output holds exactly its quota of
/// questions; disabled and zero-quota perspectives contribute nothing.
/// Perspectives appear in declaration order and `order` runs 1..=N.
pub fn balance(
    pool: &[Candidate],
    quotas: &QuotaMap,
    document_type: &DocumentType,
    config: BalancerConfig,
) -> Vec<Question> {
    let mut used: HashSet<String> = HashSet::new();
    let mut selected: Vec<Candidate> = Vec::new();

    for (perspective, quota) in quotas.enabled() {
        if quota == 0 {
            continue;
        }

        let available = available_for(pool, perspective, &used);
        let mut picked: Vec<Candidate> = if available.len() > quota {
            select(&available, quota, config.open_ended_first_cap)
                .into_iter()
                .map(|i| available[i].clone())
                .collect()
        } else {
            available.into_iter().cloned().collect()
        };
        used.extend(picked.iter().map(|c| c.text.clone()));

        let shortfall = quota - picked.len();
        if shortfall > 0 {
            debug!("Padding {perspective} with {shortfall} fallback questions");
            let padding = if used.is_empty() {
                fallback::generate(document_type, perspective, shortfall)
            } else {
                fallback::generate_excluding(document_type, perspective, shortfall, &used)
            };
            used.extend(padding.iter().map(|c| c.text.clone()));
            picked.extend(padding);
        }

        selected.extend(picked);
    }

    selected
        .into_iter()
        .zip(1u32..)
        .map(|(candidate, order)| candidate.into_question(order))
        .collect()
}

/// Pool candidates for `perspective` in pool order, without texts that are
/// already used or repeated earlier in the pool.
fn available_for<'a>(
    pool: &'a [Candidate],
    perspective: Perspective,
    used: &HashSet<String>,
) -> Vec<&'a Candidate> {
    let mut seen: HashSet<&str> = HashSet::new();
    pool.iter()
        .filter(|c| c.perspective == perspective)
        .filter(|c| !used.contains(&c.text) && seen.insert(c.text.as_str()))
        .collect()
}

/// Picks `quota` indices from `available` (which is longer than `quota`),
/// returned in pool order.
///
/// Passes: open-ended up to the cap, then rating, then any remaining
/// open-ended, then anything left.
fn select(available: &[&Candidate], quota: usize, open_ended_cap: usize) -> Vec<usize> {
    let mut chosen = vec![false; available.len()];
    let mut remaining = quota;

    let mut take = |wanted: &dyn Fn(&Candidate) -> bool, limit: usize| {
        let mut taken = 0;
        for (i, candidate) in available.iter().enumerate() {
            if taken == limit || remaining == 0 {
                break;
            }
            if !chosen[i] && wanted(*candidate) {
                chosen[i] = true;
                taken += 1;
                remaining -= 1;
            }
        }
    };

    take(&|c: &Candidate| c.kind == QuestionType::OpenEnded, open_ended_cap.min(quota));
    take(&|c: &Candidate| c.kind == QuestionType::Rating, usize::MAX);
    take(&|c: &Candidate| c.kind == QuestionType::OpenEnded, usize::MAX);
    take(&|_: &Candidate| true, usize::MAX);

    chosen
        .iter()
        .enumerate()
        .filter_map(|(i, &picked)| picked.then_some(i))
        .collect()
}
