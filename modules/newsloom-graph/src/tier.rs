//! Classification of similarity edges into relationship tiers.
//!
//! An edge either lands in one of three tiers or carries no storyline
//! relationship at all:
//! - near-duplicate: very high cosine within a tight date window
//! - continuation: strong cosine within a week
//! - related: moderate cosine backed by shared entities
//!
//! Classification is a pure function of a single edge. The weaver applies
//! it to the whole edge set before any grouping happens, so it can run
//! over edges in any order (or in parallel) without affecting the result.

use newsloom_common::{Tier, TierConfig};

/// Classify one similarity edge.
///
/// `day_delta` is the absolute number of days between the two articles'
/// publication dates; `shared_entities` is the number of entity ids both
/// articles mention. Returns `None` when the edge is too weak to imply a
/// storyline relationship.
pub fn classify(
    cosine: f64,
    day_delta: i64,
    shared_entities: usize,
    cfg: &TierConfig,
) -> Option<Tier> {
    if cosine >= cfg.tier1_min_sim && day_delta <= cfg.tier1_max_days {
        Some(Tier::NearDuplicate)
    } else if cosine >= cfg.tier2_min_sim
        && cosine < cfg.tier2_max_sim
        && day_delta <= cfg.tier2_max_days
    {
        Some(Tier::Continuation)
    } else if cosine >= cfg.tier3_min_sim
        && cosine < cfg.tier3_max_sim
        && shared_entities >= cfg.tier3_min_shared_entities
    {
        Some(Tier::Related)
    } else {
        None
    }
}
