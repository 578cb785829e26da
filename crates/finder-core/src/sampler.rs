//! Fair Sampler: per-address quota sampling over the unevaluated pool.
//!
//! Addresses with many submissions must not crowd out small ones, so each
//! address draws at most `per_address_quota` items uniformly without
//! replacement. The concatenated result is shuffled so evaluators never see
//! submissions in address-grouped order.

use crate::model::Submission;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};

pub fn sample(
    pool: &[Submission],
    per_address_quota: usize,
    already_evaluated: &HashSet<i64>,
    seed: Option<u64>,
) -> Vec<Submission> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    // BTreeMap keeps group iteration order stable so a fixed seed is
    // reproducible regardless of pool order.
    let mut by_address: BTreeMap<&str, Vec<&Submission>> = BTreeMap::new();
    for s in pool {
        if already_evaluated.contains(&s.id) {
            continue;
        }
        by_address
            .entry(s.inserted_by_address.as_str())
            .or_default()
            .push(s);
    }

    let mut sampled: Vec<Submission> = Vec::new();
    for (_, mut group) in by_address {
        group.sort_by_key(|s| s.id);
        let take = per_address_quota.min(group.len());
        sampled.extend(
            group
                .choose_multiple(&mut rng, take)
                .map(|s| (*s).clone()),
        );
    }

    sampled.shuffle(&mut rng);
    sampled
}
