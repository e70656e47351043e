// Price-ordered candidate lists for flights and the tier-based starting index

use crate::config::FlightPolicy;
use crate::models::{Candidate, CandidatePool, PreferenceTier};

/// Drops unavailable and over-long offers, then sorts ascending by price.
/// Equal prices keep their search order.
pub fn price_ordered(pool: &CandidatePool, policy: &FlightPolicy) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = pool
        .available()
        .filter(|c| {
            c.duration_minutes
                .map_or(true, |minutes| minutes <= policy.max_duration_minutes)
        })
        .cloned()
        .collect();

    candidates.sort_by(|a, b| a.price.total_cmp(&b.price));
    candidates
}

/// Keeps the central part of a price-sorted list, dropping `fraction` of the
/// positions at each end.
///
/// Lists too short to survive trimming (one offer) are returned whole.
pub fn trim_outliers(sorted: Vec<Candidate>, fraction: f64) -> Vec<Candidate> {
    let len = sorted.len() as f64;
    let start = (len * fraction).floor() as usize;
    let end = (len * (1.0 - fraction)).floor() as usize;

    if start >= end {
        return sorted;
    }

    sorted.into_iter().skip(start).take(end - start).collect()
}

/// First candidate to attempt: `floor(len × tier fraction)`, clamped to the list.
pub fn starting_index(len: usize, tier: PreferenceTier) -> usize {
    if len == 0 {
        return 0;
    }
    let index = (len as f64 * tier.fraction()).floor() as usize;
    index.min(len - 1)
}
