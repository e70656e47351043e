// Hotel desirability scoring: review base score plus tier bonuses against the pool mean price

use crate::models::{Candidate, CandidatePool, PoolStats, PreferenceTier};

// Review volume contributes at most this much
const MAX_REVIEW_COUNT_BONUS: f64 = 25.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
    /// Position in the original search response.
    pub pool_index: usize,
}

/// Scores one candidate. Pure: same inputs always produce the same score.
pub fn score(candidate: &Candidate, stats: &PoolStats, tier: PreferenceTier) -> f64 {
    let review = candidate.review.clone().unwrap_or_default();
    let stars = candidate.star_rating.unwrap_or(0);
    let price = candidate.price;
    let mean = stats.mean_price;

    let mut score = review.rating * 10.0;
    score += (review.count as f64 / 20.0).min(MAX_REVIEW_COUNT_BONUS);

    match tier {
        PreferenceTier::Luxury => {
            score += match stars {
                5 => 30.0,
                4 => 15.0,
                _ => 0.0,
            };
            if price >= mean * 0.8 && price <= mean * 1.5 {
                score += 20.0;
            }
        }
        PreferenceTier::Balanced => {
            score += match stars {
                4 => 30.0,
                3 => 20.0,
                _ => 0.0,
            };
            if price < mean {
                score += 25.0;
            }
        }
        PreferenceTier::Economy => {
            if stars == 3 && review.rating >= 4.0 {
                score += 30.0;
            }
            if price < mean * 0.8 {
                score += 35.0;
            }
        }
    }

    if review.has_category_ratings() {
        let cleanliness = review.cleanliness.unwrap_or(0.0);
        let service = review.service.unwrap_or(0.0);
        score += (cleanliness + service) * 2.0;
    }

    score
}

/// Ranks the available hotels of a pool, best first.
///
/// Ties keep their search-response order.
pub fn rank_by_score(pool: &CandidatePool, tier: PreferenceTier) -> Vec<ScoredCandidate> {
    let stats = pool.stats();

    let mut scored: Vec<ScoredCandidate> = pool
        .candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.available)
        .map(|(pool_index, c)| ScoredCandidate {
            score: score(c, &stats, tier),
            candidate: c.clone(),
            pool_index,
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}
