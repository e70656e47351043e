// Recommendation graph resolution: bundles of rate references into priced combinations

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No valid rate combinations: {0}")]
    NoValidCombinations(String),
}

/// One way to cover every requested room, as a list of rate ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationBundle {
    pub id: String,
    pub rate_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Occupancy {
    pub room_id: String,
    pub adults: u32,
    pub children: u32,
}

/// Priced, occupancy-specific inventory unit. Bundles reference these by id
/// and the same rate may appear in several bundles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLineItem {
    pub id: String,
    pub price: f64,
    pub occupancies: Vec<Occupancy>,
}

impl RateLineItem {
    pub fn room_id(&self) -> Option<&str> {
        self.occupancies.first().map(|o| o.room_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateCombination {
    pub recommendation_id: String,
    pub items: Vec<RateLineItem>,
    pub total_price: f64,
}

pub fn index_rates(rates: &[RateLineItem]) -> HashMap<String, RateLineItem> {
    rates.iter().map(|r| (r.id.clone(), r.clone())).collect()
}

/// Resolves every bundle whose rate ids all exist, cheapest first.
///
/// A bundle with any unknown rate id is dropped entirely. Equal totals keep
/// the bundle order the provider sent.
pub fn resolve(
    bundles: &[RecommendationBundle],
    rates: &HashMap<String, RateLineItem>,
) -> Result<Vec<RateCombination>, ResolveError> {
    let mut combinations: Vec<RateCombination> = bundles
        .iter()
        .filter_map(|bundle| resolve_bundle(bundle, rates))
        .collect();

    if combinations.is_empty() {
        return Err(ResolveError::NoValidCombinations(format!(
            "{} recommendation(s), {} rate(s), none fully priced",
            bundles.len(),
            rates.len()
        )));
    }

    combinations.sort_by(|a, b| a.total_price.total_cmp(&b.total_price));
    Ok(combinations)
}

fn resolve_bundle(
    bundle: &RecommendationBundle,
    rates: &HashMap<String, RateLineItem>,
) -> Option<RateCombination> {
    if bundle.rate_ids.is_empty() {
        return None;
    }

    let items = bundle
        .rate_ids
        .iter()
        .map(|id| rates.get(id).cloned())
        .collect::<Option<Vec<_>>>()?;

    Some(RateCombination {
        recommendation_id: bundle.id.clone(),
        total_price: items.iter().map(|r| r.price).sum(),
        items,
    })
}
