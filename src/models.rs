// Search-side data: candidates, pools, preference tiers and booking criteria

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Review block as returned by hotel search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub rating: f64,
    pub count: u32,
    pub cleanliness: Option<f64>,
    pub service: Option<f64>,
}

impl ReviewSummary {
    pub fn has_category_ratings(&self) -> bool {
        self.cleanliness.is_some() || self.service.is_some()
    }
}

/// One priced offer returned by a search call.
///
/// Flights carry `duration_minutes`; hotels carry `star_rating` and `review`.
/// `reference` is opaque to the engine and handed back to the provider when
/// fetching fare rules or creating an itinerary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub price: f64,
    pub star_rating: Option<u8>,
    pub review: Option<ReviewSummary>,
    pub available: bool,
    pub duration_minutes: Option<u32>,
    pub reference: String,
}

impl Candidate {
    pub fn flight(id: &str, price: f64, duration_minutes: u32) -> Self {
        Self {
            id: id.to_string(),
            price,
            available: true,
            duration_minutes: Some(duration_minutes),
            reference: id.to_string(),
            ..Default::default()
        }
    }

    pub fn hotel(id: &str, price: f64, star_rating: u8, review: ReviewSummary) -> Self {
        Self {
            id: id.to_string(),
            price,
            star_rating: Some(star_rating),
            review: Some(review),
            available: true,
            reference: id.to_string(),
            ..Default::default()
        }
    }

    pub fn review_rating(&self) -> f64 {
        self.review.as_ref().map_or(0.0, |r| r.rating)
    }
}

// Aggregates over the available part of a pool
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolStats {
    pub mean_price: f64,
    pub available_count: usize,
}

/// Ordered result of one search call, tagged with the provider trace id that
/// every follow-up call for this search must carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidatePool {
    pub trace_id: String,
    pub candidates: Vec<Candidate>,
}

impl CandidatePool {
    pub fn new(trace_id: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            trace_id: trace_id.into(),
            candidates,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn available(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.available)
    }

    pub fn stats(&self) -> PoolStats {
        let (sum, count) = self
            .available()
            .fold((0.0, 0usize), |(sum, count), c| (sum + c.price, count + 1));

        PoolStats {
            mean_price: if count == 0 { 0.0 } else { sum / count as f64 },
            available_count: count,
        }
    }
}

/// Budget preference. Picks the starting point in a price-ordered list and
/// the rule set used when scoring hotels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreferenceTier {
    #[serde(alias = "pocket friendly", alias = "Pocket Friendly", alias = "economy")]
    Economy,
    #[default]
    #[serde(
        alias = "somewhere in-between",
        alias = "Somewhere In-between",
        alias = "balanced"
    )]
    Balanced,
    #[serde(alias = "luxury")]
    Luxury,
}

impl PreferenceTier {
    /// Parses the labels the booking front end sends. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "luxury" => Some(Self::Luxury),
            "somewhere in-between" | "balanced" => Some(Self::Balanced),
            "pocket friendly" | "economy" => Some(Self::Economy),
            _ => None,
        }
    }

    pub fn fraction(self) -> f64 {
        match self {
            Self::Economy => 0.25,
            Self::Balanced => 0.5,
            Self::Luxury => 0.75,
        }
    }

    // Star ratings requested from hotel search
    pub fn star_ratings(tier: Option<Self>) -> Vec<u8> {
        match tier {
            Some(Self::Luxury) => vec![4, 5],
            Some(Self::Balanced) => vec![3, 4],
            Some(Self::Economy) => vec![3],
            None => vec![3, 4, 5],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub flight: Option<PreferenceTier>,
    pub budget: Option<PreferenceTier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub code: String,
    pub city: String,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomRequest {
    pub adults: u32,
    pub child_ages: Vec<i32>,
}

impl RoomRequest {
    // Ages the provider accepts; negative entries come from unparsable input
    pub fn valid_child_ages(&self) -> Vec<u8> {
        self.child_ages
            .iter()
            .filter_map(|age| u8::try_from(*age).ok())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TravelerDetails {
    pub rooms: Vec<RoomRequest>,
}

impl TravelerDetails {
    pub fn total_travelers(&self) -> u32 {
        self.rooms
            .iter()
            .map(|r| r.adults + r.child_ages.len() as u32)
            .sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightSearchCriteria {
    pub departure_city: Option<City>,
    pub cities: Vec<City>,
    pub travelers: u32,
    pub start_date: Option<NaiveDate>,
    pub inquiry_token: String,
}

impl FlightSearchCriteria {
    pub fn route_name(&self) -> String {
        match (&self.departure_city, self.cities.first()) {
            (Some(from), Some(to)) => format!("{} to {}", from.city, to.city),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotelSearchCriteria {
    pub city: String,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub inquiry_token: String,
}
