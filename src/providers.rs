// Narrow interfaces to the reservation provider and the payloads they exchange

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Candidate, CandidatePool, City, RoomRequest};
use crate::resolver::{RateLineItem, RecommendationBundle};

/// Failure reported by any provider call.
///
/// `payload` keeps the provider's raw error body; the classifier digs through
/// it for codes and messages since the provider is inconsistent about where
/// it puts them.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub status_code: Option<u16>,
    pub payload: Value,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            payload: Value::Null,
        }
    }

    pub fn with_payload(message: impl Into<String>, payload: Value) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            payload,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthToken(pub String);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightSearchRequest {
    pub departure_city: City,
    pub arrival_city: City,
    pub date: String,
    pub travelers: u32,
    pub inquiry_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotelSearchRequest {
    pub city: String,
    pub check_in: String,
    pub check_out: String,
    pub occupancies: Vec<RoomRequest>,
    pub star_ratings: Vec<u8>,
    pub inquiry_token: String,
}

// Identifies one flight offer inside a search trace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightOfferRequest {
    pub trace_id: String,
    pub result_index: String,
    pub inquiry_token: String,
    pub route_name: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FareRules {
    pub trace_id: String,
    pub result_index: String,
    pub rules: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightItinerary {
    pub itinerary_code: String,
    pub trace_id: String,
    pub details: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotelItineraryRequest {
    pub hotel_id: String,
    pub trace_id: String,
    pub city: String,
    pub start_date: String,
    pub inquiry_token: String,
}

/// Itinerary created against one hotel, carrying its recommendation graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotelItinerary {
    pub itinerary_code: String,
    pub trace_id: String,
    pub items: Value,
    pub recommendations: Vec<RecommendationBundle>,
    pub rates: Vec<RateLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomAllocation {
    pub rate_id: String,
    pub room_id: String,
    pub adults: u32,
    pub child_ages: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSelectionRequest {
    pub itinerary_code: String,
    pub trace_id: String,
    pub recommendation_id: String,
    pub allocations: Vec<RoomAllocation>,
    pub items: Value,
    pub inquiry_token: String,
    pub city: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSelectionResponse {
    pub recommendation_id: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDetails {
    pub itinerary_code: String,
    pub record: Value,
}

#[async_trait]
pub trait AuthService: Send + Sync + 'static {
    async fn login(&self, inquiry_token: &str) -> Result<AuthToken, ProviderError>;
}

#[async_trait]
pub trait FlightSearchService: Send + Sync + 'static {
    async fn search(
        &self,
        request: &FlightSearchRequest,
        token: &AuthToken,
    ) -> Result<CandidatePool, ProviderError>;
}

#[async_trait]
pub trait FareRulesService: Send + Sync + 'static {
    async fn fare_rules(
        &self,
        offer: &FlightOfferRequest,
        token: &AuthToken,
    ) -> Result<FareRules, ProviderError>;
}

#[async_trait]
pub trait FlightItineraryService: Send + Sync + 'static {
    async fn create(
        &self,
        offer: &FlightOfferRequest,
        token: &AuthToken,
    ) -> Result<FlightItinerary, ProviderError>;
}

#[async_trait]
pub trait HotelSearchService: Send + Sync + 'static {
    async fn search(
        &self,
        request: &HotelSearchRequest,
        token: &AuthToken,
    ) -> Result<CandidatePool, ProviderError>;
}

#[async_trait]
pub trait HotelItineraryService: Send + Sync + 'static {
    async fn create(
        &self,
        request: &HotelItineraryRequest,
        token: &AuthToken,
    ) -> Result<HotelItinerary, ProviderError>;

    // Final booking record, fetched once after rate selection commits
    async fn details(
        &self,
        itinerary_code: &str,
        trace_id: &str,
        token: &AuthToken,
    ) -> Result<ItineraryDetails, ProviderError>;
}

#[async_trait]
pub trait RoomRatesService: Send + Sync + 'static {
    async fn select_rates(
        &self,
        request: &RateSelectionRequest,
        token: &AuthToken,
    ) -> Result<RateSelectionResponse, ProviderError>;
}

impl FlightOfferRequest {
    pub fn for_candidate(
        candidate: &Candidate,
        trace_id: &str,
        inquiry_token: &str,
        route_name: &str,
        date: &str,
    ) -> Self {
        Self {
            trace_id: trace_id.to_string(),
            result_index: candidate.reference.clone(),
            inquiry_token: inquiry_token.to_string(),
            route_name: route_name.to_string(),
            date: date.to_string(),
        }
    }
}
