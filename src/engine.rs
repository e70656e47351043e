// Booking engine: the two caller-facing operations and their result/error types

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::classifier::ErrorClassifier;
use crate::config::{ConfigError, EngineConfig};
use crate::models::{Candidate, FlightSearchCriteria, HotelSearchCriteria, Preferences, TravelerDetails};
use crate::providers::{
    AuthService, AuthToken, FareRules, FareRulesService, FlightItinerary, FlightItineraryService,
    FlightSearchService, HotelItineraryService, HotelSearchService, ItineraryDetails,
    ProviderError, RateSelectionRequest, RateSelectionResponse, RoomRatesService,
};
use crate::resolver::RateCombination;
use crate::retry::AttemptRecord;
use crate::{flight, hotel};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {message}")]
    Authentication { message: String, payload: Value },

    #[error("No candidates: {0}")]
    NoCandidates(String),

    #[error("No valid rate combinations for {candidate_id}")]
    NoValidCombinations { candidate_id: String },

    #[error("Provider error: {message}")]
    ProviderFatal { message: String, payload: Value },

    #[error(
        "All attempts exhausted: {candidates} candidate(s), {attempts} attempt(s) in {elapsed_ms}ms{}",
        .last_error.as_ref().map(|e| format!(", last error: {e}")).unwrap_or_default()
    )]
    AllAttemptsExhausted {
        candidates: u32,
        attempts: u32,
        elapsed_ms: u64,
        last_error: Option<ProviderError>,
    },
}

impl BookingError {
    pub fn provider_fatal(error: ProviderError) -> Self {
        BookingError::ProviderFatal {
            message: error.message,
            payload: error.payload,
        }
    }

    pub fn authentication(error: ProviderError) -> Self {
        BookingError::Authentication {
            message: error.message,
            payload: error.payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingArtifacts {
    Flight {
        fare_rules: FareRules,
        itinerary: FlightItinerary,
    },
    Hotel {
        rate_selection: RateSelectionRequest,
        response: RateSelectionResponse,
        details: ItineraryDetails,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingResult {
    pub candidate: Candidate,
    pub combination: Option<RateCombination>,
    pub artifacts: BookingArtifacts,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Clone)]
pub struct FlightServices {
    pub search: Arc<dyn FlightSearchService>,
    pub fare_rules: Arc<dyn FareRulesService>,
    pub itinerary: Arc<dyn FlightItineraryService>,
}

#[derive(Clone)]
pub struct HotelServices {
    pub search: Arc<dyn HotelSearchService>,
    pub itinerary: Arc<dyn HotelItineraryService>,
    pub rates: Arc<dyn RoomRatesService>,
}

// Caller-facing booking operations
#[async_trait]
pub trait BookingOrchestrator: Send + Sync + 'static {
    async fn book_flight(
        &self,
        criteria: FlightSearchCriteria,
        preferences: Preferences,
    ) -> Result<BookingResult, BookingError>;

    async fn book_hotel(
        &self,
        criteria: HotelSearchCriteria,
        travelers: TravelerDetails,
        preferences: Preferences,
    ) -> Result<BookingResult, BookingError>;
}

/// Holds configuration and provider handles only. Every booking request
/// builds its own cursors, budgets and attempt log, so one engine can serve
/// concurrent requests.
pub struct BookingEngine {
    pub(crate) config: EngineConfig,
    pub(crate) classifier: ErrorClassifier,
    pub(crate) auth: Arc<dyn AuthService>,
    pub(crate) flights: FlightServices,
    pub(crate) hotels: HotelServices,
}

impl BookingEngine {
    pub fn new(
        config: EngineConfig,
        auth: Arc<dyn AuthService>,
        flights: FlightServices,
        hotels: HotelServices,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            classifier: ErrorClassifier::new(&config.classifier),
            config,
            auth,
            flights,
            hotels,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) async fn login(&self, inquiry_token: &str) -> Result<AuthToken, BookingError> {
        self.auth
            .login(inquiry_token)
            .await
            .map_err(BookingError::authentication)
    }
}

#[async_trait]
impl BookingOrchestrator for BookingEngine {
    async fn book_flight(
        &self,
        criteria: FlightSearchCriteria,
        preferences: Preferences,
    ) -> Result<BookingResult, BookingError> {
        flight::book(self, &criteria, &preferences).await
    }

    async fn book_hotel(
        &self,
        criteria: HotelSearchCriteria,
        travelers: TravelerDetails,
        preferences: Preferences,
    ) -> Result<BookingResult, BookingError> {
        hotel::book(self, &criteria, &travelers, &preferences).await
    }
}
