// Main library file for the booking orchestration engine

// Ranking, resolution and failure handling building blocks
pub mod classifier;
pub mod config;
pub mod fallback;
pub mod models;
pub mod ranking;
pub mod resolver;
pub mod retry;
pub mod scoring;

// Provider seams and the two booking pipelines
pub mod engine;
mod flight;
mod hotel;
pub mod mock_provider;
pub mod providers;

// Re-export key types for convenience
pub use classifier::{Classification, ErrorClassifier};
pub use config::{ClassifierConfig, ConfigError, EngineConfig, FlightPolicy, HotelPolicy, RetryBudget};
pub use engine::{
    BookingArtifacts, BookingEngine, BookingError, BookingOrchestrator, BookingResult,
    FlightServices, HotelServices,
};
pub use flight::validate as validate_flight_request;
pub use hotel::{allocate_rooms, validate as validate_hotel_request};
pub use models::{
    Candidate, CandidatePool, City, FlightSearchCriteria, HotelSearchCriteria, PreferenceTier,
    Preferences, ReviewSummary, RoomRequest, TravelerDetails,
};
pub use providers::ProviderError;
pub use resolver::{RateCombination, RateLineItem, RecommendationBundle};
pub use retry::{AttemptLog, AttemptOutcome, AttemptRecord};
pub use scoring::ScoredCandidate;
