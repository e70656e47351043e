// Flight booking: search, price-ordered fallback list, fare rules + itinerary per candidate

use tracing::{info, instrument};

use crate::engine::{BookingArtifacts, BookingEngine, BookingError, BookingResult};
use crate::fallback::FallbackOrchestrator;
use crate::models::{FlightSearchCriteria, Preferences};
use crate::providers::{FlightOfferRequest, FlightSearchRequest, ProviderError};
use crate::ranking::{price_ordered, starting_index, trim_outliers};
use crate::retry::AttemptLog;

pub fn validate(criteria: &FlightSearchCriteria) -> Result<(), BookingError> {
    let mut missing = Vec::new();
    if criteria.departure_city.is_none() {
        missing.push("departure_city");
    }
    if criteria.cities.is_empty() {
        missing.push("cities");
    }
    if criteria.travelers == 0 {
        missing.push("travelers");
    }
    if criteria.start_date.is_none() {
        missing.push("start_date");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BookingError::Validation(format!(
            "Missing required flight request parameters: {}",
            missing.join(", ")
        )))
    }
}

#[instrument(skip_all, fields(route = %criteria.route_name()))]
pub(crate) async fn book(
    engine: &BookingEngine,
    criteria: &FlightSearchCriteria,
    preferences: &Preferences,
) -> Result<BookingResult, BookingError> {
    validate(criteria)?;

    let (Some(departure_city), Some(arrival_city), Some(start_date)) = (
        criteria.departure_city.clone(),
        criteria.cities.first().cloned(),
        criteria.start_date,
    ) else {
        return Err(BookingError::Validation(
            "Missing required flight request parameters".to_string(),
        ));
    };
    let date = start_date.to_string();

    let token = engine.login(&criteria.inquiry_token).await?;

    let request = FlightSearchRequest {
        departure_city,
        arrival_city,
        date: date.clone(),
        travelers: criteria.travelers,
        inquiry_token: criteria.inquiry_token.clone(),
    };
    let pool = engine
        .flights
        .search
        .search(&request, &token)
        .await
        .map_err(BookingError::provider_fatal)?;

    if pool.is_empty() {
        return Err(BookingError::NoCandidates("No flights found".to_string()));
    }

    let policy = &engine.config.flight;
    let ordered = price_ordered(&pool, policy);
    if ordered.is_empty() {
        return Err(BookingError::NoCandidates(format!(
            "No flights found within {} minute duration limit",
            policy.max_duration_minutes
        )));
    }

    let candidates = trim_outliers(ordered, policy.outlier_trim_fraction);
    let tier = preferences.flight.unwrap_or_default();
    let start = starting_index(candidates.len(), tier);
    info!(
        pool = pool.len(),
        candidates = candidates.len(),
        start,
        ?tier,
        "Starting flight fallback"
    );

    let route_name = criteria.route_name();
    let services = &engine.flights;
    let trace_id = pool.trace_id.as_str();
    let inquiry_token = criteria.inquiry_token.as_str();
    let token = &token;
    let date = date.as_str();
    let route_name = route_name.as_str();

    let mut log = AttemptLog::default();
    let mut orchestrator = FallbackOrchestrator::new(&engine.classifier);
    let outcome = orchestrator
        .run(&candidates, start, &mut log, move |candidate| async move {
            let offer = FlightOfferRequest::for_candidate(
                &candidate,
                trace_id,
                inquiry_token,
                route_name,
                date,
            );
            let fare_rules = services.fare_rules.fare_rules(&offer, token).await?;
            let itinerary = services.itinerary.create(&offer, token).await?;
            Ok::<_, ProviderError>((fare_rules, itinerary))
        })
        .await;

    match outcome {
        Ok(commit) => {
            let (fare_rules, itinerary) = commit.value;
            Ok(BookingResult {
                candidate: commit.candidate,
                combination: None,
                artifacts: BookingArtifacts::Flight {
                    fare_rules,
                    itinerary,
                },
                attempts: log.into_records(),
            })
        }
        Err(failure) => match (failure.classification, failure.last_error) {
            (Some(_), Some(error)) => Err(BookingError::provider_fatal(error)),
            (_, last_error) => Err(BookingError::AllAttemptsExhausted {
                candidates: failure.attempts,
                attempts: failure.attempts,
                elapsed_ms: failure.elapsed.as_millis() as u64,
                last_error,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classification;
    use crate::engine::BookingOrchestrator;
    use crate::mock_provider::{MockProvider, ProviderCall};
    use crate::models::{Candidate, CandidatePool, City, PreferenceTier};
    use crate::retry::AttemptOutcome;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;

    fn criteria() -> FlightSearchCriteria {
        FlightSearchCriteria {
            departure_city: Some(City {
                code: "DEL".to_string(),
                city: "Delhi".to_string(),
                country: Some("India".to_string()),
            }),
            cities: vec![City {
                code: "DXB".to_string(),
                city: "Dubai".to_string(),
                country: None,
            }],
            travelers: 2,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 10),
            inquiry_token: "inq-1".to_string(),
        }
    }

    fn preferences(tier: PreferenceTier) -> Preferences {
        Preferences {
            flight: Some(tier),
            budget: None,
        }
    }

    fn gone() -> ProviderError {
        ProviderError::with_payload(
            "Fare not available",
            json!({ "details": { "error": { "errorCode": "1000", "errorMessage": "Fare not available" } } }),
        )
    }

    // Ten flights priced 100..1000; after trimming f1..f8 remain
    fn ten_flights() -> CandidatePool {
        let flights = (0..10)
            .rev()
            .map(|i| Candidate::flight(&format!("f{i}"), 100.0 * (i + 1) as f64, 180))
            .collect();
        CandidatePool::new("trace-1", flights)
    }

    #[tokio::test]
    async fn test_books_from_tier_starting_index() {
        let mock = Arc::new(MockProvider::new());
        mock.set_flight_pool(ten_flights());
        let engine = mock.engine(Default::default()).unwrap();

        let result = engine
            .book_flight(criteria(), preferences(PreferenceTier::Balanced))
            .await
            .unwrap();

        // trimmed list f1..f8, floor(8 * 0.5) = 4 -> f5
        assert_eq!(result.candidate.id, "f5");
        assert!(matches!(result.artifacts, BookingArtifacts::Flight { .. }));
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(
            mock.calls(),
            vec![
                ProviderCall::Login,
                ProviderCall::FlightSearch,
                ProviderCall::FareRules("f5".to_string()),
                ProviderCall::FlightItinerary("f5".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_skips_unavailable_offers() {
        let mock = Arc::new(MockProvider::new());
        mock.set_flight_pool(ten_flights());
        mock.fail_flight_itinerary("f7", gone());
        mock.fail_fare_rules("f8", gone());
        let engine = mock.engine(Default::default()).unwrap();

        // floor(8 * 0.75) = 6 -> f7, then f8, then the list ends
        let error = engine
            .book_flight(criteria(), preferences(PreferenceTier::Luxury))
            .await
            .unwrap_err();

        match error {
            BookingError::AllAttemptsExhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_error, Some(gone()));
            }
            other => panic!("unexpected error {other:?}"),
        }
        // candidates below the starting index are never tried
        assert_eq!(mock.count_calls(|c| matches!(c, ProviderCall::FareRules(_))), 2);
    }

    #[tokio::test]
    async fn test_skip_then_commit_records_attempts() {
        let mock = Arc::new(MockProvider::new());
        mock.set_flight_pool(ten_flights());
        mock.fail_flight_itinerary("f3", gone());
        mock.fail_flight_itinerary("f4", gone());
        let engine = mock.engine(Default::default()).unwrap();

        // floor(8 * 0.25) = 2 -> f3
        let result = engine
            .book_flight(criteria(), preferences(PreferenceTier::Economy))
            .await
            .unwrap();

        assert_eq!(result.candidate.id, "f5");
        let skips = result
            .attempts
            .iter()
            .filter(|r| r.outcome == AttemptOutcome::Failed(Classification::Skip))
            .count();
        assert_eq!(skips, 2);
    }

    #[tokio::test]
    async fn test_fatal_error_is_surfaced() {
        let mock = Arc::new(MockProvider::new());
        mock.set_flight_pool(ten_flights());
        mock.fail_flight_itinerary(
            "f5",
            ProviderError::with_payload("Session expired", json!({ "error": { "errorCode": 401 } })),
        );
        let engine = mock.engine(Default::default()).unwrap();

        let error = engine
            .book_flight(criteria(), Preferences::default())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            BookingError::ProviderFatal { ref message, .. } if message == "Session expired"
        ));
        assert_eq!(mock.count_calls(|c| matches!(c, ProviderCall::FlightItinerary(_))), 1);
    }

    #[tokio::test]
    async fn test_duration_filter_and_empty_pool() {
        let mock = Arc::new(MockProvider::new());
        mock.set_flight_pool(CandidatePool::new(
            "trace",
            vec![Candidate::flight("long", 100.0, 25 * 60)],
        ));
        let engine = mock.engine(Default::default()).unwrap();

        let error = engine
            .book_flight(criteria(), Preferences::default())
            .await
            .unwrap_err();
        assert!(matches!(error, BookingError::NoCandidates(_)));

        mock.set_flight_pool(CandidatePool::default());
        let error = engine
            .book_flight(criteria(), Preferences::default())
            .await
            .unwrap_err();
        assert_eq!(error, BookingError::NoCandidates("No flights found".to_string()));
    }

    #[tokio::test]
    async fn test_validation_and_auth_failures() {
        let mock = Arc::new(MockProvider::new());
        mock.set_flight_pool(ten_flights());
        let engine = mock.engine(Default::default()).unwrap();

        let mut missing = criteria();
        missing.cities.clear();
        missing.travelers = 0;
        let error = engine
            .book_flight(missing, Preferences::default())
            .await
            .unwrap_err();
        assert_eq!(
            error,
            BookingError::Validation(
                "Missing required flight request parameters: cities, travelers".to_string()
            )
        );
        assert!(mock.calls().is_empty());

        mock.set_login_fails(true);
        let error = engine
            .book_flight(criteria(), Preferences::default())
            .await
            .unwrap_err();
        assert!(matches!(error, BookingError::Authentication { .. }));
        assert_eq!(mock.count_calls(|c| *c == ProviderCall::FlightSearch), 0);
    }
}
