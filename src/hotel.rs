// Hotel booking: ranked hotels, priced combinations, bounded rate selection per combination

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::classifier::Classification;
use crate::engine::{BookingArtifacts, BookingEngine, BookingError, BookingResult};
use crate::models::{
    Candidate, HotelSearchCriteria, PreferenceTier, Preferences, TravelerDetails,
};
use crate::providers::{
    AuthToken, HotelItineraryRequest, HotelSearchRequest, RateSelectionRequest,
    RateSelectionResponse, RoomAllocation,
};
use crate::resolver::{index_rates, resolve, RateCombination};
use crate::retry::{AttemptContext, AttemptLog, AttemptOutcome, Deadline, RetryScope, StopReason};
use crate::scoring::{rank_by_score, ScoredCandidate};

pub fn validate(
    criteria: &HotelSearchCriteria,
    travelers: &TravelerDetails,
) -> Result<(), BookingError> {
    let mut missing = Vec::new();
    if criteria.city.trim().is_empty() {
        missing.push("city".to_string());
    }
    if criteria.check_in.is_none() {
        missing.push("check_in".to_string());
    }
    if criteria.check_out.is_none() {
        missing.push("check_out".to_string());
    }
    if travelers.rooms.is_empty() {
        missing.push("rooms".to_string());
    }
    for (i, room) in travelers.rooms.iter().enumerate() {
        if room.adults == 0 {
            missing.push(format!("rooms[{i}].adults"));
        }
    }

    if !missing.is_empty() {
        return Err(BookingError::Validation(format!(
            "Missing required hotel request parameters: {}",
            missing.join(", ")
        )));
    }

    if let (Some(check_in), Some(check_out)) = (criteria.check_in, criteria.check_out) {
        if check_out <= check_in {
            return Err(BookingError::Validation(format!(
                "check_out {check_out} must be after check_in {check_in}"
            )));
        }
    }

    Ok(())
}

/// Pairs the i-th rate of a combination with the i-th requested room.
/// `None` when the shapes don't line up.
pub fn allocate_rooms(
    combination: &RateCombination,
    travelers: &TravelerDetails,
) -> Option<Vec<RoomAllocation>> {
    if combination.items.len() != travelers.rooms.len() {
        return None;
    }

    combination
        .items
        .iter()
        .zip(&travelers.rooms)
        .map(|(rate, room)| {
            Some(RoomAllocation {
                rate_id: rate.id.clone(),
                room_id: rate.room_id()?.to_string(),
                adults: room.adults,
                child_ages: room.valid_child_ages(),
            })
        })
        .collect()
}

struct HotelCommit {
    candidate: Candidate,
    combination: RateCombination,
    selection: RateSelectionRequest,
    response: RateSelectionResponse,
}

// Per-request state for one hotel booking
struct HotelBooking<'a> {
    engine: &'a BookingEngine,
    token: &'a AuthToken,
    criteria: &'a HotelSearchCriteria,
    travelers: &'a TravelerDetails,
    trace_id: &'a str,
    start_date: String,
}

impl HotelBooking<'_> {
    async fn select(
        &self,
        ranked: &[ScoredCandidate],
        log: &mut AttemptLog,
    ) -> Result<HotelCommit, BookingError> {
        let engine = self.engine;
        let policy = &engine.config.hotel;
        let started = Instant::now();

        let mut hotels_tried = 0;
        let mut attempts = 0;
        let mut priced_any = false;
        let mut last_error = None;

        for (index, scored) in ranked
            .iter()
            .take(policy.max_hotel_attempts as usize)
            .enumerate()
        {
            let hotel = &scored.candidate;
            hotels_tried += 1;
            if index > 0 {
                info!(
                    hotel_attempt = index + 1,
                    max_hotel_attempts = policy.max_hotel_attempts,
                    hotel_id = %hotel.id,
                    "Trying next hotel"
                );
            }

            let request = HotelItineraryRequest {
                hotel_id: hotel.reference.clone(),
                trace_id: self.trace_id.to_string(),
                city: self.criteria.city.clone(),
                start_date: self.start_date.clone(),
                inquiry_token: self.criteria.inquiry_token.clone(),
            };
            let itinerary = match engine.hotels.itinerary.create(&request, self.token).await {
                Ok(itinerary) => itinerary,
                Err(error) => {
                    let classification = engine.classifier.classify(&error);
                    let context = AttemptContext {
                        candidate_index: index,
                        candidate_id: hotel.id.clone(),
                        combination_id: None,
                    };
                    log.push(context.record(1, AttemptOutcome::Failed(classification)));
                    attempts += 1;

                    if classification == Classification::Fatal {
                        return Err(BookingError::provider_fatal(error));
                    }
                    warn!(hotel_id = %hotel.id, error = %error, "Itinerary creation failed");
                    last_error = Some(error);
                    continue;
                }
            };

            let combinations =
                match resolve(&itinerary.recommendations, &index_rates(&itinerary.rates)) {
                    Ok(combinations) => combinations,
                    Err(error) => {
                        warn!(hotel_id = %hotel.id, %error, "Hotel has nothing priceable");
                        continue;
                    }
                };
            priced_any = true;

            let deadline = Deadline::start(policy.rate_retry.deadline());
            for combination in combinations {
                if deadline.is_expired() {
                    break;
                }

                let Some(allocations) = allocate_rooms(&combination, self.travelers) else {
                    warn!(
                        recommendation_id = %combination.recommendation_id,
                        rates = combination.items.len(),
                        rooms = self.travelers.rooms.len(),
                        "Combination does not match requested rooms"
                    );
                    continue;
                };

                let selection = RateSelectionRequest {
                    itinerary_code: itinerary.itinerary_code.clone(),
                    trace_id: itinerary.trace_id.clone(),
                    recommendation_id: combination.recommendation_id.clone(),
                    allocations,
                    items: itinerary.items.clone(),
                    inquiry_token: self.criteria.inquiry_token.clone(),
                    city: self.criteria.city.clone(),
                    date: self.start_date.clone(),
                };
                let context = AttemptContext {
                    candidate_index: index,
                    candidate_id: hotel.id.clone(),
                    combination_id: Some(combination.recommendation_id.clone()),
                };

                let rates = &engine.hotels.rates;
                let token = self.token;
                let mut scope = RetryScope::new(policy.rate_retry, &deadline, &engine.classifier);
                let outcome = scope
                    .run(&context, log, || rates.select_rates(&selection, token))
                    .await;

                match outcome {
                    Ok(response) => {
                        info!(
                            hotel_id = %hotel.id,
                            recommendation_id = %combination.recommendation_id,
                            total_price = combination.total_price,
                            "Rates selected"
                        );
                        return Ok(HotelCommit {
                            candidate: hotel.clone(),
                            combination,
                            selection,
                            response,
                        });
                    }
                    Err(failure) => {
                        attempts += failure.attempts;
                        match (failure.reason, failure.last_error) {
                            (StopReason::Aborted(Classification::Fatal), Some(error)) => {
                                warn!(
                                    hotel_id = %hotel.id,
                                    recommendation_id = %combination.recommendation_id,
                                    error = %error,
                                    "Rate selection failed fatally, stopping"
                                );
                                return Err(BookingError::provider_fatal(error));
                            }
                            (StopReason::DeadlineExceeded, error) => {
                                if error.is_some() {
                                    last_error = error;
                                }
                                warn!(
                                    hotel_id = %hotel.id,
                                    elapsed_ms = deadline.elapsed().as_millis() as u64,
                                    "Rate selection deadline exceeded"
                                );
                                break;
                            }
                            (_, error) => {
                                if error.is_some() {
                                    last_error = error;
                                }
                            }
                        }
                    }
                }
            }
        }

        if !priced_any && last_error.is_none() {
            return Err(BookingError::NoValidCombinations {
                candidate_id: ranked
                    .first()
                    .map(|s| s.candidate.id.clone())
                    .unwrap_or_default(),
            });
        }

        warn!(hotels_tried, attempts, "All hotel attempts exhausted");
        Err(BookingError::AllAttemptsExhausted {
            candidates: hotels_tried,
            attempts,
            elapsed_ms: started.elapsed().as_millis() as u64,
            last_error,
        })
    }
}

#[instrument(skip_all, fields(city = %criteria.city))]
pub(crate) async fn book(
    engine: &BookingEngine,
    criteria: &HotelSearchCriteria,
    travelers: &TravelerDetails,
    preferences: &Preferences,
) -> Result<BookingResult, BookingError> {
    validate(criteria, travelers)?;

    let (Some(check_in), Some(check_out)) = (criteria.check_in, criteria.check_out) else {
        return Err(BookingError::Validation(
            "Missing required hotel request parameters".to_string(),
        ));
    };

    let token = engine.login(&criteria.inquiry_token).await?;

    let request = HotelSearchRequest {
        city: criteria.city.clone(),
        check_in: check_in.to_string(),
        check_out: check_out.to_string(),
        occupancies: travelers.rooms.clone(),
        star_ratings: PreferenceTier::star_ratings(preferences.budget),
        inquiry_token: criteria.inquiry_token.clone(),
    };
    let pool = engine
        .hotels
        .search
        .search(&request, &token)
        .await
        .map_err(BookingError::provider_fatal)?;

    if pool.is_empty() {
        return Err(BookingError::NoCandidates("No hotels found".to_string()));
    }

    let tier = preferences.budget.unwrap_or_default();
    let ranked = rank_by_score(&pool, tier);
    if ranked.is_empty() {
        return Err(BookingError::NoCandidates(
            "No suitable hotel found matching criteria".to_string(),
        ));
    }
    info!(
        pool = pool.len(),
        available = ranked.len(),
        ?tier,
        best = %ranked[0].candidate.id,
        "Hotels ranked"
    );

    let booking = HotelBooking {
        engine,
        token: &token,
        criteria,
        travelers,
        trace_id: &pool.trace_id,
        start_date: check_in.to_string(),
    };
    let mut log = AttemptLog::default();
    let commit = booking.select(&ranked, &mut log).await?;

    let details = engine
        .hotels
        .itinerary
        .details(
            &commit.selection.itinerary_code,
            &commit.selection.trace_id,
            &token,
        )
        .await
        .map_err(BookingError::provider_fatal)?;

    Ok(BookingResult {
        candidate: commit.candidate,
        combination: Some(commit.combination),
        artifacts: BookingArtifacts::Hotel {
            rate_selection: commit.selection,
            response: commit.response,
            details,
        },
        attempts: log.into_records(),
    })
}
