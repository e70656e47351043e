// In-memory reservation provider for exercising the engine without a network

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::json;

use crate::config::{ConfigError, EngineConfig};
use crate::engine::{BookingEngine, FlightServices, HotelServices};
use crate::models::CandidatePool;
use crate::providers::{
    AuthService, AuthToken, FareRules, FareRulesService, FlightItinerary, FlightItineraryService,
    FlightOfferRequest, FlightSearchRequest, FlightSearchService, HotelItinerary,
    HotelItineraryRequest, HotelItineraryService, HotelSearchRequest, HotelSearchService,
    ItineraryDetails, ProviderError, RateSelectionRequest, RateSelectionResponse,
    RoomRatesService,
};
use crate::resolver::{Occupancy, RateLineItem, RecommendationBundle};

/// One call seen by the mock, keyed by the offer, hotel or recommendation it
/// targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Login,
    FlightSearch,
    FareRules(String),
    FlightItinerary(String),
    HotelSearch,
    HotelItinerary(String),
    SelectRates(String),
    Details(String),
}

pub struct MockProvider {
    request_count: AtomicUsize,
    fail_next_requests: AtomicUsize,
    delay_ms: AtomicUsize,
    login_fails: AtomicBool,
    flight_pool: Mutex<CandidatePool>,
    hotel_pool: Mutex<CandidatePool>,
    last_hotel_search: Mutex<Option<HotelSearchRequest>>,
    hotel_itineraries: DashMap<String, HotelItinerary>,
    fare_rules_failures: DashMap<String, ProviderError>,
    flight_itinerary_failures: DashMap<String, ProviderError>,
    hotel_itinerary_failures: DashMap<String, ProviderError>,
    rate_failures: DashMap<String, VecDeque<ProviderError>>,
    rate_failures_always: DashMap<String, ProviderError>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            request_count: AtomicUsize::new(0),
            fail_next_requests: AtomicUsize::new(0),
            delay_ms: AtomicUsize::new(0),
            login_fails: AtomicBool::new(false),
            flight_pool: Mutex::new(CandidatePool::default()),
            hotel_pool: Mutex::new(CandidatePool::default()),
            last_hotel_search: Mutex::new(None),
            hotel_itineraries: DashMap::new(),
            fare_rules_failures: DashMap::new(),
            flight_itinerary_failures: DashMap::new(),
            hotel_itinerary_failures: DashMap::new(),
            rate_failures: DashMap::new(),
            rate_failures_always: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn flight_services(self: &Arc<Self>) -> FlightServices {
        FlightServices {
            search: self.clone(),
            fare_rules: self.clone(),
            itinerary: self.clone(),
        }
    }

    pub fn hotel_services(self: &Arc<Self>) -> HotelServices {
        HotelServices {
            search: self.clone(),
            itinerary: self.clone(),
            rates: self.clone(),
        }
    }

    // Engine wired to this mock for every provider concern
    pub fn engine(self: &Arc<Self>, config: EngineConfig) -> Result<BookingEngine, ConfigError> {
        BookingEngine::new(
            config,
            self.clone(),
            self.flight_services(),
            self.hotel_services(),
        )
    }

    pub fn set_delay(&self, delay_ms: usize) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    pub fn fail_next_requests(&self, count: usize) {
        self.fail_next_requests.store(count, Ordering::SeqCst);
    }

    pub fn set_login_fails(&self, fails: bool) {
        self.login_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_flight_pool(&self, pool: CandidatePool) {
        *self.flight_pool.lock() = pool;
    }

    pub fn set_hotel_pool(&self, pool: CandidatePool) {
        *self.hotel_pool.lock() = pool;
    }

    pub fn set_hotel_itinerary(&self, hotel_id: &str, itinerary: HotelItinerary) {
        self.hotel_itineraries.insert(hotel_id.to_string(), itinerary);
    }

    pub fn fail_fare_rules(&self, offer: &str, error: ProviderError) {
        self.fare_rules_failures.insert(offer.to_string(), error);
    }

    pub fn fail_flight_itinerary(&self, offer: &str, error: ProviderError) {
        self.flight_itinerary_failures.insert(offer.to_string(), error);
    }

    pub fn fail_hotel_itinerary(&self, hotel_id: &str, error: ProviderError) {
        self.hotel_itinerary_failures
            .insert(hotel_id.to_string(), error);
    }

    /// Queues errors returned, one per call, before rate selection for this
    /// recommendation succeeds.
    pub fn queue_rate_failures(&self, recommendation_id: &str, errors: Vec<ProviderError>) {
        self.rate_failures
            .insert(recommendation_id.to_string(), errors.into());
    }

    pub fn fail_rates_always(&self, recommendation_id: &str, error: ProviderError) {
        self.rate_failures_always
            .insert(recommendation_id.to_string(), error);
    }

    pub fn last_hotel_search(&self) -> Option<HotelSearchRequest> {
        self.last_hotel_search.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Single-room itinerary with one recommendation priced at `price`.
    pub fn single_room_itinerary(hotel_id: &str, price: f64) -> HotelItinerary {
        let rate_id = format!("{hotel_id}-rate");
        HotelItinerary {
            itinerary_code: format!("itin-{hotel_id}"),
            trace_id: format!("trace-{hotel_id}"),
            items: json!([{ "code": hotel_id, "type": "HOTEL" }]),
            recommendations: vec![RecommendationBundle {
                id: format!("{hotel_id}-rec"),
                rate_ids: vec![rate_id.clone()],
            }],
            rates: vec![RateLineItem {
                id: rate_id,
                price,
                occupancies: vec![Occupancy {
                    room_id: format!("{hotel_id}-room"),
                    adults: 2,
                    children: 0,
                }],
            }],
        }
    }

    // Records the call, applies the configured delay and any forced failure
    async fn handle(&self, call: ProviderCall) -> Result<(), ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(call);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        let forced = self
            .fail_next_requests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Err(ProviderError::new("Service temporarily unavailable").with_status(503));
        }

        Ok(())
    }

    fn next_rate_failure(&self, recommendation_id: &str) -> Option<ProviderError> {
        if let Some(error) = self.rate_failures_always.get(recommendation_id) {
            return Some(error.clone());
        }
        self.rate_failures
            .get_mut(recommendation_id)
            .and_then(|mut queue| queue.pop_front())
    }
}

#[async_trait]
impl AuthService for MockProvider {
    async fn login(&self, _inquiry_token: &str) -> Result<AuthToken, ProviderError> {
        self.handle(ProviderCall::Login).await?;

        if self.login_fails.load(Ordering::SeqCst) {
            return Err(ProviderError::with_payload(
                "Invalid credentials",
                json!({ "error": { "errorCode": "401", "errorMessage": "Invalid credentials" } }),
            )
            .with_status(401));
        }

        Ok(AuthToken("mock-token".to_string()))
    }
}

#[async_trait]
impl FlightSearchService for MockProvider {
    async fn search(
        &self,
        _request: &FlightSearchRequest,
        _token: &AuthToken,
    ) -> Result<CandidatePool, ProviderError> {
        self.handle(ProviderCall::FlightSearch).await?;
        Ok(self.flight_pool.lock().clone())
    }
}

#[async_trait]
impl FareRulesService for MockProvider {
    async fn fare_rules(
        &self,
        offer: &FlightOfferRequest,
        _token: &AuthToken,
    ) -> Result<FareRules, ProviderError> {
        self.handle(ProviderCall::FareRules(offer.result_index.clone()))
            .await?;

        if let Some(error) = self.fare_rules_failures.get(&offer.result_index) {
            return Err(error.clone());
        }

        Ok(FareRules {
            trace_id: offer.trace_id.clone(),
            result_index: offer.result_index.clone(),
            rules: json!({ "refundable": false, "route": offer.route_name }),
        })
    }
}

#[async_trait]
impl FlightItineraryService for MockProvider {
    async fn create(
        &self,
        offer: &FlightOfferRequest,
        _token: &AuthToken,
    ) -> Result<FlightItinerary, ProviderError> {
        self.handle(ProviderCall::FlightItinerary(offer.result_index.clone()))
            .await?;

        if let Some(error) = self.flight_itinerary_failures.get(&offer.result_index) {
            return Err(error.clone());
        }

        Ok(FlightItinerary {
            itinerary_code: format!("itin-{}", offer.result_index),
            trace_id: offer.trace_id.clone(),
            details: json!({ "date": offer.date }),
        })
    }
}

#[async_trait]
impl HotelSearchService for MockProvider {
    async fn search(
        &self,
        request: &HotelSearchRequest,
        _token: &AuthToken,
    ) -> Result<CandidatePool, ProviderError> {
        self.handle(ProviderCall::HotelSearch).await?;
        *self.last_hotel_search.lock() = Some(request.clone());
        Ok(self.hotel_pool.lock().clone())
    }
}

#[async_trait]
impl HotelItineraryService for MockProvider {
    async fn create(
        &self,
        request: &HotelItineraryRequest,
        _token: &AuthToken,
    ) -> Result<HotelItinerary, ProviderError> {
        self.handle(ProviderCall::HotelItinerary(request.hotel_id.clone()))
            .await?;

        if let Some(error) = self.hotel_itinerary_failures.get(&request.hotel_id) {
            return Err(error.clone());
        }

        Ok(self
            .hotel_itineraries
            .get(&request.hotel_id)
            .map(|itinerary| itinerary.clone())
            .unwrap_or_else(|| Self::single_room_itinerary(&request.hotel_id, 100.0)))
    }

    async fn details(
        &self,
        itinerary_code: &str,
        trace_id: &str,
        _token: &AuthToken,
    ) -> Result<ItineraryDetails, ProviderError> {
        self.handle(ProviderCall::Details(itinerary_code.to_string()))
            .await?;

        Ok(ItineraryDetails {
            itinerary_code: itinerary_code.to_string(),
            record: json!({ "traceId": trace_id, "status": "CONFIRMED" }),
        })
    }
}

#[async_trait]
impl RoomRatesService for MockProvider {
    async fn select_rates(
        &self,
        request: &RateSelectionRequest,
        _token: &AuthToken,
    ) -> Result<RateSelectionResponse, ProviderError> {
        self.handle(ProviderCall::SelectRates(request.recommendation_id.clone()))
            .await?;

        if let Some(error) = self.next_rate_failure(&request.recommendation_id) {
            return Err(error);
        }

        Ok(RateSelectionResponse {
            recommendation_id: request.recommendation_id.clone(),
            payload: json!({ "itineraryCode": request.itinerary_code, "rooms": request.allocations.len() }),
        })
    }
}
