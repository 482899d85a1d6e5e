//! Client-side weather store.
//!
//! Owns the current weather, the daily forecast, the favorite cities and the
//! loading/error flags, and is the only thing that talks to the proxy. Every
//! failure ends up in [`StoreState::error`]; nothing is returned as an `Err`.
//!
//! Each fetch takes a generation token when it starts and only commits if no
//! newer fetch has started since, so overlapping requests resolve to the most
//! recently *started* one rather than the last to finish.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    client::{ApiError, ProxyApi},
    forecast::daily_samples,
    location::{LocationError, LocationProvider, PermissionStatus},
    model::{Coordinates, ForecastEntry, WeatherSnapshot},
    persist::{PersistedState, StateStorage},
};

/// User-facing messages the store can surface.
pub mod messages {
    pub const EMPTY_CITY: &str = "Please enter a city name.";
    pub const CITY_NOT_FOUND: &str = "City not found. Please try another.";
    pub const SEARCH_FAILED: &str = "Search failed. Please try again.";
    pub const FORECAST_FAILED: &str = "Could not load the forecast. Please try again.";
    pub const NETWORK: &str = "Could not connect to the server.";
    pub const BAD_RESPONSE: &str = "Received an unexpected response from the server.";
    pub const LOCATION_NOT_COVERED: &str = "Could not retrieve weather data for your current location. The service may not have data for this area.";
    pub const LOCATION_FAILED: &str = "Failed to get weather for your location.";

    /// Provider text for an unknown city or coordinate.
    pub const CITY_NOT_FOUND_SENTINEL: &str = "city not found";
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub current_city: String,
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Vec<ForecastEntry>,
    pub loading: bool,
    pub error: Option<String>,
    pub favorite_cities: Vec<String>,
    /// Set when the last location lookup failed before any request was made.
    pub location_error: Option<LocationError>,
}

impl StoreState {
    fn persisted(&self) -> PersistedState {
        PersistedState {
            current_city: self.current_city.clone(),
            favorite_cities: self.favorite_cities.clone(),
        }
    }
}

/// How a fetch ended. The state already reflects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New data was committed.
    Committed,
    /// The request failed and the error message was committed.
    Failed,
    /// Input was rejected locally; no request was made.
    Rejected,
    /// A newer fetch started before this one resolved; its result was dropped.
    Superseded,
    /// No coordinates could be obtained; no request was made.
    LocationUnavailable,
}

pub struct WeatherStore<A, S> {
    api: A,
    storage: S,
    state: Mutex<StoreState>,
    generation: AtomicU64,
}

impl<A: ProxyApi, S: StateStorage> WeatherStore<A, S> {
    /// Build a store, restoring the persisted favorites and current city.
    ///
    /// A missing or unreadable blob leaves the defaults in place.
    pub fn new(api: A, storage: S) -> Self {
        let mut state = StoreState::default();

        match storage.load() {
            Ok(Some(saved)) => {
                state.current_city = saved.current_city;
                state.favorite_cities = saved.favorite_cities;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable weather state: {e:#}"),
        }

        Self { api, storage, state: Mutex::new(state), generation: AtomicU64::new(0) }
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.lock().clone()
    }

    pub fn favorite_cities(&self) -> Vec<String> {
        self.state.lock().favorite_cities.clone()
    }

    pub fn current_city(&self) -> String {
        self.state.lock().current_city.clone()
    }

    pub fn set_error(&self, error: Option<String>) {
        self.state.lock().error = error;
    }

    pub async fn fetch_by_city(&self, city: &str) -> FetchOutcome {
        let city = city.trim();
        if city.is_empty() {
            self.state.lock().error = Some(messages::EMPTY_CITY.to_string());
            return FetchOutcome::Rejected;
        }

        let token = self.begin();
        let (weather, forecast) =
            tokio::join!(self.api.weather_by_city(city), self.api.forecast_by_city(city));

        let result = match (weather, forecast) {
            (Ok(weather), Ok(forecast)) => Ok((weather, forecast)),
            (Err(e), _) => Err(city_error_message(&e)),
            (_, Err(e)) => Err(forecast_error_message(&e)),
        };

        match result {
            Ok((weather, forecast)) => {
                let city = weather.city_name.clone();
                self.commit(token, city, weather, forecast)
            }
            Err(message) => self.fail(token, message),
        }
    }

    /// Re-select a city, e.g. from the favorites list.
    pub async fn set_current_city(&self, city: &str) -> FetchOutcome {
        self.fetch_by_city(city).await
    }

    pub async fn fetch_by_coords(&self, lat: f64, lon: f64) -> FetchOutcome {
        let token = self.begin();

        match self.api.weather_by_coords(Coordinates { lat, lon }).await {
            Ok(combined) => self.commit(token, combined.city, combined.weather, combined.forecast),
            Err(e) => self.fail(token, coords_error_message(&e)),
        }
    }

    /// Locate the device and fetch weather for it.
    ///
    /// Permission denial and a failed position fix are recorded in
    /// `location_error` and never reach the network.
    pub async fn fetch_for_location(&self, location: &dyn LocationProvider) -> FetchOutcome {
        self.state.lock().location_error = None;

        if location.request_permission().await == PermissionStatus::Denied {
            return self.location_failed(LocationError::PermissionDenied);
        }

        match location.current_coordinates().await {
            Ok(coords) => self.fetch_by_coords(coords.lat, coords.lon).await,
            Err(e) => self.location_failed(e),
        }
    }

    /// `true` iff the proxy knows the city. Never fails.
    pub async fn validate_city(&self, city: &str) -> bool {
        match self.api.weather_by_city(city).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(city, "city validation failed: {e}");
                false
            }
        }
    }

    pub fn add_favorite_city(&self, city: &str) {
        {
            let mut state = self.state.lock();
            if state.favorite_cities.iter().any(|c| c == city) {
                return;
            }
            state.favorite_cities.insert(0, city.to_string());
        }
        self.persist();
    }

    /// Remove every exact match. Returns `false` (and skips the write) when
    /// the city was not a favorite.
    pub fn remove_favorite_city(&self, city: &str) -> bool {
        {
            let mut state = self.state.lock();
            let before = state.favorite_cities.len();
            state.favorite_cities.retain(|c| c != city);
            if state.favorite_cities.len() == before {
                return false;
            }
        }
        self.persist();
        true
    }

    fn begin(&self) -> u64 {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock();
        state.loading = true;
        state.error = None;
        token
    }

    fn is_current(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
    }

    fn commit(
        &self,
        token: u64,
        city: String,
        weather: WeatherSnapshot,
        forecast: Vec<ForecastEntry>,
    ) -> FetchOutcome {
        {
            let mut state = self.state.lock();
            if !self.is_current(token) {
                tracing::debug!(token, city = %city, "dropping superseded weather result");
                return FetchOutcome::Superseded;
            }

            state.current_city = city;
            state.weather = Some(weather);
            state.forecast = daily_samples(&forecast);
            state.loading = false;
            state.error = None;
        }

        self.persist();
        FetchOutcome::Committed
    }

    fn fail(&self, token: u64, message: String) -> FetchOutcome {
        let mut state = self.state.lock();
        if !self.is_current(token) {
            tracing::debug!(token, message = %message, "dropping superseded weather error");
            return FetchOutcome::Superseded;
        }

        state.loading = false;
        state.error = Some(message);
        FetchOutcome::Failed
    }

    fn location_failed(&self, error: LocationError) -> FetchOutcome {
        let mut state = self.state.lock();
        state.error = Some(error.to_string());
        state.location_error = Some(error);
        FetchOutcome::LocationUnavailable
    }

    fn persist(&self) {
        let snapshot = self.state.lock().persisted();
        if let Err(e) = self.storage.save(&snapshot) {
            tracing::warn!("Failed to persist weather state: {e:#}");
        }
    }
}

fn transport_message(err: &ApiError) -> Option<&'static str> {
    match err {
        ApiError::Status { .. } => None,
        ApiError::Decode(_) => Some(messages::BAD_RESPONSE),
        ApiError::Network(_) | ApiError::InvalidUrl(_) => Some(messages::NETWORK),
    }
}

fn city_error_message(err: &ApiError) -> String {
    if let Some(message) = transport_message(err) {
        return message.to_string();
    }
    match err.status() {
        Some(404) => messages::CITY_NOT_FOUND.to_string(),
        _ => err.message().unwrap_or(messages::SEARCH_FAILED).to_string(),
    }
}

fn forecast_error_message(err: &ApiError) -> String {
    transport_message(err).unwrap_or(messages::FORECAST_FAILED).to_string()
}

fn coords_error_message(err: &ApiError) -> String {
    if let Some(message) = transport_message(err) {
        return message.to_string();
    }
    match err.message() {
        Some(m) if m.eq_ignore_ascii_case(messages::CITY_NOT_FOUND_SENTINEL) => {
            messages::LOCATION_NOT_COVERED.to_string()
        }
        Some(m) => m.to_string(),
        None => messages::LOCATION_FAILED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        location::{FixedLocation, UnavailableLocation},
        model::CoordsWeather,
        persist::MemoryStorage,
    };
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };
    use tokio::sync::Notify;

    // 2024-05-01T00:00:00Z
    const MAY_FIRST: i64 = 1_714_521_600;

    fn snapshot(name: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            city_name: name.to_string(),
            temperature: 14.0,
            feels_like: 13.0,
            humidity: 70,
            description: "light rain".into(),
            icon_id: "10d".into(),
            country_code: "FR".into(),
        }
    }

    /// Every 3 hours for three days.
    fn raw_forecast() -> Vec<ForecastEntry> {
        (0..24)
            .map(|i| ForecastEntry {
                timestamp: MAY_FIRST + i * 3 * 3_600,
                temp_max: 15.0,
                temp_min: 9.0,
                icon_id: "10d".into(),
            })
            .collect()
    }

    fn not_found() -> ApiError {
        ApiError::Status { status: 404, message: Some("city not found".into()) }
    }

    #[derive(Default)]
    struct FakeProxy {
        weather: HashMap<String, Result<WeatherSnapshot, ApiError>>,
        forecast: HashMap<String, Result<Vec<ForecastEntry>, ApiError>>,
        coords: Option<Result<CoordsWeather, ApiError>>,
        /// City whose weather request waits for `gate` before answering.
        gated_city: Option<String>,
        gate: Arc<Notify>,
        calls: AtomicUsize,
    }

    impl FakeProxy {
        fn knows(mut self, query: &str, canonical: &str) -> Self {
            self.weather.insert(query.to_string(), Ok(snapshot(canonical)));
            self.forecast.insert(query.to_string(), Ok(raw_forecast()));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProxyApi for FakeProxy {
        async fn weather_by_city(&self, city: &str) -> Result<WeatherSnapshot, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gated_city.as_deref() == Some(city) {
                self.gate.notified().await;
            }
            self.weather.get(city).cloned().unwrap_or_else(|| Err(not_found()))
        }

        async fn forecast_by_city(&self, city: &str) -> Result<Vec<ForecastEntry>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.forecast.get(city).cloned().unwrap_or_else(|| Err(not_found()))
        }

        async fn weather_by_coords(&self, _coords: Coordinates) -> Result<CoordsWeather, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.coords.clone().unwrap_or_else(|| Err(not_found()))
        }
    }

    fn store(api: FakeProxy) -> WeatherStore<FakeProxy, MemoryStorage> {
        WeatherStore::new(api, MemoryStorage::new())
    }

    #[tokio::test]
    async fn fetch_by_city_commits_canonical_name_and_daily_forecast() {
        let store = store(FakeProxy::default().knows("paris", "Paris"));

        let outcome = store.fetch_by_city("  paris ").await;
        let state = store.snapshot();

        assert_eq!(outcome, FetchOutcome::Committed);
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.current_city, "Paris");
        assert_eq!(state.weather, Some(snapshot("Paris")));
        assert_eq!(state.forecast.len(), 3);
        assert!(state.forecast.iter().all(|e| e.timestamp % 86_400 == 12 * 3_600));
    }

    #[tokio::test]
    async fn blank_city_is_rejected_without_network() {
        let store = store(FakeProxy::default());

        for input in ["", "   ", "\t\n"] {
            assert_eq!(store.fetch_by_city(input).await, FetchOutcome::Rejected);
        }

        assert_eq!(store.api.calls(), 0);
        assert_eq!(store.snapshot().error.as_deref(), Some(messages::EMPTY_CITY));
        assert!(!store.snapshot().loading);
    }

    #[tokio::test]
    async fn unknown_city_sets_not_found_and_keeps_last_good_data() {
        let store = store(FakeProxy::default().knows("Oslo", "Oslo"));
        store.fetch_by_city("Oslo").await;

        let outcome = store.fetch_by_city("Atlantis").await;
        let state = store.snapshot();

        assert_eq!(outcome, FetchOutcome::Failed);
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some(messages::CITY_NOT_FOUND));
        assert_eq!(state.weather, Some(snapshot("Oslo")));
        assert_eq!(state.current_city, "Oslo");
    }

    #[tokio::test]
    async fn forecast_failure_fails_the_whole_fetch() {
        let mut api = FakeProxy::default().knows("Rome", "Rome");
        api.forecast.insert(
            "Rome".into(),
            Err(ApiError::Status { status: 500, message: Some("boom".into()) }),
        );
        let store = store(api);

        let outcome = store.fetch_by_city("Rome").await;
        let state = store.snapshot();

        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(state.error.as_deref(), Some(messages::FORECAST_FAILED));
        assert_eq!(state.weather, None);
        assert!(state.forecast.is_empty());
        assert_eq!(state.current_city, "");
    }

    #[tokio::test]
    async fn other_weather_status_passes_proxy_message_through() {
        let mut api = FakeProxy::default().knows("Rome", "Rome");
        api.weather.insert(
            "Rome".into(),
            Err(ApiError::Status { status: 401, message: Some("Invalid API key".into()) }),
        );
        let store = store(api);

        store.fetch_by_city("Rome").await;
        assert_eq!(store.snapshot().error.as_deref(), Some("Invalid API key"));
    }

    #[tokio::test]
    async fn network_failure_becomes_generic_message() {
        let mut api = FakeProxy::default();
        api.weather.insert("Rome".into(), Err(ApiError::Network("connection refused".into())));
        api.forecast.insert("Rome".into(), Ok(vec![]));
        let store = store(api);

        assert_eq!(store.fetch_by_city("Rome").await, FetchOutcome::Failed);
        assert_eq!(store.snapshot().error.as_deref(), Some(messages::NETWORK));
    }

    #[tokio::test]
    async fn new_fetch_clears_previous_error() {
        let store = store(FakeProxy::default().knows("Lima", "Lima"));
        store.fetch_by_city("Atlantis").await;
        assert!(store.snapshot().error.is_some());

        store.fetch_by_city("Lima").await;
        assert_eq!(store.snapshot().error, None);
    }

    #[tokio::test]
    async fn fetch_in_flight_is_loading_with_error_cleared() {
        let mut api = FakeProxy::default().knows("Slow", "Slowtown");
        api.gated_city = Some("Slow".into());
        let gate = api.gate.clone();
        let store = store(api);
        store.set_error(Some("stale failure".into()));

        let (outcome, mid) = tokio::join!(store.fetch_by_city("Slow"), async {
            let mid = store.snapshot();
            gate.notify_one();
            mid
        });

        assert!(mid.loading);
        assert_eq!(mid.error, None);
        assert_eq!(mid.weather, None);

        assert_eq!(outcome, FetchOutcome::Committed);
        let state = store.snapshot();
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.current_city, "Slowtown");
    }

    #[tokio::test]
    async fn superseded_fetch_does_not_overwrite_newer_result() {
        let mut api = FakeProxy::default().knows("Slow", "Slowtown").knows("Fast", "Fastville");
        api.gated_city = Some("Slow".into());
        let gate = api.gate.clone();
        let store = store(api);

        let (slow, fast) = tokio::join!(store.fetch_by_city("Slow"), async {
            let outcome = store.fetch_by_city("Fast").await;
            gate.notify_one();
            outcome
        });

        assert_eq!(fast, FetchOutcome::Committed);
        assert_eq!(slow, FetchOutcome::Superseded);
        let state = store.snapshot();
        assert_eq!(state.current_city, "Fastville");
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn fetch_by_coords_commits_combined_response() {
        let mut api = FakeProxy::default();
        api.coords = Some(Ok(CoordsWeather {
            city: "Montmartre".into(),
            weather: snapshot("Paris"),
            forecast: raw_forecast(),
        }));
        let store = store(api);

        let outcome = store.fetch_by_coords(48.88, 2.34).await;
        let state = store.snapshot();

        assert_eq!(outcome, FetchOutcome::Committed);
        assert_eq!(state.current_city, "Montmartre");
        assert_eq!(state.weather, Some(snapshot("Paris")));
        assert_eq!(state.forecast.len(), 3);
    }

    #[tokio::test]
    async fn coords_not_found_gets_friendlier_message() {
        let store = store(FakeProxy::default());

        assert_eq!(store.fetch_by_coords(0.0, 0.0).await, FetchOutcome::Failed);
        assert_eq!(store.snapshot().error.as_deref(), Some(messages::LOCATION_NOT_COVERED));
    }

    #[tokio::test]
    async fn coords_other_message_passes_through() {
        let mut api = FakeProxy::default();
        api.coords = Some(Err(ApiError::Status {
            status: 400,
            message: Some("wrong latitude".into()),
        }));
        let store = store(api);

        store.fetch_by_coords(123.0, 0.0).await;
        assert_eq!(store.snapshot().error.as_deref(), Some("wrong latitude"));
    }

    #[tokio::test]
    async fn location_denial_and_unavailability_are_distinct() {
        struct Denied;

        #[async_trait]
        impl LocationProvider for Denied {
            async fn request_permission(&self) -> PermissionStatus {
                PermissionStatus::Denied
            }

            async fn current_coordinates(&self) -> Result<Coordinates, LocationError> {
                unreachable!("coordinates requested without permission")
            }
        }

        let store = store(FakeProxy::default());

        assert_eq!(store.fetch_for_location(&Denied).await, FetchOutcome::LocationUnavailable);
        assert_eq!(store.snapshot().location_error, Some(LocationError::PermissionDenied));

        let unavailable = UnavailableLocation { reason: "gps off".into() };
        assert_eq!(
            store.fetch_for_location(&unavailable).await,
            FetchOutcome::LocationUnavailable
        );
        assert_eq!(
            store.snapshot().location_error,
            Some(LocationError::Unavailable("gps off".into()))
        );

        assert_eq!(store.api.calls(), 0);
    }

    #[tokio::test]
    async fn location_success_fetches_by_coords() {
        let mut api = FakeProxy::default();
        api.coords = Some(Ok(CoordsWeather {
            city: "Quito".into(),
            weather: snapshot("Quito"),
            forecast: vec![],
        }));
        let store = store(api);

        let location = FixedLocation(Coordinates { lat: -0.18, lon: -78.47 });
        assert_eq!(store.fetch_for_location(&location).await, FetchOutcome::Committed);

        let state = store.snapshot();
        assert_eq!(state.current_city, "Quito");
        assert_eq!(state.location_error, None);
    }

    #[tokio::test]
    async fn set_error_clears_error_for_fallback_flow() {
        let store = store(FakeProxy::default().knows("London", "London"));
        store.fetch_by_city("Atlantis").await;

        store.set_error(None);
        assert_eq!(store.snapshot().error, None);

        store.set_current_city("London").await;
        assert_eq!(store.current_city(), "London");
    }

    #[tokio::test]
    async fn validate_city_reports_existence_and_never_fails() {
        let mut api = FakeProxy::default().knows("Berlin", "Berlin");
        api.weather.insert("Offline".into(), Err(ApiError::Network("timeout".into())));
        let store = store(api);

        assert!(store.validate_city("Berlin").await);
        assert!(!store.validate_city("Atlantis").await);
        assert!(!store.validate_city("Offline").await);
    }

    #[test]
    fn add_favorite_is_idempotent_and_newest_first() {
        let store = store(FakeProxy::default());

        store.add_favorite_city("Oslo");
        store.add_favorite_city("Lima");
        store.add_favorite_city("Oslo");
        store.add_favorite_city("oslo");

        assert_eq!(store.favorite_cities(), vec!["oslo", "Lima", "Oslo"]);
    }

    #[test]
    fn remove_favorite_twice_is_a_no_op() {
        let store = store(FakeProxy::default());
        store.add_favorite_city("Oslo");
        store.add_favorite_city("Lima");

        assert!(store.remove_favorite_city("Oslo"));
        assert_eq!(store.favorite_cities(), vec!["Lima"]);

        assert!(!store.remove_favorite_city("Oslo"));
        assert_eq!(store.favorite_cities(), vec!["Lima"]);
    }

    #[tokio::test]
    async fn favorites_and_current_city_survive_restart() {
        let storage = MemoryStorage::new();
        let first = WeatherStore::new(FakeProxy::default().knows("Tokyo", "Tokyo"), storage);
        first.add_favorite_city("Tokyo");
        first.fetch_by_city("Tokyo").await;

        let blob = first.storage.blob().expect("state was persisted");
        let second = WeatherStore::new(FakeProxy::default(), MemoryStorage::with_blob(blob));
        let state = second.snapshot();

        assert_eq!(state.favorite_cities, vec!["Tokyo"]);
        assert_eq!(state.current_city, "Tokyo");
        assert_eq!(state.weather, None);
    }

    #[test]
    fn corrupt_persisted_state_is_ignored() {
        let store = WeatherStore::new(FakeProxy::default(), MemoryStorage::with_blob("{oops"));
        assert_eq!(store.snapshot(), StoreState::default());
    }
}
