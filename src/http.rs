//! Nominatim reverse-geocoding client with rate limiting.
//!
//! - Dispatch rate limiting (spaces out request starts, never below 500ms)
//! - Identifying `User-Agent` on every request
//! - Automatic retry with exponential backoff on 429, 5xx, timeouts and
//!   connection errors
//!
//! Lookups are issued one at a time; the public Nominatim service allows a
//! single request per second.

use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{
    GeocoderConfig, MAX_GEOCODER_INTERVAL_MS, MAX_GEOCODER_RETRIES, MAX_GEOCODER_TIMEOUT_SECS,
    MIN_GEOCODER_INTERVAL_MS,
};
use crate::error::{AnalyzerError, Result};
use crate::geocode::{Address, ReverseGeocoder};
use crate::GpsPoint;

/// Body of `/reverse?format=json`. Unresolvable coordinates come back as
/// `{"error": "Unable to geocode"}` with status 200.
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    error: Option<String>,
}

/// Dispatch rate limiter - spaces out when requests START.
struct DispatchRateLimiter {
    interval: Duration,
    next_dispatch: Mutex<Instant>,
    dispatched_count: AtomicU32,
    consecutive_429s: AtomicU32,
}

impl DispatchRateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: Mutex::new(Instant::now()),
            dispatched_count: AtomicU32::new(0),
            consecutive_429s: AtomicU32::new(0),
        }
    }

    /// Wait for our dispatch slot. Each caller gets a unique slot
    /// spaced `interval` apart.
    async fn wait_for_dispatch_slot(&self) -> u32 {
        let (wait_duration, dispatch_num) = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();

            let dispatch_at = if *next > now { *next } else { now };
            *next = dispatch_at + self.interval;

            let num = self.dispatched_count.fetch_add(1, Ordering::Relaxed) + 1;
            let wait = dispatch_at.saturating_duration_since(now);

            (wait, num)
        };

        // Wait outside the lock
        if wait_duration > Duration::from_millis(5) {
            debug!("[Dispatch #{}] Waiting {:?} for slot", dispatch_num, wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        dispatch_num
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        // Exponential backoff: 1s, 2s, 4s max
        let backoff = Duration::from_millis(500 * (1 << count.min(3)));
        warn!("[DispatchRateLimiter] Got 429! Consecutive: {}, backing off {:?}", count, backoff);
        backoff
    }
}

/// Outcome of one HTTP attempt.
enum Attempt {
    Done(Option<Address>),
    Retry { reason: String, wait: Option<Duration> },
}

/// Reverse geocoder backed by a Nominatim-compatible HTTP service.
pub struct NominatimClient {
    client: Client,
    endpoint: String,
    max_retries: u32,
    rate_limiter: DispatchRateLimiter,
    failures: AtomicU32,
}

impl NominatimClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs.clamp(1, MAX_GEOCODER_TIMEOUT_SECS)))
            .build()
            .map_err(|e| AnalyzerError::Geocoder(format!("Failed to create HTTP client: {}", e)))?;

        let interval_ms = config
            .min_interval_ms
            .clamp(MIN_GEOCODER_INTERVAL_MS, MAX_GEOCODER_INTERVAL_MS);
        info!(
            "[NominatimClient] Using {} (dispatch interval: {}ms, retries: {})",
            config.base_url, interval_ms, config.max_retries
        );

        Ok(Self {
            client,
            endpoint: format!("{}/reverse", config.base_url.trim_end_matches('/')),
            max_retries: config.max_retries.min(MAX_GEOCODER_RETRIES),
            rate_limiter: DispatchRateLimiter::new(Duration::from_millis(interval_ms)),
            failures: AtomicU32::new(0),
        })
    }

    /// Requests dispatched so far, retries included.
    pub fn request_count(&self) -> u32 {
        self.rate_limiter.dispatched_count.load(Ordering::Relaxed)
    }

    /// Lookups that ended without an address because of an error.
    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    async fn attempt(&self, point: GpsPoint) -> Attempt {
        let lat = point.latitude.to_string();
        let lon = point.longitude.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "json"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("addressdetails", "1"),
            ])
            .send()
            .await;

        let resp = match response {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return Attempt::Retry {
                    reason: format!("Request error: {}", e),
                    wait: None,
                };
            }
            Err(e) => {
                warn!("[Geocode {}] Request error: {}", point, e);
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Attempt::Done(None);
            }
        };

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Retry {
                reason: "429 Too Many Requests".to_string(),
                wait: Some(self.rate_limiter.record_429()),
            };
        }
        self.rate_limiter.record_success();

        if status.is_server_error() {
            return Attempt::Retry {
                reason: format!("HTTP {}", status),
                wait: None,
            };
        }
        if !status.is_success() {
            warn!("[Geocode {}] HTTP {}", point, status);
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Attempt::Done(None);
        }

        match resp.bytes().await {
            Ok(bytes) => Attempt::Done(parse_reverse_response(&bytes)),
            Err(e) if e.is_timeout() => Attempt::Retry {
                reason: format!("Body download error: {}", e),
                wait: None,
            },
            Err(e) => {
                warn!("[Geocode {}] Body download error: {}", point, e);
                self.failures.fetch_add(1, Ordering::Relaxed);
                Attempt::Done(None)
            }
        }
    }
}

impl ReverseGeocoder for NominatimClient {
    async fn reverse_geocode(&self, point: GpsPoint) -> Option<Address> {
        let mut retries = 0;
        let req_start = Instant::now();

        loop {
            self.rate_limiter.wait_for_dispatch_slot().await;

            match self.attempt(point).await {
                Attempt::Done(address) => {
                    debug!(
                        "[Geocode {}] {} after {:?}",
                        point,
                        if address.is_some() { "resolved" } else { "no address" },
                        req_start.elapsed()
                    );
                    return address;
                }
                Attempt::Retry { reason, wait } => {
                    retries += 1;
                    if retries > self.max_retries {
                        warn!("[Geocode {}] {}, giving up after {} attempts", point, reason, retries);
                        self.failures.fetch_add(1, Ordering::Relaxed);
                        return None;
                    }

                    let wait = wait.unwrap_or_else(|| Duration::from_millis(200 * (1 << retries.min(5))));
                    warn!("[Geocode {}] {}, retry {} after {:?}", point, reason, retries, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// Address from a reverse-geocoding body; `None` for error bodies and
/// anything that does not parse.
fn parse_reverse_response(bytes: &[u8]) -> Option<Address> {
    match serde_json::from_slice::<ReverseResponse>(bytes) {
        Ok(ReverseResponse {
            error: Some(error), ..
        }) => {
            debug!("[NominatimClient] Service error: {}", error);
            None
        }
        Ok(response) => response.address,
        Err(e) => {
            warn!("[NominatimClient] JSON parse error: {}", e);
            None
        }
    }
}
