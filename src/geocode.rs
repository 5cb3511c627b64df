//! Reverse geocoding.
//!
//! [`ReverseGeocoder`] is the seam between the report pipelines and the outside
//! world. Every failure mode (no result, HTTP error, network error) collapses
//! into `None`: a missing address is never fatal to a run.
//!
//! Implementations:
//! - [`NominatimClient`](crate::http::NominatimClient) (feature `http`): rate-limited HTTP client
//! - [`OfflineGeocoder`]: never resolves anything
//! - [`CachingGeocoder`]: memoizes another geocoder per rounded coordinate

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use log::debug;
use serde::Deserialize;

use crate::{CoordKey, GpsPoint};

/// Structured address as returned by Nominatim's `addressdetails`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub road: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub suburb: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl Address {
    /// Locality for the visit report: village, suburb, town, then city.
    pub fn locality(&self) -> Option<&str> {
        [&self.village, &self.suburb, &self.town, &self.city]
            .into_iter()
            .find_map(|v| non_empty(v))
    }

    /// Settlement for address labels: city, town, then village.
    pub fn settlement(&self) -> Option<&str> {
        [&self.city, &self.town, &self.village]
            .into_iter()
            .find_map(|v| non_empty(v))
    }

    /// One-line label `"Road, 12345 City"`.
    ///
    /// Missing parts are left out; separators at either end are trimmed, so a
    /// road-less address reads `"12345 City"`. May be empty.
    pub fn label(&self) -> String {
        let road = non_empty(&self.road).unwrap_or("");
        let postcode = non_empty(&self.postcode).unwrap_or("");
        let settlement = self.settlement().unwrap_or("");

        format!("{}, {} {}", road, postcode, settlement)
            .trim_matches(|c| c == ',' || c == ' ')
            .to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Resolves coordinates to addresses.
#[allow(async_fn_in_trait)]
pub trait ReverseGeocoder {
    /// Address at `point`, or `None` when the lookup fails or finds nothing.
    async fn reverse_geocode(&self, point: GpsPoint) -> Option<Address>;
}

/// Geocoder for offline runs: every lookup comes back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGeocoder;

impl ReverseGeocoder for OfflineGeocoder {
    async fn reverse_geocode(&self, _point: GpsPoint) -> Option<Address> {
        None
    }
}

/// Memoizes lookups per coordinate rounded to six decimals.
///
/// Negative results are cached as well; the wrapped client is expected to
/// retry transient failures itself.
pub struct CachingGeocoder<G> {
    inner: G,
    cache: Mutex<HashMap<CoordKey, Option<Address>>>,
    lookups: AtomicU32,
    hits: AtomicU32,
}

impl<G> CachingGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            lookups: AtomicU32::new(0),
            hits: AtomicU32::new(0),
        }
    }

    /// (total lookups, cache hits)
    pub fn stats(&self) -> (u32, u32) {
        (
            self.lookups.load(Ordering::Relaxed),
            self.hits.load(Ordering::Relaxed),
        )
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    fn cached(&self, key: CoordKey) -> Option<Option<Address>> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(&key).cloned()
    }

    fn store(&self, key: CoordKey, address: Option<Address>) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(key, address);
    }
}

impl<G: ReverseGeocoder> ReverseGeocoder for CachingGeocoder<G> {
    async fn reverse_geocode(&self, point: GpsPoint) -> Option<Address> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let key = point.rounded_key();

        if let Some(cached) = self.cached(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("[CachingGeocoder] Cache hit for {}", point);
            return cached;
        }

        let result = self.inner.reverse_geocode(point).await;
        self.store(key, result.clone());
        result
    }
}
