//! Exchange rates
//!
//! TTL-bound, in-process cache of conversion rates, consulted only by the
//! balance display boundary. The transaction path never reads it, and the
//! refresh job (see [`crate::jobs`]) is the only writer.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;

/// Result of a rate lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLookup {
    /// A fresh rate for the requested currency
    Available(Decimal),
    /// The cache holds a fresh table, but not this currency code
    UnknownCurrency,
    /// No table yet, or the last one is older than the TTL
    Unavailable,
}

/// Read side of the rate cache, injectable at the display boundary
pub trait RateProvider: Send + Sync {
    fn lookup(&self, currency: &str) -> RateLookup;
}

struct Snapshot {
    rates: HashMap<String, Decimal>,
    fetched_at: Instant,
}

/// Conversion-rate cache tolerant of staleness up to its TTL
pub struct RateCache {
    ttl: Duration,
    inner: RwLock<Option<Snapshot>>,
}

impl RateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(None),
        }
    }

    /// Replace the cached table. Currency codes are stored uppercase.
    pub fn store(&self, rates: HashMap<String, Decimal>) {
        let rates = rates
            .into_iter()
            .map(|(code, rate)| (code.to_uppercase(), rate))
            .collect();

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *inner = Some(Snapshot {
            rates,
            fetched_at: Instant::now(),
        });
    }
}

impl RateProvider for RateCache {
    fn lookup(&self, currency: &str) -> RateLookup {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());

        let Some(snapshot) = inner.as_ref() else {
            return RateLookup::Unavailable;
        };
        if snapshot.fetched_at.elapsed() > self.ttl {
            return RateLookup::Unavailable;
        }

        match snapshot.rates.get(&currency.to_uppercase()) {
            Some(rate) => RateLookup::Available(*rate),
            None => RateLookup::UnknownCurrency,
        }
    }
}
