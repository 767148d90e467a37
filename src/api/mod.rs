//! API module
//!
//! HTTP boundary: router, request/response types and shared state.

use std::sync::Arc;

use crate::rates::RateProvider;
use crate::store::BalanceStore;

pub mod routes;

pub use routes::create_router;

/// Shared state handed to every request handler. The store and rate provider
/// are trait objects so tests and embeddings can swap implementations.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BalanceStore>,
    pub rates: Arc<dyn RateProvider>,
    pub base_currency: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BalanceStore>,
        rates: Arc<dyn RateProvider>,
        base_currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            rates,
            base_currency: base_currency.into(),
        }
    }
}
