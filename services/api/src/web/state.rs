//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use course_market_core::checkout::{CheckoutOrchestrator, CheckoutSettings};
use course_market_core::ports::{DatabaseService, PaymentService};
use course_market_core::progress::ProgressOrchestrator;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub checkout: Arc<CheckoutOrchestrator>,
    pub progress: Arc<ProgressOrchestrator>,
}

impl AppState {
    /// Wires the orchestrators to the given adapters.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        payments: Arc<dyn PaymentService>,
        config: Arc<Config>,
    ) -> Self {
        let settings = CheckoutSettings {
            currency: config.checkout_currency.clone(),
            frontend_url: config.frontend_url.clone(),
        };
        Self {
            checkout: Arc::new(CheckoutOrchestrator::new(db.clone(), payments, settings)),
            progress: Arc::new(ProgressOrchestrator::new(db.clone())),
            db,
            config,
        }
    }
}
