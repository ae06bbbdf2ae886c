//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use stylecal_core::jobs::CatalogRefreshJob;
use stylecal_core::ports::AccountStore;
use stylecal_core::{CalendarService, RuleAdmin};

use crate::config::Config;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub config: Arc<Config>,
    pub calendar: CalendarService,
    pub rules: RuleAdmin,
    pub catalog_refresh: CatalogRefreshJob,
}
