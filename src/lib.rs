// ============================================================================
// Digital Life Service Library
// ============================================================================

pub mod config;
pub mod core;
pub mod error;
pub mod facade;
pub mod pagination;
pub mod state;
pub mod storage;
pub mod transaction;
pub mod web;

pub use crate::core::{Result, StoreError};
pub use error::{AppError, AppResult};
pub use state::AppState;
pub use web::build_router;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("digital_life=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
