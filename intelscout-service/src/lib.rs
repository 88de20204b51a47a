//! External-interface facade for rs-intelscout
//!
//! The HTTP transport, auth, and UI live elsewhere; this crate is the
//! boundary they call. It owns process wiring (singleton lifecycle) and the
//! request/response shapes for mission execution, retrieval queries,
//! report listings, stats, and health.

pub mod health;
pub mod mission;
pub mod query;
pub mod state;
pub mod validate;

pub use health::{HealthReport, HealthService};
pub use mission::{BufferedOutcome, MissionRequest, MissionService};
pub use query::{QueryRequest, QueryResponse, QueryService, ReportService};
pub use state::AppState;
pub use validate::validate_objective;

use tracing_subscriber::EnvFilter;

/// Install the process-wide tracing subscriber. Call once from the entry
/// point before `AppState::init`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,intelscout=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
