//! Relational audit log for rs-intelscout
//!
//! SQLite behind an r2d2 connection pool. Append-oriented tables for
//! conversations, messages, and mission logs. The relational log is the
//! authoritative human-readable copy of every report; the vector store is
//! only a search index over the same text.

mod log;
mod schema;

pub use log::{MissionStats, RelationalLog};
