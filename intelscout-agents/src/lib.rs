//! Mission planning and execution
//!
//! The plan→act→observe→synthesize loop: the planner turns an objective
//! into a tool plan, the executor drives it while the intel curator keeps
//! the evidence pool inside the LLM gateway's payload budget, and the
//! result is persisted to both stores.

pub mod curator;
pub mod executor;
pub mod planner;
pub mod toolset;

pub use curator::{is_price_bearing, IntelCurator};
pub use executor::{MissionExecutor, MissionOutcome};
pub use planner::Planner;
pub use toolset::{ActionTool, ResearchTool, SearchTool, Toolset};
