//! Inbound objective validation
//!
//! Runs before any MissionLog row exists, so rejected requests leave no
//! trace in the audit log.

use intelscout_core::{IntelScoutError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Objectives shorter than this are rejected as noise.
pub const MIN_OBJECTIVE_CHARS: usize = 3;

/// Objectives longer than this are rejected.
pub const MAX_OBJECTIVE_CHARS: usize = 1000;

static INJECTION_SENTINELS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)<\s*script",
        r"(?i)\bunion\s+select\b",
        r"(?i)\bdrop\s+table\b",
        r"(?i)\bdelete\s+from\b",
        r"(?i)\binsert\s+into\b",
        r#"(?i)['"]\s*or\s+\d+\s*=\s*\d+"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// Accept or reject a research objective.
pub fn validate_objective(objective: &str) -> Result<()> {
    let trimmed = objective.trim();
    let chars = trimmed.chars().count();
    if chars == 0 {
        return Err(invalid("objective is empty"));
    }
    if chars < MIN_OBJECTIVE_CHARS {
        return Err(invalid("objective is too short"));
    }
    if chars > MAX_OBJECTIVE_CHARS {
        return Err(invalid(format!(
            "objective exceeds {MAX_OBJECTIVE_CHARS} characters"
        )));
    }
    if INJECTION_SENTINELS.iter().any(|p| p.is_match(trimmed)) {
        return Err(invalid("objective contains disallowed content"));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> IntelScoutError {
    IntelScoutError::InvalidInput {
        message: message.into(),
    }
}
