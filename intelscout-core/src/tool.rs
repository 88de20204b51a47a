//! Closed tool registry for mission plans
//!
//! The executor dispatches on `ToolKind` with exhaustive matching, so adding
//! a tool is a compile-time change rather than a reflective lookup.

use serde::{Deserialize, Serialize};

/// The set of tools a plan step may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Keyword web search returning formatted result text
    WebSearch,
    /// Headless-browser page fetch and text extraction
    WebResearch,
    /// Save the synthesized report to an external notebook page
    SaveToNotion,
    /// Send the synthesized report by email
    DispatchEmail,
}

impl ToolKind {
    /// Wire name used in plan JSON and trace entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
            Self::WebResearch => "web_research",
            Self::SaveToNotion => "save_to_notion",
            Self::DispatchEmail => "dispatch_email",
        }
    }

    /// Parse a plan-step tool name. Unknown names yield `None`; the planner
    /// drops such steps with a warning.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "web_search" => Some(Self::WebSearch),
            "web_research" => Some(Self::WebResearch),
            "save_to_notion" => Some(Self::SaveToNotion),
            "dispatch_email" => Some(Self::DispatchEmail),
            _ => None,
        }
    }

    /// Research tools feed the intel pool during the RESEARCHING phase.
    pub fn is_research(&self) -> bool {
        matches!(self, Self::WebSearch | Self::WebResearch)
    }

    /// Action tools run after synthesis during the ACTING phase.
    pub fn is_action(&self) -> bool {
        matches!(self, Self::SaveToNotion | Self::DispatchEmail)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_names() {
        for kind in [
            ToolKind::WebSearch,
            ToolKind::WebResearch,
            ToolKind::SaveToNotion,
            ToolKind::DispatchEmail,
        ] {
            assert_eq!(ToolKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("make_coffee"), None);
    }

    #[test]
    fn test_phase_partition() {
        assert!(ToolKind::WebSearch.is_research());
        assert!(ToolKind::WebResearch.is_research());
        assert!(ToolKind::SaveToNotion.is_action());
        assert!(ToolKind::DispatchEmail.is_action());
        assert!(!ToolKind::WebSearch.is_action());
    }

    #[test]
    fn test_serde_wire_format() {
        let json = serde_json::to_string(&ToolKind::WebResearch).unwrap();
        assert_eq!(json, "\"web_research\"");
        let kind: ToolKind = serde_json::from_str("\"save_to_notion\"").unwrap();
        assert_eq!(kind, ToolKind::SaveToNotion);
    }
}
