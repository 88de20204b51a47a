//! Tool seams for the mission executor
//!
//! The executor dispatches through these traits so tests can substitute
//! deterministic tools; production wires in the concrete search, scraper,
//! and action implementations.

use async_trait::async_trait;
use intelscout_core::{Result, ToolKind};
use intelscout_tools::{ActionDispatcher, WebScraperTool, WebSearchTool};
use serde_json::Value;
use std::sync::Arc;

/// Keyword search used by `web_search` steps and the price top-up.
#[async_trait]
pub trait SearchTool: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
    async fn search_prices(&self, product: &str, year: &str) -> Result<String>;
}

/// Page fetch used by `web_research` steps.
#[async_trait]
pub trait ResearchTool: Send + Sync {
    async fn scrape(&self, url: &str, conversation_id: i64) -> Result<String>;
}

/// Side-effect dispatch used by action steps.
#[async_trait]
pub trait ActionTool: Send + Sync {
    async fn dispatch(&self, kind: ToolKind, args: &Value, report: &str) -> Result<String>;
}

#[async_trait]
impl SearchTool for WebSearchTool {
    async fn search(&self, query: &str) -> Result<String> {
        WebSearchTool::search(self, query).await
    }

    async fn search_prices(&self, product: &str, year: &str) -> Result<String> {
        WebSearchTool::search_prices(self, product, year).await
    }
}

#[async_trait]
impl ResearchTool for WebScraperTool {
    async fn scrape(&self, url: &str, conversation_id: i64) -> Result<String> {
        WebScraperTool::scrape(self, url, conversation_id).await
    }
}

#[async_trait]
impl ActionTool for ActionDispatcher {
    async fn dispatch(&self, kind: ToolKind, args: &Value, report: &str) -> Result<String> {
        ActionDispatcher::dispatch(self, kind, args, report).await
    }
}

/// The executor's tool bundle.
#[derive(Clone)]
pub struct Toolset {
    pub search: Arc<dyn SearchTool>,
    pub research: Arc<dyn ResearchTool>,
    pub actions: Arc<dyn ActionTool>,
}

impl Toolset {
    pub fn new(
        search: Arc<dyn SearchTool>,
        research: Arc<dyn ResearchTool>,
        actions: Arc<dyn ActionTool>,
    ) -> Self {
        Self {
            search,
            research,
            actions,
        }
    }
}
