//! Headless-browser page fetch with layered timeouts
//!
//! Launches Chrome with anti-detection tweaks, extracts visible text, and
//! hands the content to a background ingestion task tagged with the active
//! conversation. The whole fetch runs under a top-level deadline so no
//! single navigation can hang a mission.

use crate::url_validator::validate_url;
use intelscout_config::ToolsConfig;
use intelscout_core::{IntelScoutError, Result};
use intelscout_rag::IngestionPipeline;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

/// Launch flags that keep automation markers out of the page environment.
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-first-run",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

/// Scraper configuration
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Top-level wrapper deadline for the whole fetch
    pub timeout: Duration,
    /// Navigation readiness wait before falling back to committed content
    pub nav_timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            nav_timeout: Duration::from_secs(20),
        }
    }
}

impl From<&ToolsConfig> for ScraperConfig {
    fn from(tools: &ToolsConfig) -> Self {
        let timeout = Duration::from_secs(tools.scraper_timeout_secs);
        Self {
            timeout,
            // Leave headroom for launch and extraction inside the deadline
            nav_timeout: timeout / 3,
        }
    }
}

/// Headless-browser scraping tool
pub struct WebScraperTool {
    config: ScraperConfig,
    ingestion: Option<Arc<IngestionPipeline>>,
}

impl WebScraperTool {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            ingestion: None,
        }
    }

    /// Attach the background ingestion pipeline; scraped pages then feed
    /// the vector memory without blocking the scrape return.
    pub fn with_ingestion(mut self, pipeline: Arc<IngestionPipeline>) -> Self {
        self.ingestion = Some(pipeline);
        self
    }

    /// Fetch a page's visible text. The URL must satisfy the SSRF
    /// predicate; violations fail before any browser is launched.
    pub async fn scrape(&self, url: &str, conversation_id: i64) -> Result<String> {
        let parsed = validate_url(url)?;
        let target = parsed.to_string();
        let nav_timeout = self.config.nav_timeout;

        let fetch =
            tokio::task::spawn_blocking(move || fetch_visible_text(&target, nav_timeout));
        let text = tokio::time::timeout(self.config.timeout, fetch)
            .await
            .map_err(|_| IntelScoutError::ScrapeFailed {
                url: url.to_string(),
                message: format!(
                    "deadline of {}s exceeded",
                    self.config.timeout.as_secs()
                ),
            })?
            .map_err(|e| IntelScoutError::ScrapeFailed {
                url: url.to_string(),
                message: format!("scrape task aborted: {e}"),
            })??;

        debug!(url, chars = text.len(), "scrape complete");

        if let Some(pipeline) = &self.ingestion {
            let pipeline = Arc::clone(pipeline);
            let title = title_from_url(&parsed);
            let content = text.clone();
            // Fire-and-forget: ingestion must not block the scrape return
            tokio::spawn(async move {
                if let Err(e) = pipeline.ingest(conversation_id, &title, &content).await {
                    warn!(title = title.as_str(), error = %e, "background ingestion failed");
                }
            });
        }

        Ok(text)
    }
}

/// Drive the browser on a blocking thread: launch, navigate with two-tier
/// readiness, extract visible text, close on drop.
fn fetch_visible_text(url: &str, nav_timeout: Duration) -> Result<String> {
    use headless_chrome::{Browser, LaunchOptions};

    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .window_size(Some((1366, 900)))
        .args(STEALTH_ARGS.iter().map(OsStr::new).collect())
        .idle_browser_timeout(nav_timeout * 4)
        .build()
        .map_err(|e| scrape_failed(url, format!("failed to build launch options: {e}")))?;

    let browser =
        Browser::new(options).map_err(|e| scrape_failed(url, format!("launch failed: {e}")))?;
    let tab = browser
        .new_tab()
        .map_err(|e| scrape_failed(url, format!("failed to open tab: {e}")))?;

    tab.set_default_timeout(nav_timeout);
    if let Err(e) = tab.set_user_agent(USER_AGENT, None, None) {
        warn!(url, error = %e, "failed to set user agent");
    }

    tab.navigate_to(url)
        .map_err(|e| scrape_failed(url, format!("navigation failed: {e}")))?;

    // Tier one waits for the DOM to settle; when that times out we fall
    // back to whatever the renderer has committed rather than failing.
    if tab.wait_until_navigated().is_err() {
        warn!(url, "navigation wait timed out, extracting committed content");
    }

    let text = tab
        .find_element("body")
        .and_then(|body| body.get_inner_text())
        .map_err(|e| scrape_failed(url, format!("text extraction failed: {e}")))?;

    let text = clean_text(&text);
    if text.is_empty() {
        return Err(scrape_failed(url, "page yielded no visible text".to_string()));
    }
    Ok(text)
}

fn scrape_failed(url: &str, message: String) -> IntelScoutError {
    IntelScoutError::ScrapeFailed {
        url: url.to_string(),
        message,
    }
}

/// Collapse runs of blank lines and trim whitespace per line.
fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Ingestion title for a scraped page: host plus path.
fn title_from_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or("page");
    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        host.to_string()
    } else {
        format!("{host}{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unsafe_url_rejected_before_launch() {
        let tool = WebScraperTool::new(ScraperConfig::default());
        let err = tool.scrape("file:///etc/passwd", 1).await.unwrap_err();
        assert!(matches!(err, IntelScoutError::UnsafeUrl { .. }));

        let err = tool.scrape("http://127.0.0.1/admin", 1).await.unwrap_err();
        assert!(matches!(err, IntelScoutError::UnsafeUrl { .. }));
    }

    #[test]
    fn test_clean_text() {
        let raw = "  Title  \n\n\n\nBody line one\n   \n\n Body line two  ";
        let cleaned = clean_text(raw);
        assert_eq!(cleaned, "Title\n\nBody line one\n\nBody line two");
    }

    #[test]
    fn test_title_from_url() {
        let url = Url::parse("https://shop.example.com/gpus/h100/").unwrap();
        assert_eq!(title_from_url(&url), "shop.example.com/gpus/h100");

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(title_from_url(&url), "example.com");
    }

    #[test]
    fn test_config_from_tools() {
        let tools = ToolsConfig {
            scraper_timeout_secs: 30,
            ..ToolsConfig::default()
        };
        let config = ScraperConfig::from(&tools);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.nav_timeout, Duration::from_secs(10));
    }
}
