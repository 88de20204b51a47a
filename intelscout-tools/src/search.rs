//! Keyword web search over the keyless DuckDuckGo HTML endpoint
//!
//! Returns formatted text (title, snippet, source URL per entry) for the
//! intel pool. The price variant fans one product out over a fixed set of
//! query rephrasings and dedupes hits by source URL, keeping rephrasing
//! order so results are deterministic given the backend's output.

use intelscout_config::ToolsConfig;
use intelscout_core::{IntelScoutError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

/// The six price-query rephrasings, expanded with `{product}`/`{year}`.
const PRICE_QUERY_TEMPLATES: &[&str] = &[
    "{product} price {year}",
    "{product} MSRP {year}",
    "{product} cost {year}",
    "buy {product} {year} price",
    "{product} retail price USD",
    "{product} street price {year}",
];

/// Web search configuration
#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    pub max_results: usize,
    pub timeout: Duration,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            max_results: 8,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ToolsConfig> for WebSearchConfig {
    fn from(tools: &ToolsConfig) -> Self {
        Self {
            max_results: tools.search_max_results,
            timeout: Duration::from_secs(tools.search_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SearchHit {
    title: String,
    snippet: String,
    url: String,
}

/// Keyword search tool
pub struct WebSearchTool {
    client: Client,
    config: WebSearchConfig,
}

impl WebSearchTool {
    pub fn new(config: WebSearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IntelScoutError::SearchFailed {
                message: "failed to build search client".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, config })
    }

    /// Run one keyword query, returning formatted result text.
    pub async fn search(&self, query: &str) -> Result<String> {
        let hits = self.fetch_hits(query).await?;
        if hits.is_empty() {
            return Ok(format!("No results found for '{query}'."));
        }
        Ok(format_hits(&hits))
    }

    /// Price-oriented search: six rephrasings, deduplicated by source URL,
    /// concatenated in rephrasing order.
    pub async fn search_prices(&self, product: &str, year: &str) -> Result<String> {
        let mut seen_urls: Vec<String> = Vec::new();
        let mut unique_hits: Vec<SearchHit> = Vec::new();

        for template in PRICE_QUERY_TEMPLATES {
            let query = template
                .replace("{product}", product)
                .replace("{year}", year);
            match self.fetch_hits(&query).await {
                Ok(hits) => {
                    for hit in hits {
                        if !seen_urls.contains(&hit.url) {
                            seen_urls.push(hit.url.clone());
                            unique_hits.push(hit);
                        }
                    }
                }
                Err(e) => {
                    // One failed rephrasing does not sink the fan-out
                    warn!(query = query.as_str(), error = %e, "price rephrasing failed");
                }
            }
        }

        if unique_hits.is_empty() {
            return Err(IntelScoutError::SearchFailed {
                message: format!("no price results for '{product}'"),
                source: None,
            });
        }
        debug!(product, hits = unique_hits.len(), "price search complete");
        Ok(format_hits(&unique_hits))
    }

    async fn fetch_hits(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| IntelScoutError::SearchFailed {
                message: format!("search request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntelScoutError::SearchFailed {
                message: format!("search backend returned {status}"),
                source: None,
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| IntelScoutError::SearchFailed {
                message: format!("failed to read search response: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(parse_results(&html, self.config.max_results))
    }
}

/// Parse the DuckDuckGo HTML result page.
fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let result_selector = Selector::parse("div.result").expect("static selector");
    let title_selector = Selector::parse("a.result__a").expect("static selector");
    let snippet_selector = Selector::parse("a.result__snippet").expect("static selector");

    let mut hits = Vec::new();
    for result in document.select(&result_selector) {
        let Some(anchor) = result.select(&title_selector).next() else {
            continue;
        };
        let title = anchor.text().collect::<String>().trim().to_string();
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let url = resolve_redirect(href);
        if title.is_empty() || url.is_empty() {
            continue;
        }
        let snippet = result
            .select(&snippet_selector)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        hits.push(SearchHit {
            title,
            snippet,
            url,
        });
        if hits.len() >= max_results {
            break;
        }
    }
    hits
}

/// DuckDuckGo wraps hrefs in a redirect with the target in `uddg`.
fn resolve_redirect(href: &str) -> String {
    if let Some(pos) = href.find("uddg=") {
        let encoded = &href[pos + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    href.to_string()
}

fn format_hits(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        out.push_str(&hit.title);
        out.push('\n');
        if !hit.snippet.is_empty() {
            out.push_str(&hit.snippet);
            out.push('\n');
        }
        out.push_str("Source: ");
        out.push_str(&hit.url);
        out.push_str("\n\n");
    }
    out.trim_end().to_string()
}
