//! Budget-aware intel pool curation
//!
//! Evidence accumulates append-ordered during a mission; `materialize`
//! renders the pool into the synthesis prompt under a byte budget derived
//! from the LLM gateway's payload ceiling. Under pressure, price-bearing
//! evidence survives general evidence, degrading to an extracted price
//! summary before anything price-shaped is lost.

use intelscout_core::IntelRecord;
use intelscout_core::types::truncate_chars;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Per-record content cap applied at append time, in characters.
pub const RECORD_CONTENT_CAP: usize = 2000;

/// Bytes reserved for the synthesis prompt template around the pool.
pub const SYNTHESIS_PROMPT_OVERHEAD: usize = 2048;

/// Floor a price-bearing record may be truncated to before the pool
/// degrades to summary form, in characters.
const MIN_RECORD_CHARS: usize = 400;

/// Characters kept on each side of a price match in summary form.
const SNIPPET_RADIUS: usize = 80;

static PRICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Currency symbol followed by digits
        r"[$€£]\s?\d",
        // ISO currency code followed by digits
        r"\b(USD|EUR|GBP)\s?\d",
        // Digit group near a price word
        r"(?i)\b(pric\w*|msrp|cost\w*)\b[^\n]{0,40}?\d",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// Price classifier shared by the curator and the executor's price-intent
/// detection. Latin-currency only.
pub fn is_price_bearing(text: &str) -> bool {
    PRICE_PATTERNS.iter().any(|p| p.is_match(text))
}

/// The per-mission intel pool.
pub struct IntelCurator {
    records: Vec<IntelRecord>,
    budget_bytes: usize,
}

impl IntelCurator {
    /// Budget derives from the gateway ceiling minus the prompt overhead.
    pub fn new(max_payload_bytes: usize) -> Self {
        Self::with_budget(max_payload_bytes.saturating_sub(SYNTHESIS_PROMPT_OVERHEAD))
    }

    pub fn with_budget(budget_bytes: usize) -> Self {
        Self {
            records: Vec::new(),
            budget_bytes,
        }
    }

    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append one evidence record, capping its content and classifying it.
    pub fn append(&mut self, mut record: IntelRecord) {
        record.content = truncate_chars(&record.content, RECORD_CONTENT_CAP);
        record.price_bearing = is_price_bearing(&record.content);
        debug!(
            tool = %record.source_tool,
            origin = record.origin.as_str(),
            price_bearing = record.price_bearing,
            chars = record.content.chars().count(),
            "intel record appended"
        );
        self.records.push(record);
    }

    pub fn has_price_evidence(&self) -> bool {
        self.records.iter().any(|r| r.price_bearing)
    }

    /// Render the pool for the synthesis prompt, guaranteed to fit the
    /// configured budget. Deterministic given the pool and budget.
    pub fn materialize(&self) -> String {
        self.materialize_with_budget(self.budget_bytes)
    }

    /// Tightened re-materialization after a `PayloadTooLarge` synthesis
    /// attempt: half the budget, jumping straight to summary form when any
    /// price data exists.
    pub fn materialize_tight(&self) -> String {
        let tight = self.budget_bytes / 2;
        if self.has_price_evidence() {
            self.price_summary(tight)
        } else {
            self.materialize_with_budget(tight)
        }
    }

    fn materialize_with_budget(&self, budget: usize) -> String {
        let full = render(&self.records);
        if full.len() <= budget {
            return full;
        }

        if self.has_price_evidence() {
            self.materialize_price_priority(budget)
        } else {
            // No price data: drop general records from the tail until the
            // rendering fits.
            let mut kept: Vec<IntelRecord> = self.records.clone();
            while !kept.is_empty() {
                kept.pop();
                let rendered = render(&kept);
                if rendered.len() <= budget {
                    debug!(
                        kept = kept.len(),
                        dropped = self.records.len() - kept.len(),
                        "pool over budget, dropped tail records"
                    );
                    return rendered;
                }
            }
            String::new()
        }
    }

    /// Keep every price-bearing record, truncating the longest first, and
    /// only then any general records; degrade to summary form if even the
    /// price records at minimum length cannot fit.
    fn materialize_price_priority(&self, budget: usize) -> String {
        let mut price: Vec<IntelRecord> = self
            .records
            .iter()
            .filter(|r| r.price_bearing)
            .cloned()
            .collect();

        // Shrink the longest price records step by step until the price
        // set fits or everything sits at the floor.
        loop {
            if render(&price).len() <= budget {
                break;
            }
            let Some(longest) = price
                .iter_mut()
                .filter(|r| r.content.chars().count() > MIN_RECORD_CHARS)
                .max_by_key(|r| r.content.chars().count())
            else {
                // All price records at minimum length and still over budget
                return self.price_summary(budget);
            };
            let target = (longest.content.chars().count() / 2).max(MIN_RECORD_CHARS);
            longest.content = truncate_chars(&longest.content, target);
        }

        // Price records fit; add general records back (append order) while
        // they keep fitting.
        let mut kept = price;
        for general in self.records.iter().filter(|r| !r.price_bearing) {
            kept.push(general.clone());
            if render(&kept).len() > budget {
                kept.pop();
            }
        }
        render(&kept)
    }

    /// Distilled `(source, snippet_around_price)` list for the worst case.
    fn price_summary(&self, budget: usize) -> String {
        let mut out = String::from("PRICE SUMMARY (extracted):\n");
        for record in self.records.iter().filter(|r| r.price_bearing) {
            let snippet = snippet_around_price(&record.content);
            let line = format!("- {}: {}\n", record.origin, snippet);
            if out.len() + line.len() > budget {
                break;
            }
            out.push_str(&line);
        }
        // Degenerate budgets smaller than the header still honor the cap
        while out.len() > budget {
            out.pop();
        }
        out
    }
}

fn render(records: &[IntelRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "[{} | {}]\n{}\n\n",
            record.source_tool, record.origin, record.content
        ));
    }
    out
}

/// Window of text around the first price match.
fn snippet_around_price(content: &str) -> String {
    for pattern in PRICE_PATTERNS.iter() {
        if let Some(found) = pattern.find(content) {
            let chars: Vec<(usize, char)> = content.char_indices().collect();
            let match_char_pos = chars
                .iter()
                .position(|(i, _)| *i >= found.start())
                .unwrap_or(0);
            let start = match_char_pos.saturating_sub(SNIPPET_RADIUS);
            let end = (match_char_pos + SNIPPET_RADIUS).min(chars.len());
            let snippet: String = chars[start..end].iter().map(|(_, c)| *c).collect();
            return snippet.split_whitespace().collect::<Vec<_>>().join(" ");
        }
    }
    truncate_chars(content, SNIPPET_RADIUS)
}
