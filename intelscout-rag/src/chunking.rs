//! Deterministic text segmentation for ingestion
//!
//! Pure sliding-window splitter: the same input always yields the same
//! chunks, so re-ingestion is idempotent when chunk IDs are derived from
//! `(title, ordinal)`.

use serde::{Deserialize, Serialize};

/// Configuration for the sliding-window chunker, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
        }
    }
}

/// One chunk of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Position in the chunk sequence, starting at 0
    pub ordinal: usize,
}

/// Split `text` into overlapping character windows covering the input.
///
/// The window advances by `chunk_size - overlap` characters each step (at
/// least one, so degenerate configs still terminate). Splits always land on
/// char boundaries.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    if text.is_empty() || config.chunk_size == 0 {
        return Vec::new();
    }

    let step = config.chunk_size.saturating_sub(config.overlap).max(1);
    let char_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = char_offsets.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut ordinal = 0usize;

    while start < total_chars {
        let end = (start + config.chunk_size).min(total_chars);
        let byte_start = char_offsets[start];
        let byte_end = if end == total_chars {
            text.len()
        } else {
            char_offsets[end]
        };
        chunks.push(Chunk {
            text: text[byte_start..byte_end].to_string(),
            ordinal,
        });
        ordinal += 1;
        if end == total_chars {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_single_chunk_when_large_enough() {
        let text = "a short report";
        let chunks = chunk_text(text, &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].ordinal, 0);
    }

    #[test]
    fn test_chunking_is_idempotent_for_fitting_chunks() {
        // Re-chunking any produced chunk yields exactly one chunk.
        let text = "word ".repeat(500);
        let config = ChunkingConfig {
            chunk_size: 300,
            overlap: 30,
        };
        for chunk in chunk_text(&text, &config) {
            let rechunked = chunk_text(&chunk.text, &config);
            assert_eq!(rechunked.len(), 1);
            assert_eq!(rechunked[0].text, chunk.text);
        }
    }

    #[test]
    fn test_overlap_and_coverage() {
        let text: String = ('a'..='z').cycle().take(250).collect();
        let config = ChunkingConfig {
            chunk_size: 100,
            overlap: 20,
        };
        let chunks = chunk_text(&text, &config);
        assert!(chunks.len() > 1);

        // Consecutive chunks share the configured overlap
        let first = &chunks[0].text;
        let second = &chunks[1].text;
        assert_eq!(&first[first.len() - 20..], &second[..20]);

        // Concatenating with overlap removed reconstructs the input
        let mut rebuilt = chunks[0].text.clone();
        for chunk in &chunks[1..] {
            let tail: String = chunk.text.chars().skip(config.overlap).collect();
            rebuilt.push_str(&tail);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_determinism() {
        let text = "deterministic splitting ".repeat(100);
        let config = ChunkingConfig {
            chunk_size: 128,
            overlap: 16,
        };
        let a = chunk_text(&text, &config);
        let b = chunk_text(&text, &config);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.ordinal, y.ordinal);
        }
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "über die Straße — prix en €uros, ".repeat(40);
        let config = ChunkingConfig {
            chunk_size: 50,
            overlap: 10,
        };
        // Must not panic on char boundaries; every chunk is valid UTF-8 by
        // construction, so just traverse them.
        let chunks = chunk_text(&text, &config);
        assert!(!chunks.is_empty());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert!(chunk.text.chars().count() <= 50);
        }
    }

    #[test]
    fn test_degenerate_overlap_terminates() {
        let config = ChunkingConfig {
            chunk_size: 10,
            overlap: 10,
        };
        let chunks = chunk_text(&"x".repeat(100), &config);
        // Step clamps to 1; chunking still terminates and covers the input.
        assert!(!chunks.is_empty());
    }
}
