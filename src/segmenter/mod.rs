//! Language-aware code segmentation.
//!
//! This module splits a submission into an ordered sequence of bounded
//! chunks. Python is chunked along its module-level definitions, JavaScript
//! along declaration patterns, and everything else (or anything those
//! strategies cannot handle) by accumulating lines up to the size limit.
//! Segmentation never fails on input: the line strategy always produces
//! at least one chunk.

mod javascript;
mod python;
mod sanitize;

pub use sanitize::sanitize;

use crate::error::SegmentationError;
use crate::models::{Chunk, Language};
use tracing::{debug, info, warn};

/// Configuration for segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// Maximum chunk length in characters.
    pub max_chunk_size: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 8000,
        }
    }
}

impl From<&crate::config::SegmenterSettings> for SegmenterConfig {
    fn from(settings: &crate::config::SegmenterSettings) -> Self {
        Self {
            max_chunk_size: settings.max_chunk_size,
        }
    }
}

/// Splits source text into chunks.
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    /// Create a segmenter, rejecting a zero chunk size.
    pub fn new(config: SegmenterConfig) -> Result<Self, SegmentationError> {
        if config.max_chunk_size == 0 {
            return Err(SegmentationError::InvalidChunkSize(config.max_chunk_size));
        }
        Ok(Self { config })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.config.max_chunk_size
    }

    /// Segment `code` into chunks. Output is deterministic for a given input and limit.
    pub fn segment(&self, code: &str, language: Language) -> Vec<Chunk> {
        info!(
            "Segmenting {} code of {} characters",
            language,
            code.chars().count()
        );

        let sanitized = sanitize(code, language);

        let chunks = match language {
            Language::Python => self.segment_python(&sanitized),
            Language::Javascript => javascript::chunk_declarations(&sanitized).unwrap_or_else(|| {
                debug!("No JavaScript declarations matched, using line chunking");
                self.chunk_lines(&sanitized, language)
            }),
            Language::Other => self.chunk_lines(&sanitized, language),
        };

        debug!("Produced {} chunks", chunks.len());
        chunks
    }

    fn segment_python(&self, code: &str) -> Vec<Chunk> {
        match python::extract_definitions(code) {
            Some(definitions) if !definitions.is_empty() => {
                python::pack_definitions(definitions, self.config.max_chunk_size)
            }
            Some(_) => {
                debug!("No Python definitions found, using line chunking");
                self.chunk_lines(code, Language::Python)
            }
            None => {
                warn!("Python parsing failed. Falling back to line chunking.");
                self.chunk_lines(code, Language::Python)
            }
        }
    }

    /// Accumulate lines until the next one would exceed the limit.
    ///
    /// Always returns at least one chunk; empty input gives one empty chunk.
    pub fn chunk_lines(&self, code: &str, language: Language) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_size = 0usize;

        for line in code.split('\n') {
            // +1 for the joining newline
            let line_size = line.chars().count() + 1;

            if !current.is_empty() && current_size + line_size > self.config.max_chunk_size + 1 {
                chunks.push(Chunk::new(current.join("\n"), language, None));
                current.clear();
                current_size = 0;
            }

            current.push(line);
            current_size += line_size;
        }

        if !current.is_empty() {
            chunks.push(Chunk::new(current.join("\n"), language, None));
        }

        chunks
    }
}
