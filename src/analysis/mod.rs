//! Chunk analysis.
//!
//! Prompt construction, the per-chunk analyzer and the merge of
//! per-chunk outcomes into report sections.

pub mod aggregator;
pub mod analyzer;
pub mod prompts;

pub use aggregator::{failed_outcomes, merge_kind};
pub use analyzer::ChunkAnalyzer;
