// src/analyze/mod.rs
//! Relevance analysis: turns a source's combined text into a short,
//! human-readable report of the public-employment items it mentions.

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;

use crate::error::AnalysisError;

pub use gemini::GeminiAnalyzer;
pub use prompt::build_prompt;

#[async_trait]
pub trait RelevanceAnalyzer: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Free-form report for `text`, fetched from `source_name`.
    async fn analyze(&self, source_name: &str, text: &str) -> Result<String, AnalysisError>;
}
