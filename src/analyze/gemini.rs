// src/analyze/gemini.rs
//! Google Gemini `generateContent` over plain HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_prompt, RelevanceAnalyzer};
use crate::error::AnalysisError;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_MODEL: &str = "gemini-2.5-flash-lite";

pub struct GeminiAnalyzer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
    topics: Vec<String>,
}

impl GeminiAnalyzer {
    pub fn new(api_key: String, topics: Vec<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            model: GEMINI_MODEL.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            topics,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}
#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}
#[derive(Serialize)]
struct Req<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize, Default)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}
#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}
#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}
#[derive(Deserialize, Default)]
struct RespPart {
    #[serde(default)]
    text: Option<String>,
}

/// Text of the first candidate, parts concatenated. `None` when blank.
fn response_text(body: &str) -> Result<Option<String>, AnalysisError> {
    let resp: Resp = serde_json::from_str(body)
        .map_err(|e| AnalysisError::Request(format!("invalid response body: {e}")))?;
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim().to_string();
    Ok((!text.is_empty()).then_some(text))
}

#[async_trait]
impl RelevanceAnalyzer for GeminiAnalyzer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn analyze(&self, source_name: &str, text: &str) -> Result<String, AnalysisError> {
        let prompt = build_prompt(source_name, &self.topics, text);
        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
        };
        tracing::info!(source = source_name, chars = text.chars().count(), model = %self.model, "analyzing content");

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| AnalysisError::Request(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AnalysisError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        response_text(&body)?.ok_or(AnalysisError::EmptyResponse)
    }
}
