// src/notify/telegram.rs
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;

use super::chunk::{chunk_for_channel, CHANNEL_LIMIT, CHUNK_BUDGET};
use super::{NotificationMessage, Notifier};
use crate::error::DispatchError;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const CHUNK_DELAY: Duration = Duration::from_millis(500);

/// Bot API `sendMessage`. Long messages go out as numbered parts.
#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    api_base: String,
    client: Client,
    chunk_delay: Duration,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            token,
            chat_id,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            chunk_delay: CHUNK_DELAY,
        }
    }

    /// Point at a different API host (tests, self-hosted bot API).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    /// Plain text, no parse mode, so nothing needs escaping.
    pub fn compose(msg: &NotificationMessage) -> String {
        let mut text = format!("🔔 {}\n\n{}", msg.subject, msg.body);
        if let Some(meta) = msg.metadata_inline() {
            text.push_str(&format!("\n\n📋 Metadata: {meta}"));
        }
        text
    }

    async fn post_chunk(&self, text: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({ "chat_id": self.chat_id, "text": text });
        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .context("telegram post")?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("telegram answered {status}: {detail}");
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, msg: &NotificationMessage) -> Result<(), DispatchError> {
        let chunks = chunk_for_channel(&Self::compose(msg), CHANNEL_LIMIT, CHUNK_BUDGET);
        let total = chunks.len();
        tracing::info!(chunks = total, "sending telegram message(s)");

        let mut failed = 0usize;
        for (i, chunk) in chunks.iter().enumerate() {
            match self.post_chunk(chunk).await {
                Ok(()) => tracing::debug!(chunk = i + 1, total, "telegram chunk sent"),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(chunk = i + 1, total, error = %format!("{e:#}"), "telegram chunk failed");
                }
            }
            if i + 1 < total && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        if failed > 0 {
            return Err(DispatchError::Chunks {
                channel: "telegram",
                failed,
                total,
            });
        }
        Ok(())
    }
}
