// src/notify/mod.rs
//! Notification fan-out.
//!
//! Every channel implements [`Notifier`]. [`NotifierMux`] sends one message to
//! each enabled channel in order; a failing channel is logged and never stops
//! the channels after it.

pub mod chunk;
pub mod console;
pub mod email;
pub mod telegram;

use async_trait::async_trait;
use metrics::counter;

use crate::config::env::MonitorEnv;
use crate::error::DispatchError;

pub use console::ConsoleNotifier;
pub use email::EmailNotifier;
pub use telegram::TelegramNotifier;

/// Subject, free-form body and ordered metadata. Built once per source
/// outcome and consumed by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
    pub metadata: Vec<(String, String)>,
}

impl NotificationMessage {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            metadata: Vec::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// `key: value` pairs on one line, `None` without metadata.
    pub fn metadata_inline(&self) -> Option<String> {
        if self.metadata.is_empty() {
            return None;
        }
        Some(
            self.metadata
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(" | "),
        )
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Disabled channels are skipped without an error.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn send(&self, msg: &NotificationMessage) -> Result<(), DispatchError>;
}

/// Per-channel result of one dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

impl DispatchReport {
    /// True when no channel delivered the message.
    pub fn nothing_delivered(&self) -> bool {
        self.delivered.is_empty()
    }
}

#[derive(Default)]
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: impl Notifier + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    pub fn push(&mut self, channel: Box<dyn Notifier>) {
        self.channels.push(channel);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Console, Telegram and (when configured) email.
    pub fn from_env(env: &MonitorEnv) -> Self {
        Self::new()
            .with(ConsoleNotifier::new())
            .with(TelegramNotifier::new(
                env.telegram_token.clone(),
                env.telegram_chat_id.clone(),
            ))
            .with(EmailNotifier::from_config(env.email.as_ref()))
    }

    /// Whatever can be built without a valid configuration: console plus
    /// Telegram when both chat credentials are present.
    pub fn minimal(telegram: Option<(String, String)>) -> Self {
        let mux = Self::new().with(ConsoleNotifier::new());
        match telegram {
            Some((token, chat)) => mux.with(TelegramNotifier::new(token, chat)),
            None => {
                tracing::warn!("telegram credentials missing; only console output available");
                mux
            }
        }
    }

    /// Best-effort fan-out. Never fails; see the report for per-channel results.
    pub async fn dispatch(&self, msg: &NotificationMessage) -> DispatchReport {
        let mut report = DispatchReport::default();
        for ch in &self.channels {
            if !ch.is_enabled() {
                tracing::debug!(channel = ch.name(), "channel disabled, skipping");
                report.skipped.push(ch.name());
                continue;
            }
            match ch.send(msg).await {
                Ok(()) => {
                    tracing::debug!(channel = ch.name(), subject = %msg.subject, "delivered");
                    report.delivered.push(ch.name());
                }
                Err(e) => {
                    tracing::warn!(channel = ch.name(), error = %e, "notification failed");
                    counter!("notify_channel_errors_total", "channel" => ch.name()).increment(1);
                    report.failed.push((ch.name(), e.to_string()));
                }
            }
        }
        report
    }
}
