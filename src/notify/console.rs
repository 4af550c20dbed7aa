// src/notify/console.rs
use std::io::Write;

use async_trait::async_trait;

use super::{NotificationMessage, Notifier};
use crate::error::DispatchError;

const RULE_WIDTH: usize = 80;

/// Prints notifications to stdout between rules.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }

    pub fn render(msg: &NotificationMessage) -> String {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);
        let mut out = format!("\n{heavy}\n📢 {}\n{heavy}\n", msg.subject);
        if !msg.metadata.is_empty() {
            out.push_str("Metadata:\n");
            for (k, v) in &msg.metadata {
                out.push_str(&format!("  {k}: {v}\n"));
            }
            out.push_str(&light);
            out.push('\n');
        }
        out.push_str(&msg.body);
        out.push_str(&format!("\n{heavy}\n"));
        out
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, msg: &NotificationMessage) -> Result<(), DispatchError> {
        let text = Self::render(msg);
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| DispatchError::Transport {
                channel: "console",
                message: e.to_string(),
            })
    }
}
