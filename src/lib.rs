// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod analyze;
pub mod change_detector;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod monitor;
pub mod notify;
pub mod schedule;
pub mod source;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::change_detector::{ChangeDetector, ChangeOutcome};
pub use crate::monitor::{Monitor, MonitorSettings, RunReport, SourceReport, SourceState};
pub use crate::notify::{NotificationMessage, Notifier, NotifierMux};
pub use crate::source::{Source, SourceKind};

/// Subdirectory of `--output-dir` holding fingerprints, snapshots and change logs.
pub const STATE_DIR: &str = "change_monitor";
