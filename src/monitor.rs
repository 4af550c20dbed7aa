// src/monitor.rs
//! One monitoring run over the configured sources.
//!
//! Sources are processed strictly in catalog order, one at a time. Each one
//! moves `Pending -> (Skipped | Running) -> (Completed | Failed)`; a failed
//! source produces exactly one error notification and the run goes on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::analyze::RelevanceAnalyzer;
use crate::change_detector::{ChangeDetector, ChangeOutcome};
use crate::config::Catalog;
use crate::discovery::{
    discover, listing_date_range, week_publication_dates, DiscoveryContext, DATE_FMT,
};
use crate::error::SourceFailure;
use crate::fetch::ContentFetcher;
use crate::notify::{NotificationMessage, NotifierMux};
use crate::schedule::weekday_name;
use crate::source::{DiscoveryResult, Source, SourceKind};

/// URLs listed in notification metadata.
const METADATA_URLS: usize = 3;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "monitor_sources_processed_total",
            "Sources that ran (completed or failed)."
        );
        describe_counter!(
            "monitor_sources_skipped_total",
            "Sources not scheduled for the run's day."
        );
        describe_counter!("monitor_sources_failed_total", "Sources that ended Failed.");
        describe_counter!(
            "monitor_changes_detected_total",
            "Change-detected outcomes."
        );
        describe_counter!(
            "monitor_fetch_failures_total",
            "URLs that could not be fetched."
        );
        describe_counter!(
            "notify_channel_errors_total",
            "Failed channel deliveries, by channel."
        );
        describe_gauge!("monitor_run_last_ts", "Unix ts when the last run finished.");
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Pending,
    Skipped,
    Running,
    Completed,
    Failed { cause: String },
}

impl SourceState {
    pub fn can_advance_to(&self, next: &SourceState) -> bool {
        matches!(
            (self, next),
            (SourceState::Pending, SourceState::Skipped)
                | (SourceState::Pending, SourceState::Running)
                | (SourceState::Running, SourceState::Completed)
                | (SourceState::Running, SourceState::Failed { .. })
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub name: String,
    pub state: SourceState,
    /// Set for change-detecting sources that ran.
    pub outcome: Option<ChangeOutcome>,
}

impl SourceReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: SourceState::Pending,
            outcome: None,
        }
    }

    fn advance(&mut self, next: SourceState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(source = %self.name, from = ?self.state, to = ?next, "state");
        self.state = next;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub date: NaiveDate,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// Sources that ran, whether they completed or failed.
    pub fn processed(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.state, SourceState::Completed | SourceState::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| s.state == SourceState::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s.state, SourceState::Failed { .. }))
    }

    pub fn get(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.name == name)
    }

    fn count(&self, f: impl Fn(&SourceReport) -> bool) -> usize {
        self.sources.iter().filter(|s| f(s)).count()
    }

    fn names_with(&self, f: impl Fn(&ChangeOutcome) -> bool) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|s| s.outcome.as_ref().is_some_and(&f))
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Summary of the change-detecting sources; `None` if none of them ran.
    pub fn change_summary(&self) -> Option<String> {
        let checked = self.count(|s| s.outcome.is_some());
        if checked == 0 {
            return None;
        }
        let changed = self.names_with(|o| matches!(o, ChangeOutcome::Changed { .. }));
        let first = self.names_with(|o| *o == ChangeOutcome::FirstObservation);
        let unchanged = self.names_with(|o| *o == ChangeOutcome::Unchanged);
        let errors = self.names_with(|o| matches!(o, ChangeOutcome::FetchError { .. }));

        let bullets = |names: &[&str]| -> String {
            names.iter().map(|n| format!("   • {n}\n")).collect()
        };

        let mut out = String::from("📊 MONITORING SUMMARY\n\n");
        out.push_str(&format!("📅 Date: {}\n", self.date.format(DATE_FMT)));
        out.push_str(&format!("🔗 Sources checked for changes: {checked}\n\n"));
        if changed.is_empty() {
            out.push_str("✅ No changes detected\n\n");
        } else {
            out.push_str(&format!("🚨 Changes detected: {}\n", changed.len()));
            out.push_str(&bullets(&changed));
            out.push('\n');
        }
        out.push_str(&format!("📄 Unchanged: {}\n", unchanged.len()));
        if !first.is_empty() {
            out.push_str(&format!("ℹ️ First observation: {}\n", first.len()));
            out.push_str(&bullets(&first));
        }
        if !errors.is_empty() {
            out.push_str(&format!("❌ Errors: {}\n", errors.len()));
            out.push_str(&bullets(&errors));
        }
        Some(out.trim_end().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub subject_prefix: String,
    /// Pause after every remote request and between sources.
    pub request_delay: Duration,
    pub run_summary: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            subject_prefix: crate::config::catalog::DEFAULT_SUBJECT_PREFIX.to_string(),
            request_delay: crate::config::catalog::DEFAULT_REQUEST_DELAY,
            run_summary: true,
        }
    }
}

impl MonitorSettings {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            subject_prefix: catalog.subject_prefix.clone(),
            request_delay: catalog.request_delay,
            run_summary: catalog.run_summary,
        }
    }
}

pub struct Monitor {
    sources: Vec<Source>,
    fetcher: Arc<dyn ContentFetcher>,
    analyzer: Arc<dyn RelevanceAnalyzer>,
    detector: ChangeDetector,
    notifier: NotifierMux,
    settings: MonitorSettings,
}

impl Monitor {
    pub fn new(
        sources: Vec<Source>,
        fetcher: Arc<dyn ContentFetcher>,
        analyzer: Arc<dyn RelevanceAnalyzer>,
        detector: ChangeDetector,
        notifier: NotifierMux,
    ) -> Self {
        Self {
            sources,
            fetcher,
            analyzer,
            detector,
            notifier,
            settings: MonitorSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub async fn run(&self, today: NaiveDate) -> RunReport {
        ensure_metrics_described();
        tracing::info!(
            date = %today,
            weekday = weekday_name(today),
            sources = self.sources.len(),
            "starting monitoring run"
        );

        let mut reports = Vec::with_capacity(self.sources.len());
        for (i, source) in self.sources.iter().enumerate() {
            let report = self.process_source(source, today).await;
            let ran = report.state != SourceState::Skipped;
            reports.push(report);
            if ran && i + 1 < self.sources.len() {
                self.pause().await;
            }
        }

        let report = RunReport {
            date: today,
            sources: reports,
        };
        if self.settings.run_summary {
            if let Some(body) = report.change_summary() {
                let msg = NotificationMessage::new(
                    format!("{}: run summary", self.settings.subject_prefix),
                    body,
                );
                self.notifier.dispatch(&msg).await;
            }
        }

        gauge!("monitor_run_last_ts").set(Utc::now().timestamp() as f64);
        tracing::info!(
            processed = report.processed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "monitoring run complete"
        );
        report
    }

    /// Drive one source to a terminal state, dispatching its notification.
    pub async fn process_source(&self, source: &Source, today: NaiveDate) -> SourceReport {
        let mut report = SourceReport::new(&source.name);

        let rule = source.schedule_rule();
        if !rule.allows_on(today) {
            tracing::info!(source = %source.name, rule = rule.describe(), "not scheduled today, skipping");
            counter!("monitor_sources_skipped_total").increment(1);
            report.advance(SourceState::Skipped);
            return report;
        }

        report.advance(SourceState::Running);
        tracing::info!(source = %source.name, kind = source.kind.label(), "processing source");
        counter!("monitor_sources_processed_total").increment(1);

        match self.execute(source, today, &mut report.outcome).await {
            Ok(()) => {
                tracing::info!(source = %source.name, "source completed");
                report.advance(SourceState::Completed);
            }
            Err(failure) => {
                tracing::error!(source = %source.name, error = %failure, "source failed");
                counter!("monitor_sources_failed_total").increment(1);
                if source.detect_changes && report.outcome.is_none() {
                    report.outcome = Some(ChangeOutcome::FetchError {
                        cause: failure.to_string(),
                    });
                }
                self.report_failure(source, &failure).await;
                report.advance(SourceState::Failed {
                    cause: failure.to_string(),
                });
            }
        }
        report
    }

    async fn execute(
        &self,
        source: &Source,
        today: NaiveDate,
        outcome: &mut Option<ChangeOutcome>,
    ) -> Result<(), SourceFailure> {
        let ctx = DiscoveryContext {
            today,
            fetcher: self.fetcher.as_ref(),
            request_delay: self.settings.request_delay,
        };
        let discovered = discover(source, &ctx).await?;
        tracing::info!(source = %source.name, urls = discovered.len(), "discovery done");

        let content = self.collect(source, &discovered).await?;
        tracing::info!(source = %source.name, chars = content.chars().count(), "content extracted");

        let mut sections = Vec::new();
        if source.detect_changes {
            let target = detection_target(source, &discovered);
            let detected = self
                .detector
                .detect_at(&source.name, &target, &content, Local::now())?;
            sections.push(outcome_section(&source.name, &target, &detected));
            *outcome = Some(detected);
        }

        let unchanged = *outcome == Some(ChangeOutcome::Unchanged);
        if source.analyze && !unchanged {
            tracing::info!(source = %source.name, analyzer = self.analyzer.name(), "running relevance analysis");
            sections.push(self.analyzer.analyze(&source.name, &content).await?);
        }

        if sections.is_empty() {
            sections.push(format!(
                "Retrieved {} characters from {} URL(s).",
                content.chars().count(),
                discovered.len()
            ));
        }

        let mut msg = NotificationMessage::new(
            format!("{}: {}", self.settings.subject_prefix, source.name),
            sections.join("\n\n"),
        );
        msg.metadata = source_metadata(source, today, &discovered, outcome.as_ref());
        let delivery = self.notifier.dispatch(&msg).await;
        if delivery.nothing_delivered() {
            tracing::warn!(source = %source.name, "notification reached no channel");
        }
        Ok(())
    }

    /// Fetch every discovered URL in order and join the non-empty texts.
    async fn collect(
        &self,
        source: &Source,
        discovered: &DiscoveryResult,
    ) -> Result<String, SourceFailure> {
        let mut texts = Vec::with_capacity(discovered.len());
        let (mut failed, mut empty) = (0usize, 0usize);

        for url in discovered.urls() {
            match self.fetcher.fetch_text(url, source.verify_tls).await {
                Ok(text) if !text.trim().is_empty() => texts.push(text),
                Ok(_) => {
                    empty += 1;
                    tracing::warn!(source = %source.name, %url, "page has no text");
                }
                Err(e) => {
                    failed += 1;
                    counter!("monitor_fetch_failures_total").increment(1);
                    tracing::warn!(source = %source.name, %url, error = %e, "fetch failed");
                }
            }
            self.pause().await;
        }

        if texts.is_empty() {
            return Err(SourceFailure::NoContent {
                source_name: source.name.clone(),
                failed,
                empty,
            });
        }
        Ok(texts.join("\n\n"))
    }

    async fn report_failure(&self, source: &Source, failure: &SourceFailure) {
        let msg = NotificationMessage::new(
            format!("{}: Error {}", self.settings.subject_prefix, source.name),
            format!("Error processing {}: {failure}", source.name),
        );
        let delivery = self.notifier.dispatch(&msg).await;
        if delivery.nothing_delivered() {
            tracing::error!(source = %source.name, "error notification could not be delivered on any channel");
        }
    }

    async fn pause(&self) {
        if !self.settings.request_delay.is_zero() {
            tokio::time::sleep(self.settings.request_delay).await;
        }
    }
}

/// What the change log records: the URL for single-page sources, the
/// source name otherwise.
fn detection_target(source: &Source, discovered: &DiscoveryResult) -> String {
    match discovered.urls() {
        [only] => only.clone(),
        _ => source.name.clone(),
    }
}

fn outcome_section(name: &str, target: &str, outcome: &ChangeOutcome) -> String {
    match outcome {
        ChangeOutcome::FirstObservation => format!(
            "ℹ️ FIRST OBSERVATION\n\n📄 {name}\n{target}\n\n\
             ⚠️ There is no earlier observation to compare against.\n\n\
             The current content was stored as the reference for future comparisons."
        ),
        ChangeOutcome::Unchanged => format!("✅ No changes detected for {name}."),
        ChangeOutcome::Changed { diff: Some(diff) } => {
            format!("🚨 CHANGE DETECTED\n\n📄 {name}\n{target}\n\n{diff}")
        }
        ChangeOutcome::Changed { diff: None } => format!(
            "🚨 CHANGE DETECTED\n\n📄 {name}\n{target}\n\n(diff unavailable: no previous snapshot)"
        ),
        ChangeOutcome::FetchError { cause } => format!("❌ {name}: {cause}"),
    }
}

/// Ordered metadata attached to a source's content notification.
pub fn source_metadata(
    source: &Source,
    today: NaiveDate,
    discovered: &DiscoveryResult,
    outcome: Option<&ChangeOutcome>,
) -> Vec<(String, String)> {
    let mut meta = vec![("source".to_string(), source.name.clone())];
    let mut push = |k: &str, v: String| meta.push((k.to_string(), v));

    match &source.kind {
        SourceKind::LatestPage { year, .. } => {
            push("year", year.unwrap_or_else(|| today.year()).to_string());
            if let Some(page) = discovered.latest_page() {
                push("page", page.to_string());
            }
        }
        SourceKind::PaginatedListing { lookback_days, .. } => {
            let (from, to) = listing_date_range(today, *lookback_days);
            push("date_start", from.format(DATE_FMT).to_string());
            push("date_end", to.format(DATE_FMT).to_string());
            push("days_back", lookback_days.to_string());
        }
        SourceKind::WeeklyPattern { .. } => {
            let dates = week_publication_dates(today).map(|d| d.format(DATE_FMT).to_string());
            push("dates_scraped", dates.join(", "));
            push("week_dates", format!("{} to {}", dates[0], dates[2]));
        }
        SourceKind::StaticPage { url } => push("url", url.clone()),
    }

    push("date", today.format(DATE_FMT).to_string());
    push("weekday", weekday_name(today).to_string());
    push(
        "urls",
        discovered
            .urls()
            .iter()
            .take(METADATA_URLS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
    );
    if let Some(o) = outcome {
        push("outcome", o.label().to_string());
    }
    meta
}
