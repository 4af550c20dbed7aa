// tests/metrics_monitor.rs
#![cfg(feature = "strict-metrics")]
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusBuilder;
use tempfile::tempdir;

use bulletin_monitor::analyze::RelevanceAnalyzer;
use bulletin_monitor::error::{AnalysisError, FetchError};
use bulletin_monitor::fetch::ContentFetcher;
use bulletin_monitor::notify::ConsoleNotifier;
use bulletin_monitor::store::FingerprintStore;
use bulletin_monitor::{ChangeDetector, Monitor, MonitorSettings, NotifierMux, Source};

struct OnePage;

#[async_trait]
impl ContentFetcher for OnePage {
    async fn fetch_text(&self, url: &str, _verify_tls: bool) -> Result<String, FetchError> {
        if url.ends_with("/ok") {
            Ok("contenido".into())
        } else {
            Err(FetchError::Status {
                url: url.into(),
                status: 404,
            })
        }
    }
    async fn fetch_raw(&self, url: &str, verify_tls: bool) -> Result<String, FetchError> {
        self.fetch_text(url, verify_tls).await
    }
    async fn page_exists(&self, _url: &str, _marker: &str, _verify_tls: bool) -> bool {
        false
    }
}

struct Nop;

#[async_trait]
impl RelevanceAnalyzer for Nop {
    fn name(&self) -> &'static str {
        "nop"
    }
    async fn analyze(&self, _source_name: &str, _text: &str) -> Result<String, AnalysisError> {
        Ok("nada".into())
    }
}

#[tokio::test]
async fn run_counters_are_exposed() {
    // Install a local recorder for the test
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let dir = tempdir().unwrap();
    let sources = vec![
        Source::static_page("ok", "https://x/ok"),
        Source::static_page("down", "https://x/down"),
        Source::weekly("bop", vec!["https://x/{date}".into()]),
    ];
    let monitor = Monitor::new(
        sources,
        Arc::new(OnePage),
        Arc::new(Nop),
        ChangeDetector::new(FingerprintStore::new(dir.path())),
        NotifierMux::new().with(ConsoleNotifier::new()),
    )
    .with_settings(MonitorSettings {
        subject_prefix: "M".into(),
        request_delay: Duration::ZERO,
        run_summary: false,
    });

    // Thursday: the weekly source is skipped
    let report = monitor
        .run(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap())
        .await;
    assert_eq!((report.processed(), report.skipped()), (2, 1));

    // Scrape metrics text and check series presence by substring
    let out = handle.render();
    for needle in [
        "monitor_sources_processed_total 2",
        "monitor_sources_skipped_total 1",
        "monitor_sources_failed_total 1",
        "monitor_fetch_failures_total 1",
        "monitor_run_last_ts",
    ] {
        assert!(out.contains(needle), "missing '{needle}'\n{out}");
    }
}
