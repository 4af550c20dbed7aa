//! Bulletin monitor: one run over every configured source, then exit.
//!
//! Reads credentials from the environment (and `.env`), the source catalog
//! from `<output-dir>/sources.toml` when present, and keeps change-detection
//! state under `<output-dir>/change_monitor`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bulletin_monitor::analyze::GeminiAnalyzer;
use bulletin_monitor::config::catalog::DEFAULT_SUBJECT_PREFIX;
use bulletin_monitor::config::{load_catalog, MonitorEnv};
use bulletin_monitor::fetch::HttpFetcher;
use bulletin_monitor::store::FingerprintStore;
use bulletin_monitor::{
    ChangeDetector, Monitor, MonitorSettings, NotificationMessage, NotifierMux, STATE_DIR,
};

#[derive(Debug, Parser)]
#[command(version, about = "Monitor public bulletins and employment pages")]
struct Cli {
    /// Root directory for persisted state and the optional sources.toml.
    #[arg(long, value_name = "PATH")]
    output_dir: PathBuf,
}

/// Logs go to stderr so console notifications own stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Everything that can fail happens here, before any channel exists.
fn build_monitor(cli: &Cli) -> anyhow::Result<Monitor> {
    let env = MonitorEnv::from_env().context("loading environment")?;
    let catalog = load_catalog(&cli.output_dir).context("loading source catalog")?;
    let fetcher = HttpFetcher::new().context("building HTTP client")?;

    let state_dir = cli.output_dir.join(STATE_DIR);
    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("creating state directory {}", state_dir.display()))?;
    let store = FingerprintStore::new(state_dir).with_retention(catalog.snapshot_retention);

    let analyzer = GeminiAnalyzer::new(env.ai_api_key.clone(), catalog.target_topics.clone());
    let notifier = NotifierMux::from_env(&env);
    let settings = MonitorSettings::from_catalog(&catalog);

    Ok(Monitor::new(
        catalog.sources,
        Arc::new(fetcher),
        Arc::new(analyzer),
        ChangeDetector::new(store),
        notifier,
    )
    .with_settings(settings))
}

/// Best effort: console, plus Telegram when the chat credentials exist.
async fn report_critical(err: &anyhow::Error) {
    let mux = NotifierMux::minimal(MonitorEnv::minimal_from_env());
    let msg = NotificationMessage::new(
        format!("{DEFAULT_SUBJECT_PREFIX}: CRITICAL ERROR"),
        format!("CRITICAL ERROR\n\n{err:#}"),
    );
    let report = mux.dispatch(&msg).await;
    if report.nothing_delivered() {
        tracing::error!("critical error notification could not be delivered");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let monitor = match build_monitor(&cli) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "startup failed");
            report_critical(&e).await;
            return ExitCode::FAILURE;
        }
    };

    let today = chrono::Local::now().date_naive();
    let report = monitor.run(today).await;
    if report.failed() > 0 {
        tracing::warn!(failed = report.failed(), "run finished with failed sources (reported individually)");
    }
    ExitCode::SUCCESS
}
