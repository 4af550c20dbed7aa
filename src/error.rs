// src/error.rs

//! Error taxonomy for a monitoring run.
//!
//! Only `ConfigError` is allowed to stop the process. Every other error is
//! caught at the smallest scope that can still make progress: a URL, a source
//! or a channel.

use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration problems (environment or source catalog).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<&'static str>),

    #[error("invalid value for {var}: {message}")]
    InvalidEnv { var: &'static str, message: String },

    #[error("reading catalog {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing catalog {path}: {source}")]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid catalog: {0}")]
    Catalog(String),
}

/// Failure to compute the URL list for a source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("no existing page found between 1 and {max_page}")]
    NoPageFound { max_page: u32 },

    #[error("could not fetch first listing page {url}: {cause}")]
    FirstPageUnavailable { url: String, cause: String },

    #[error("page-count token not found in {url}")]
    PageCountMissing { url: String },

    #[error("invalid URL template '{template}': {message}")]
    Template { template: String, message: String },
}

/// Failure to retrieve a single URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("decoding body of {url} failed: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    pub fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn decode(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// The external relevance analyzer failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("analysis request failed: {0}")]
    Request(String),

    #[error("analysis service answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("analysis service returned no text")]
    EmptyResponse,
}

/// A channel failed to deliver (part of) a message.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("channel {channel} is disabled")]
    Disabled { channel: &'static str },

    #[error("{failed} of {total} chunk(s) failed on {channel}")]
    Chunks {
        channel: &'static str,
        failed: usize,
        total: usize,
    },

    #[error("building message for {channel}: {message}")]
    Build {
        channel: &'static str,
        message: String,
    },

    #[error("{channel} transport error: {message}")]
    Transport {
        channel: &'static str,
        message: String,
    },
}

/// Persisted fingerprint/snapshot I/O failure.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Everything that can move a source from `Running` to `Failed`.
#[derive(Error, Debug)]
pub enum SourceFailure {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("no content extracted from {source_name} ({failed} URL(s) failed, {empty} empty)")]
    NoContent {
        source_name: String,
        failed: usize,
        empty: usize,
    },

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_lists_every_variable() {
        let e = ConfigError::MissingEnv(vec!["TELEGRAM_BOT_TOKEN", "AI_API_KEY"]);
        assert_eq!(
            e.to_string(),
            "missing required environment variables: TELEGRAM_BOT_TOKEN, AI_API_KEY"
        );
    }

    #[test]
    fn no_content_failure_reports_counts() {
        let e = SourceFailure::NoContent {
            source_name: "BOC".into(),
            failed: 2,
            empty: 1,
        };
        assert!(e.to_string().contains("2 URL(s) failed, 1 empty"));
    }
}
