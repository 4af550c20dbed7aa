// src/fetch/http.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT,
};
use reqwest::{Client, Response};

use super::{decode_body, html_to_text, ContentFetcher};
use crate::error::FetchError;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

fn browser_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
    h.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("es-ES,es;q=0.9,en;q=0.5"));
    h.insert(REFERER, HeaderValue::from_static("https://google.com"));
    h
}

/// `reqwest`-backed fetcher. Keeps a second client with certificate checks
/// off for sources that serve broken chains.
#[derive(Clone)]
pub struct HttpFetcher {
    verified: Client,
    unverified: Client,
    probe_timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeouts(REQUEST_TIMEOUT, PROBE_TIMEOUT)
    }

    pub fn with_timeouts(request: Duration, probe: Duration) -> Result<Self, FetchError> {
        let build = |accept_invalid: bool| {
            Client::builder()
                .default_headers(browser_headers())
                .timeout(request)
                .danger_accept_invalid_certs(accept_invalid)
                .build()
                .map_err(|e| FetchError::transport("<client>", e))
        };
        Ok(Self {
            verified: build(false)?,
            unverified: build(true)?,
            probe_timeout: probe,
        })
    }

    fn client(&self, verify_tls: bool) -> &Client {
        if verify_tls {
            &self.verified
        } else {
            &self.unverified
        }
    }

    /// GET `url`, require a success status and decode the body.
    async fn get_body(&self, url: &str, verify_tls: bool) -> Result<String, FetchError> {
        let resp = self
            .client(verify_tls)
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        read_body(resp).await.map_err(|e| FetchError::decode(url, e))
    }
}

async fn read_body(resp: Response) -> Result<String, reqwest::Error> {
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let bytes = resp.bytes().await?;
    Ok(decode_body(&bytes, content_type.as_deref()))
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str, verify_tls: bool) -> Result<String, FetchError> {
        tracing::info!(url, "fetching page text");
        let body = self.get_body(url, verify_tls).await.inspect_err(|e| {
            tracing::warn!(url, error = %e, "fetch failed");
        })?;
        Ok(html_to_text(&body))
    }

    async fn fetch_raw(&self, url: &str, verify_tls: bool) -> Result<String, FetchError> {
        tracing::info!(url, "fetching raw markup");
        self.get_body(url, verify_tls).await.inspect_err(|e| {
            tracing::warn!(url, error = %e, "raw fetch failed");
        })
    }

    async fn page_exists(&self, url: &str, not_found_marker: &str, verify_tls: bool) -> bool {
        tracing::debug!(url, "probing");
        let resp = match self
            .client(verify_tls)
            .get(url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url, error = %e, "probe failed");
                return false;
            }
        };
        if resp.status() != reqwest::StatusCode::OK {
            return false;
        }
        match read_body(resp).await {
            Ok(body) => !body.contains(not_found_marker),
            Err(e) => {
                tracing::warn!(url, error = %e, "probe body unreadable");
                false
            }
        }
    }
}
