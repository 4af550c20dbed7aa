// src/discovery.rs
//! Per-kind computation of the URLs a source must fetch in this run.
//!
//! Latest-page discovery probes the remote site (binary search over the page
//! space), paginated listings read the page count from the first page, and
//! the weekly and static kinds are pure functions of the calendar day.

use std::future::Future;
use std::time::Duration;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};

use crate::error::DiscoveryError;
use crate::fetch::{extract_page_count, ContentFetcher};
use crate::schedule::weekday_index;
use crate::source::{DiscoveryResult, Source, SourceKind};

pub const DATE_FMT: &str = "%Y-%m-%d";

/// Monday, Wednesday and Friday, as offsets from the week's Monday.
pub const PUBLICATION_DAY_OFFSETS: [i64; 3] = [0, 2, 4];

pub struct DiscoveryContext<'a> {
    pub today: NaiveDate,
    pub fetcher: &'a dyn ContentFetcher,
    /// Pause after every remote probe.
    pub request_delay: Duration,
}

pub async fn discover(
    source: &Source,
    ctx: &DiscoveryContext<'_>,
) -> Result<DiscoveryResult, DiscoveryError> {
    match &source.kind {
        SourceKind::LatestPage {
            url_template,
            year,
            max_page,
            page_width,
            not_found_marker,
        } => {
            if !url_template.contains("{page}") {
                return Err(DiscoveryError::Template {
                    template: url_template.clone(),
                    message: "missing {page} placeholder".into(),
                });
            }
            let year = year.unwrap_or_else(|| ctx.today.year());
            tracing::info!(source = %source.name, year, "searching latest page");

            let latest = latest_existing(*max_page, ctx.request_delay, |page| {
                let url = render_page_url(url_template, year, page, *page_width);
                async move {
                    ctx.fetcher
                        .page_exists(&url, not_found_marker, source.verify_tls)
                        .await
                }
            })
            .await
            .ok_or(DiscoveryError::NoPageFound {
                max_page: *max_page,
            })?;

            tracing::info!(source = %source.name, page = latest, "latest page found");
            Ok(
                DiscoveryResult::single(render_page_url(url_template, year, latest, *page_width))
                    .with_latest_page(latest),
            )
        }

        SourceKind::PaginatedListing {
            url_template,
            lookback_days,
            page_count_pattern,
        } => {
            let (from, to) = listing_date_range(ctx.today, *lookback_days);
            tracing::info!(source = %source.name, %from, %to, "enumerating listing pages");

            let first = render_listing_url(url_template, from, to, 1);
            let raw = ctx
                .fetcher
                .fetch_raw(&first, source.verify_tls)
                .await
                .map_err(|e| DiscoveryError::FirstPageUnavailable {
                    url: first.clone(),
                    cause: e.to_string(),
                })?;
            if raw.trim().is_empty() {
                return Err(DiscoveryError::FirstPageUnavailable {
                    url: first,
                    cause: "empty body".into(),
                });
            }

            let count = extract_page_count(&raw, page_count_pattern)
                .ok_or_else(|| DiscoveryError::PageCountMissing { url: first.clone() })?
                .max(1);
            tracing::info!(source = %source.name, pages = count, "listing page count");

            let urls = (1..=count)
                .map(|page| render_listing_url(url_template, from, to, page))
                .collect();
            DiscoveryResult::from_urls(urls).ok_or_else(|| DiscoveryError::Template {
                template: url_template.clone(),
                message: "no pages generated".into(),
            })
        }

        SourceKind::WeeklyPattern { url_templates } => {
            let urls = weekly_urls(url_templates, ctx.today);
            DiscoveryResult::from_urls(urls).ok_or_else(|| DiscoveryError::Template {
                template: String::new(),
                message: "weekly source has no URL templates".into(),
            })
        }

        SourceKind::StaticPage { url } => Ok(DiscoveryResult::single(url.clone())),
    }
}

/// Highest page in `1..=max_page` for which `exists` holds, assuming pages
/// exist up to some threshold and not beyond it. `None` if no page exists.
pub async fn latest_existing<F, Fut>(max_page: u32, delay: Duration, mut exists: F) -> Option<u32>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    let (mut low, mut high) = (1u32, max_page);
    let mut best = None;
    while low <= high {
        let mid = low + (high - low) / 2;
        if exists(mid).await {
            best = Some(mid);
            match mid.checked_add(1) {
                Some(next) => low = next,
                None => break,
            }
        } else {
            high = mid - 1;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    best
}

pub fn render_page_url(template: &str, year: i32, page: u32, width: usize) -> String {
    template
        .replace("{year}", &year.to_string())
        .replace("{page}", &format!("{page:0width$}"))
}

/// `(start, end)` of a listing query; both are `today` when `lookback_days` is 0.
pub fn listing_date_range(today: NaiveDate, lookback_days: u32) -> (NaiveDate, NaiveDate) {
    (today - ChronoDuration::days(i64::from(lookback_days)), today)
}

pub fn render_listing_url(template: &str, from: NaiveDate, to: NaiveDate, page: u32) -> String {
    template
        .replace("{from}", &from.format(DATE_FMT).to_string())
        .replace("{to}", &to.format(DATE_FMT).to_string())
        .replace("{page}", &page.to_string())
}

/// Monday, Wednesday and Friday of the week containing `today`.
pub fn week_publication_dates(today: NaiveDate) -> [NaiveDate; 3] {
    let monday = today - ChronoDuration::days(i64::from(weekday_index(today)));
    PUBLICATION_DAY_OFFSETS.map(|d| monday + ChronoDuration::days(d))
}

/// Every template expanded for every publication date, date-major.
pub fn weekly_urls(templates: &[String], today: NaiveDate) -> Vec<String> {
    let mut urls = Vec::with_capacity(templates.len() * PUBLICATION_DAY_OFFSETS.len());
    for date in week_publication_dates(today) {
        let d = date.format(DATE_FMT).to_string();
        for t in templates {
            urls.push(t.replace("{date}", &d));
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::cell::Cell;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn binary_search_finds_every_threshold_within_log_bound() {
        let max = 366u32;
        let bound = (f64::from(max)).log2().ceil() as usize + 1;
        for t in 1..=max {
            let probes = Cell::new(0usize);
            let found = latest_existing(max, Duration::ZERO, |p| {
                probes.set(probes.get() + 1);
                async move { p <= t }
            })
            .await;
            assert_eq!(found, Some(t));
            assert!(probes.get() <= bound, "t={t} probes={}", probes.get());
        }
    }

    #[tokio::test]
    async fn binary_search_reports_absence() {
        let found = latest_existing(366, Duration::ZERO, |_| async { false }).await;
        assert_eq!(found, None);
        assert_eq!(latest_existing(0, Duration::ZERO, |_| async { true }).await, None);
    }

    #[tokio::test]
    async fn binary_search_handles_the_full_page_range() {
        let probes = Cell::new(0usize);
        let found = latest_existing(u32::MAX, Duration::ZERO, |_| {
            probes.set(probes.get() + 1);
            async { true }
        })
        .await;
        assert_eq!(found, Some(u32::MAX));
        assert!(probes.get() <= 33, "probes={}", probes.get());
    }

    /// Pages 1..=5 exist, but only for a client that skips certificate checks.
    struct BrokenChain;

    #[async_trait::async_trait]
    impl ContentFetcher for BrokenChain {
        async fn fetch_text(&self, url: &str, _verify_tls: bool) -> Result<String, FetchError> {
            Err(FetchError::transport(url, "unexpected fetch"))
        }
        async fn fetch_raw(&self, url: &str, verify_tls: bool) -> Result<String, FetchError> {
            self.fetch_text(url, verify_tls).await
        }
        async fn page_exists(&self, url: &str, _marker: &str, verify_tls: bool) -> bool {
            let page: u32 = url.rsplit('/').next().and_then(|p| p.parse().ok()).unwrap_or(0);
            !verify_tls && (1..=5).contains(&page)
        }
    }

    #[tokio::test]
    async fn latest_page_search_honours_source_tls_setting() {
        let ctx = DiscoveryContext {
            today: day(2026, 10, 15),
            fetcher: &BrokenChain,
            request_delay: Duration::ZERO,
        };
        let boc = Source::latest_page("BOC", "https://boc/{year}/{page}");

        let err = discover(&boc, &ctx).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NoPageFound { .. }));

        let found = discover(&boc.with_verify_tls(false), &ctx).await.unwrap();
        assert_eq!(found.urls(), ["https://boc/2026/005".to_string()].as_slice());
        assert_eq!(found.latest_page(), Some(5));
    }

    #[test]
    fn page_urls_are_zero_padded() {
        let t = "https://www.gobiernodecanarias.org/boc/{year}/{page}/index.html";
        assert_eq!(
            render_page_url(t, 2026, 7, 3),
            "https://www.gobiernodecanarias.org/boc/2026/007/index.html"
        );
        assert_eq!(render_page_url(t, 2026, 201, 3), "https://www.gobiernodecanarias.org/boc/2026/201/index.html");
    }

    #[test]
    fn weekly_pattern_yields_nine_urls_for_mon_wed_fri() {
        // Thursday 2026-10-15 belongs to the week starting Monday 2026-10-12.
        let templates = vec![
            "https://bop/sumario.php?fecha_mas_reciente={date}".to_string(),
            "https://bop/sumario1.php?fecha_mas_reciente={date}".to_string(),
            "https://bop/sumario2.php?fecha_mas_reciente={date}".to_string(),
        ];
        let urls = weekly_urls(&templates, day(2026, 10, 15));
        assert_eq!(urls.len(), 9);
        assert_eq!(urls[0], "https://bop/sumario.php?fecha_mas_reciente=2026-10-12");
        assert_eq!(urls[4], "https://bop/sumario1.php?fecha_mas_reciente=2026-10-14");
        assert_eq!(urls[8], "https://bop/sumario2.php?fecha_mas_reciente=2026-10-16");
    }

    #[test]
    fn sunday_belongs_to_the_preceding_week() {
        let dates = week_publication_dates(day(2026, 10, 18));
        assert_eq!(dates, [day(2026, 10, 12), day(2026, 10, 14), day(2026, 10, 16)]);
    }

    #[test]
    fn listing_range_defaults_to_same_day() {
        let today = day(2026, 3, 2);
        assert_eq!(listing_date_range(today, 0), (today, today));
        assert_eq!(listing_date_range(today, 3).0, day(2026, 2, 27));
        let url = render_listing_url("https://t/list?fh={to}&fd={from}&page={page}", day(2026, 2, 27), today, 4);
        assert_eq!(url, "https://t/list?fh=2026-03-02&fd=2026-02-27&page=4");
    }
}
