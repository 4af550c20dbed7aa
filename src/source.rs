// src/source.rs
//! Monitored source definitions. Immutable for the duration of a run.

use crate::schedule::ScheduleRule;

pub const DEFAULT_MAX_PAGE: u32 = 366;
pub const DEFAULT_PAGE_WIDTH: usize = 3;
pub const DEFAULT_NOT_FOUND_MARKER: &str = "Page Not Found";
pub const DEFAULT_PAGE_COUNT_PATTERN: &str = r"pages:(\d+)";

/// Kind-specific discovery parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Numbered pages `1..=max_page`; the newest is the highest one that exists.
    /// `url_template` carries `{page}` and optionally `{year}`.
    LatestPage {
        url_template: String,
        year: Option<i32>,
        max_page: u32,
        page_width: usize,
        not_found_marker: String,
    },
    /// Date-ranged listing whose first page embeds the total page count.
    /// `url_template` carries `{from}`, `{to}` and `{page}`.
    PaginatedListing {
        url_template: String,
        lookback_days: u32,
        page_count_pattern: String,
    },
    /// Bulletins published Monday, Wednesday and Friday. Each template
    /// carries `{date}` (YYYY-MM-DD) and is expanded for all three days.
    WeeklyPattern { url_templates: Vec<String> },
    /// A single fixed page.
    StaticPage { url: String },
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::LatestPage { .. } => "latest-page",
            SourceKind::PaginatedListing { .. } => "paginated-listing",
            SourceKind::WeeklyPattern { .. } => "weekly-pattern",
            SourceKind::StaticPage { .. } => "static-page",
        }
    }

    pub fn default_schedule(&self) -> ScheduleRule {
        match self {
            SourceKind::LatestPage { .. } => ScheduleRule::WeekdaysOnly,
            SourceKind::PaginatedListing { .. } => ScheduleRule::EveryDay,
            SourceKind::WeeklyPattern { .. } => ScheduleRule::SundaysOnly,
            SourceKind::StaticPage { .. } => ScheduleRule::EveryDay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
    pub verify_tls: bool,
    /// Compare against the stored fingerprint and report a diff.
    pub detect_changes: bool,
    /// Run the relevance analyzer over the combined content.
    pub analyze: bool,
    /// Overrides the kind's default rule.
    pub schedule: Option<ScheduleRule>,
}

impl Source {
    /// Processing defaults follow the kind: static pages are change-detected,
    /// everything else is analyzed.
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        let is_static = matches!(kind, SourceKind::StaticPage { .. });
        Self {
            name: name.into(),
            kind,
            verify_tls: true,
            detect_changes: is_static,
            analyze: !is_static,
            schedule: None,
        }
    }

    pub fn latest_page(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self::new(
            name,
            SourceKind::LatestPage {
                url_template: url_template.into(),
                year: None,
                max_page: DEFAULT_MAX_PAGE,
                page_width: DEFAULT_PAGE_WIDTH,
                not_found_marker: DEFAULT_NOT_FOUND_MARKER.to_string(),
            },
        )
    }

    pub fn paginated(
        name: impl Into<String>,
        url_template: impl Into<String>,
        lookback_days: u32,
    ) -> Self {
        Self::new(
            name,
            SourceKind::PaginatedListing {
                url_template: url_template.into(),
                lookback_days,
                page_count_pattern: DEFAULT_PAGE_COUNT_PATTERN.to_string(),
            },
        )
    }

    pub fn weekly(name: impl Into<String>, url_templates: Vec<String>) -> Self {
        Self::new(name, SourceKind::WeeklyPattern { url_templates })
    }

    pub fn static_page(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, SourceKind::StaticPage { url: url.into() })
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_change_detection(mut self, on: bool) -> Self {
        self.detect_changes = on;
        self
    }

    pub fn with_analysis(mut self, on: bool) -> Self {
        self.analyze = on;
        self
    }

    pub fn with_schedule(mut self, rule: ScheduleRule) -> Self {
        self.schedule = Some(rule);
        self
    }

    pub fn schedule_rule(&self) -> ScheduleRule {
        self.schedule.unwrap_or_else(|| self.kind.default_schedule())
    }
}

/// Ordered, non-empty list of URLs to fetch for one source in one run.
/// "Nothing to do today" is the schedule's job, never an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryResult {
    urls: Vec<String>,
    latest_page: Option<u32>,
}

impl DiscoveryResult {
    pub fn single(url: String) -> Self {
        Self {
            urls: vec![url],
            latest_page: None,
        }
    }

    /// Page number the latest-page search settled on.
    pub fn with_latest_page(mut self, page: u32) -> Self {
        self.latest_page = Some(page);
        self
    }

    pub fn latest_page(&self) -> Option<u32> {
        self.latest_page
    }

    /// Returns `None` for an empty list.
    pub fn from_urls(urls: Vec<String>) -> Option<Self> {
        if urls.is_empty() {
            None
        } else {
            Some(Self {
                urls,
                latest_page: None,
            })
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
