// src/config/catalog.rs
//! Monitored sources and run settings.
//!
//! A `sources.toml` in the output directory replaces the built-in catalog
//! entirely. Each `[[sources]]` entry is flat: a `kind` tag plus the fields
//! that kind needs.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::schedule::ScheduleRule;
use crate::source::{
    Source, SourceKind, DEFAULT_MAX_PAGE, DEFAULT_NOT_FOUND_MARKER, DEFAULT_PAGE_COUNT_PATTERN,
    DEFAULT_PAGE_WIDTH,
};
use crate::store::DEFAULT_SNAPSHOT_RETENTION;

pub const CATALOG_FILE: &str = "sources.toml";
pub const DEFAULT_SUBJECT_PREFIX: &str = "AUTOMATIZACIÓN EP";
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);

const BOC_TEMPLATE: &str = "https://www.gobiernodecanarias.org/boc/{year}/{page}/index.html";
const TABLON_TEMPLATE: &str = "https://sede.gobiernodecanarias.org/sede/movil/menu_portada_movil/tablon_anuncios?qa&inicio=false&fh={to}&fAgrupacionMateria=true&fd={from}&page={page}";
const BOP_SUMMARIES: [&str; 3] = ["sumario.php", "sumario1.php", "sumario2.php"];

const STATIC_PAGES: [(&str, &str); 4] = [
    (
        "SodeteGC",
        "https://www.sodetegc.org/conocenos/informacion-administrativa/empleo/",
    ),
    (
        "Asista",
        "https://asistacanarias.org/portal/trabaja-con-nosotros",
    ),
    ("ITCCanarias", "https://www.itccanarias.org/web/es/empleo"),
    (
        "SCS: OPE 2016-17-18: General",
        "https://www3.gobiernodecanarias.org/sanidad/scs/contenidoGenerico.jsp?idDocument=0de977ff-8e1f-11f0-ab16-39979cd2dfcc&idCarpeta=b8cf85ba-fc1a-11dd-a72f-93771b0e33f6",
    ),
];

const TARGET_TOPICS: [&str; 7] = [
    "ingeniero de telecomunicación",
    "ingeniero informático",
    "ingeniero en tecnologías de la información",
    "programador",
    "médico geriatra",
    "experto o ingeniero TIC",
    "ingeniero electrónico",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    /// Prefix of every notification subject.
    pub subject_prefix: String,
    /// Professions or topics the analyzer looks for.
    pub target_topics: Vec<String>,
    pub snapshot_retention: usize,
    /// Pause between consecutive remote requests and between sources.
    pub request_delay: Duration,
    /// Send the end-of-run summary when change detection ran.
    pub run_summary: bool,
    pub sources: Vec<Source>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let bop = |base: &str| -> Vec<String> {
            BOP_SUMMARIES
                .iter()
                .map(|page| format!("{base}/{page}?fecha_mas_reciente={{date}}"))
                .collect()
        };

        let mut sources = vec![
            Source::latest_page("BOC", BOC_TEMPLATE),
            Source::paginated("Tablón GobCan", TABLON_TEMPLATE, 0),
            Source::weekly("BOP Las Palmas", bop("https://www.boplaspalmas.net/nbop2")),
            Source::weekly(
                "BOP Santa Cruz",
                bop("https://www.bopsantacruzdetenerife.es/bopsc2"),
            )
            .with_verify_tls(false),
        ];
        sources.extend(
            STATIC_PAGES
                .iter()
                .map(|(name, url)| Source::static_page(*name, *url)),
        );

        Self {
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            target_topics: TARGET_TOPICS.iter().map(|t| t.to_string()).collect(),
            snapshot_retention: DEFAULT_SNAPSHOT_RETENTION,
            request_delay: DEFAULT_REQUEST_DELAY,
            run_summary: true,
            sources,
        }
    }

    /// Parse and validate catalog text. `path` only labels errors.
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: CatalogFile = toml::from_str(text).map_err(|source| ConfigError::CatalogParse {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = file.into_catalog()?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Catalog("no sources configured".into()));
        }
        let mut names = HashSet::new();
        for s in &self.sources {
            if s.name.trim().is_empty() {
                return Err(ConfigError::Catalog("source with empty name".into()));
            }
            if !names.insert(s.name.as_str()) {
                return Err(ConfigError::Catalog(format!(
                    "duplicate source name `{}`",
                    s.name
                )));
            }
            validate_kind(&s.name, &s.kind)?;
        }
        Ok(())
    }
}

fn validate_kind(name: &str, kind: &SourceKind) -> Result<(), ConfigError> {
    let bad = |msg: &str| Err(ConfigError::Catalog(format!("source `{name}`: {msg}")));
    match kind {
        SourceKind::LatestPage {
            url_template,
            max_page,
            ..
        } => {
            if url_template.trim().is_empty() {
                return bad("empty url_template");
            }
            if !url_template.contains("{page}") {
                return bad("url_template lacks {page}");
            }
            if *max_page == 0 {
                return bad("max_page must be at least 1");
            }
        }
        SourceKind::PaginatedListing {
            url_template,
            page_count_pattern,
            ..
        } => {
            if url_template.trim().is_empty() {
                return bad("empty url_template");
            }
            match regex::Regex::new(page_count_pattern) {
                Err(_) => return bad("page_count_pattern is not a valid regex"),
                Ok(re) if re.captures_len() < 2 => {
                    return bad("page_count_pattern needs a capture group for the count")
                }
                Ok(_) => {}
            }
        }
        SourceKind::WeeklyPattern { url_templates } => {
            if url_templates.is_empty() {
                return bad("url_templates is empty");
            }
            if url_templates.iter().any(|t| t.trim().is_empty()) {
                return bad("empty entry in url_templates");
            }
            if let Some(t) = url_templates.iter().find(|t| !t.contains("{date}")) {
                return bad(&format!("template `{t}` lacks {{date}}"));
            }
        }
        SourceKind::StaticPage { url } => {
            if url.trim().is_empty() {
                return bad("empty url");
            }
        }
    }
    Ok(())
}

/// `<output_dir>/sources.toml` if it exists, else [`Catalog::builtin`].
pub fn load_catalog(output_dir: &Path) -> Result<Catalog, ConfigError> {
    let path = output_dir.join(CATALOG_FILE);
    if !path.exists() {
        tracing::info!(path = %path.display(), "no catalog file; using built-in sources");
        return Ok(Catalog::builtin());
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::CatalogIo {
        path: path.clone(),
        source,
    })?;
    let catalog = Catalog::from_toml_str(&text, &path)?;
    tracing::info!(path = %path.display(), sources = catalog.sources.len(), "catalog loaded");
    Ok(catalog)
}

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    subject_prefix: Option<String>,
    target_topics: Option<Vec<String>>,
    snapshot_retention: Option<usize>,
    request_delay_ms: Option<u64>,
    run_summary: Option<bool>,
    #[serde(default)]
    sources: Vec<SourceEntry>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindTag {
    LatestPage,
    PaginatedListing,
    WeeklyPattern,
    StaticPage,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceEntry {
    name: String,
    kind: KindTag,
    url: Option<String>,
    url_template: Option<String>,
    url_templates: Option<Vec<String>>,
    year: Option<i32>,
    max_page: Option<u32>,
    page_width: Option<usize>,
    not_found_marker: Option<String>,
    lookback_days: Option<u32>,
    page_count_pattern: Option<String>,
    verify_tls: Option<bool>,
    detect_changes: Option<bool>,
    analyze: Option<bool>,
    schedule: Option<ScheduleRule>,
}

impl CatalogFile {
    fn into_catalog(self) -> Result<Catalog, ConfigError> {
        let defaults = Catalog::builtin();
        let sources = self
            .sources
            .into_iter()
            .map(SourceEntry::into_source)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Catalog {
            subject_prefix: self.subject_prefix.unwrap_or(defaults.subject_prefix),
            target_topics: self.target_topics.unwrap_or(defaults.target_topics),
            snapshot_retention: self
                .snapshot_retention
                .unwrap_or(defaults.snapshot_retention),
            request_delay: self
                .request_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_delay),
            run_summary: self.run_summary.unwrap_or(defaults.run_summary),
            sources,
        })
    }
}

impl SourceEntry {
    fn into_source(self) -> Result<Source, ConfigError> {
        let name = self.name;
        let required = |field: &str, v: Option<String>| {
            v.ok_or_else(|| ConfigError::Catalog(format!("source `{name}`: missing `{field}`")))
        };

        let kind = match self.kind {
            KindTag::LatestPage => SourceKind::LatestPage {
                url_template: required("url_template", self.url_template)?,
                year: self.year,
                max_page: self.max_page.unwrap_or(DEFAULT_MAX_PAGE),
                page_width: self.page_width.unwrap_or(DEFAULT_PAGE_WIDTH),
                not_found_marker: self
                    .not_found_marker
                    .unwrap_or_else(|| DEFAULT_NOT_FOUND_MARKER.to_string()),
            },
            KindTag::PaginatedListing => SourceKind::PaginatedListing {
                url_template: required("url_template", self.url_template)?,
                lookback_days: self.lookback_days.unwrap_or(0),
                page_count_pattern: self
                    .page_count_pattern
                    .unwrap_or_else(|| DEFAULT_PAGE_COUNT_PATTERN.to_string()),
            },
            KindTag::WeeklyPattern => SourceKind::WeeklyPattern {
                url_templates: self.url_templates.ok_or_else(|| {
                    ConfigError::Catalog(format!("source `{name}`: missing `url_templates`"))
                })?,
            },
            KindTag::StaticPage => SourceKind::StaticPage {
                url: required("url", self.url)?,
            },
        };

        let mut source = Source::new(name, kind);
        if let Some(v) = self.verify_tls {
            source.verify_tls = v;
        }
        if let Some(v) = self.detect_changes {
            source.detect_changes = v;
        }
        if let Some(v) = self.analyze {
            source.analyze = v;
        }
        source.schedule = self.schedule;
        Ok(source)
    }
}
