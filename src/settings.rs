use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Datelike;
use config::{Config, Environment, File, Map};
use serde::Deserialize;

use crate::parser::Layout;

const CONFIG_NAME: &str = "healthcamp";
const ENV_PREFIX: &str = "HEALTHCAMP";

const DEFAULT_SOURCES: &[(&str, &str)] = &[
    ("erode", "https://www.nhm.tn.gov.in/sites/default/files/documents/erode.pdf"),
    ("coimbatore", "https://www.nhm.tn.gov.in/sites/default/files/documents/coimbatore.pdf"),
    ("palani", "https://www.nhm.tn.gov.in/sites/default/files/documents/palani.pdf"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Target year; current year when unset.
    pub year: Option<i32>,
    /// Target month (1-12); current month when unset.
    pub month: Option<u32>,
    pub max_records: usize,
    pub layout: Layout,
    pub concurrency: usize,
    pub db_path: PathBuf,
    pub collection_root: String,
    pub subcollection: String,
    pub download_dir: Option<PathBuf>,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceConfig {
    pub district: String,
    pub url: String,
    #[serde(default)]
    pub layout: Option<Layout>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            year: None,
            month: None,
            max_records: 10,
            layout: Layout::Combined,
            concurrency: 4,
            db_path: PathBuf::from("data/healthcamp.sqlite"),
            collection_root: "govtdata".to_string(),
            subcollection: "PDFs".to_string(),
            download_dir: None,
            sources: DEFAULT_SOURCES
                .iter()
                .map(|(district, url)| SourceConfig {
                    district: district.to_string(),
                    url: url.to_string(),
                    layout: None,
                })
                .collect(),
        }
    }
}

impl Settings {
    /// Defaults, then `healthcamp.*` (or `path`), then `HEALTHCAMP_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// `env` replaces the process environment when given.
    fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(CONFIG_NAME).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    pub fn target_month(&self) -> (i32, u32) {
        let today = chrono::Local::now().date_naive();
        (
            self.year.unwrap_or_else(|| today.year()),
            self.month.unwrap_or_else(|| today.month()),
        )
    }

    pub fn layout_for(&self, source: &SourceConfig) -> Layout {
        source.layout.unwrap_or(self.layout)
    }
}
