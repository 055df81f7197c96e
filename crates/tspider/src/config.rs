use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tspider_crawler::CrawlerConfig;

use crate::sink::{CsvWriterConfig, SinkTarget};

pub const TIMESTAMP_TOKEN: &str = "{timestamp}";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The application configuration file, every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_urls: Vec<String>,
    pub spider_settings: SpiderSettings,
    pub filter_settings: FilterSettings,
    pub output_settings: OutputSettings,
    pub site_settings: SiteProfile,
}

impl AppConfig {
    /// Loads the config, falling back to defaults when it's missing or invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{e:#}, using defaults");
                Self::default()
            }
        }
    }

    /// Reads YAML for `.yaml`/`.yml` files, JSON otherwise.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs_err::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Couldn't parse YAML config {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Couldn't parse JSON config {}", path.display()))?
        };
        Ok(config)
    }

    pub fn apply_timestamp(&mut self, at: &DateTime<Local>) {
        self.output_settings.apply_timestamp(at);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiderSettings {
    #[serde(default = "default_download_delay")]
    pub download_delay: f32,
    #[serde(default = "default_randomize_delay")]
    pub randomize_delay: bool,
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: NonZeroUsize,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SpiderSettings {
    fn default() -> Self {
        Self {
            download_delay: default_download_delay(),
            randomize_delay: default_randomize_delay(),
            concurrent_requests: default_concurrent_requests(),
            output_format: OutputFormat::default(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_download_delay() -> f32 {
    CrawlerConfig::default().download_delay
}

fn default_randomize_delay() -> bool {
    CrawlerConfig::default().randomize_delay
}

fn default_concurrent_requests() -> NonZeroUsize {
    CrawlerConfig::default().concurrent_requests
}

fn default_user_agent() -> String {
    CrawlerConfig::default().user_agent
}

impl From<&SpiderSettings> for CrawlerConfig {
    fn from(s: &SpiderSettings) -> Self {
        Self {
            user_agent: s.user_agent.clone(),
            download_delay: s.download_delay,
            randomize_delay: s.randomize_delay,
            concurrent_requests: s.concurrent_requests,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Json,
    Csv,
    Sqlite,
    #[default]
    All,
}

impl OutputFormat {
    pub fn json(self) -> bool {
        matches!(self, Self::Json | Self::All)
    }

    pub fn csv(self) -> bool {
        matches!(self, Self::Csv | Self::All)
    }

    pub fn sqlite(self) -> bool {
        matches!(self, Self::Sqlite | Self::All)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Sqlite => "sqlite",
            Self::All => "all",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub min_seeders: i64,
    pub blocked_keywords: Vec<String>,
    /// How many next pages are followed from a seed
    pub max_pages: usize,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_seeders: 0,
            blocked_keywords: vec!["spam".into(), "fake".into(), "virus".into()],
            max_pages: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub json_file: PathBuf,
    pub csv_file: PathBuf,
    pub sqlite_file: PathBuf,
    pub csv: CsvWriterConfig,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            json_file: PathBuf::from("torrents.json"),
            csv_file: PathBuf::from("torrents.csv"),
            sqlite_file: PathBuf::from("torrents.db"),
            csv: CsvWriterConfig::default(),
        }
    }
}

impl OutputSettings {
    /// Replaces the `{timestamp}` token of every output path.
    pub fn apply_timestamp(&mut self, at: &DateTime<Local>) {
        let stamp = at.format(TIMESTAMP_FORMAT).to_string();
        for path in [&mut self.json_file, &mut self.csv_file, &mut self.sqlite_file] {
            if let Some(s) = path.to_str().filter(|s| s.contains(TIMESTAMP_TOKEN)) {
                *path = PathBuf::from(s.replace(TIMESTAMP_TOKEN, &stamp));
            }
        }
    }

    pub fn targets(&self, format: OutputFormat) -> Vec<SinkTarget> {
        let mut targets = vec![];
        if format.json() {
            targets.push(SinkTarget::Json(self.json_file.clone()));
        }
        if format.csv() {
            targets.push(SinkTarget::Csv(Some(self.csv_file.clone()), self.csv.clone()));
        }
        if format.sqlite() {
            targets.push(SinkTarget::Sqlite(self.sqlite_file.clone()));
        }
        targets
    }
}

/// Markup markers of the one site that gets specialized parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Lowercase substring identifying the site in a URL
    pub host_marker: String,
    pub search_marker: String,
    pub detail_marker: String,
    pub download_marker: String,
    /// Stripped from the page title when used as a name
    pub title_suffix: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            host_marker: String::from("rarbg"),
            search_marker: String::from("/search/"),
            detail_marker: String::from("/torrent/"),
            download_marker: String::from("download.php"),
            title_suffix: String::from(" - RARBG"),
        }
    }
}
