use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::extract::clean_text;

pub const UNKNOWN_NAME: &str = "Unknown";

const CRAWL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Column order shared by every tabular output.
pub const FIELDS: [&str; 12] = [
    "name",
    "torrent_url",
    "magnet_url",
    "size",
    "seeders",
    "leechers",
    "upload_time",
    "category",
    "duration",
    "description",
    "source_url",
    "crawl_time",
];

/// One torrent listing.
///
/// Field declaration order matches [`FIELDS`], the CSV output relies on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentRecord {
    pub name: String,
    #[serde(default)]
    pub torrent_url: Option<String>,
    #[serde(default)]
    pub magnet_url: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub seeders: Option<u32>,
    #[serde(default)]
    pub leechers: Option<u32>,
    #[serde(default)]
    pub upload_time: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub source_url: String,
    pub crawl_time: String,
}

/// Current local time as an ISO 8601 timestamp with microseconds.
pub fn now_timestamp() -> String {
    Local::now().format(CRAWL_TIME_FORMAT).to_string()
}

pub fn is_timestamp(s: &str) -> bool {
    NaiveDateTime::parse_from_str(s, CRAWL_TIME_FORMAT).is_ok()
}

/// Accumulates extracted fields, then hands out a record with its invariants
/// upheld: a non-empty name and a crawl time.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: TorrentRecord,
}

impl RecordBuilder {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            record: TorrentRecord {
                source_url: source_url.into(),
                crawl_time: now_timestamp(),
                ..Default::default()
            },
        }
    }

    /// Resumes from a record built by an earlier parse step.
    pub fn enrich(record: TorrentRecord) -> Self {
        Self { record }
    }

    pub fn name(&mut self, name: &str) -> &mut Self {
        self.record.name = clean_text(name);
        self
    }

    pub fn torrent_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.record.torrent_url = Some(url.into());
        self
    }

    pub fn magnet_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.record.magnet_url = Some(url.into());
        self
    }

    pub fn size(&mut self, size: impl Into<String>) -> &mut Self {
        self.record.size = Some(size.into());
        self
    }

    pub fn seeders(&mut self, seeders: u32) -> &mut Self {
        self.record.seeders = Some(seeders);
        self
    }

    pub fn leechers(&mut self, leechers: u32) -> &mut Self {
        self.record.leechers = Some(leechers);
        self
    }

    pub fn upload_time(&mut self, upload_time: impl Into<String>) -> &mut Self {
        self.record.upload_time = Some(upload_time.into());
        self
    }

    pub fn category(&mut self, category: impl Into<String>) -> &mut Self {
        self.record.category = Some(category.into());
        self
    }

    pub fn duration(&mut self, duration: impl Into<String>) -> &mut Self {
        self.record.duration = Some(duration.into());
        self
    }

    pub fn description(&mut self, description: &str) -> &mut Self {
        self.record.description = Some(clean_text(description));
        self
    }

    pub fn build(self) -> TorrentRecord {
        let mut record = self.record;
        if record.name.trim().is_empty() {
            record.name = String::from(UNKNOWN_NAME);
        }
        if record.crawl_time.is_empty() {
            record.crawl_time = now_timestamp();
        }
        record
    }
}
