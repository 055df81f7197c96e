mod csv;
mod json;
mod sqlite;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::record::TorrentRecord;

pub use self::csv::{CsvSink, CsvWriterConfig};
pub use self::json::JsonSink;
pub use self::sqlite::SqliteSink;

/// An output receiving every accepted record.
pub trait Sink {
    fn write(&mut self, record: &TorrentRecord) -> anyhow::Result<()>;

    /// Flushes and terminates the output, called once at the end of a run.
    fn close(&mut self) -> anyhow::Result<()>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SinkTarget {
    Json(PathBuf),
    /// Writes to stdout without a path
    Csv(Option<PathBuf>, CsvWriterConfig),
    Sqlite(PathBuf),
}

impl SinkTarget {
    pub fn open(&self) -> anyhow::Result<Box<dyn Sink>> {
        let sink: Box<dyn Sink> = match self {
            Self::Json(path) => Box::new(JsonSink::create(path)?),
            Self::Csv(Some(path), config) => Box::new(CsvSink::create(path, config)?),
            Self::Csv(None, config) => Box::new(CsvSink::stdout(config)?),
            Self::Sqlite(path) => Box::new(SqliteSink::open(path)?),
        };
        log::debug!("Opened {}", sink.describe());
        Ok(sink)
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Json(path) | Self::Csv(Some(path), _) | Self::Sqlite(path) => Some(path),
            Self::Csv(None, _) => None,
        }
    }
}

pub(crate) fn create_parent_dir(path: &Path) -> anyhow::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(fs_err::create_dir_all(dir)?),
        _ => Ok(()),
    }
}
