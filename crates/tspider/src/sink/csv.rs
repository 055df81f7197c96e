use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::{create_parent_dir, Sink};
use crate::record::{TorrentRecord, FIELDS};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CsvWriterConfig {
    #[serde(default = "default_csv_delimiter")]
    pub delimiter: char,
    /// Escapes quotes with this char instead of doubling them
    #[serde(default)]
    pub escape: Option<char>,
    /// Record terminator, CRLF when unset
    #[serde(default)]
    pub terminator: Option<char>,
}

impl Default for CsvWriterConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            escape: None,
            terminator: None,
        }
    }
}

fn default_csv_delimiter() -> char {
    CsvWriterConfig::default().delimiter
}

impl From<&CsvWriterConfig> for csv::WriterBuilder {
    fn from(c: &CsvWriterConfig) -> Self {
        let mut builder = csv::WriterBuilder::new();
        // The header is written upfront, even for empty outputs
        builder.has_headers(false);
        builder.delimiter(c.delimiter as u8);
        builder.terminator(match c.terminator {
            Some(t) => csv::Terminator::Any(t as u8),
            None => csv::Terminator::CRLF,
        });
        if let Some(escape) = c.escape {
            builder.double_quote(false);
            builder.escape(escape as u8);
        }
        builder
    }
}

/// Writes the header row, then one row per record in [`FIELDS`] order.
pub struct CsvSink {
    wtr: csv::Writer<Box<dyn Write>>,
    target: String,
}

impl CsvSink {
    pub fn create<P: AsRef<Path>>(path: P, config: &CsvWriterConfig) -> anyhow::Result<Self> {
        let path = path.as_ref();
        create_parent_dir(path)?;
        let file = fs_err::File::create(path)?;
        Self::with_header(Box::new(file), config, path.display().to_string())
    }

    pub fn stdout(config: &CsvWriterConfig) -> anyhow::Result<Self> {
        Self::with_header(Box::new(io::stdout()), config, String::from("stdout"))
    }

    fn with_header(
        out: Box<dyn Write>,
        config: &CsvWriterConfig,
        target: String,
    ) -> anyhow::Result<Self> {
        let mut wtr = csv::WriterBuilder::from(config).from_writer(out);
        wtr.serialize(FIELDS)
            .with_context(|| format!("Couldn't write CSV header to {target}"))?;
        Ok(Self { wtr, target })
    }
}

impl Sink for CsvSink {
    fn write(&mut self, record: &TorrentRecord) -> anyhow::Result<()> {
        self.wtr
            .serialize(record)
            .with_context(|| format!("Couldn't write CSV record to {}", self.target))
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.wtr
            .flush()
            .with_context(|| format!("Couldn't flush {}", self.target))
    }

    fn describe(&self) -> String {
        format!("CSV output {}", self.target)
    }
}
