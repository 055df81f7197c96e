use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{create_parent_dir, Sink};
use crate::record::TorrentRecord;

/// Streams records as a pretty-printed JSON array.
pub struct JsonSink {
    out: Option<BufWriter<fs_err::File>>,
    path: PathBuf,
    first: bool,
}

impl JsonSink {
    pub fn create<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        create_parent_dir(&path)?;
        let mut out = BufWriter::new(fs_err::File::create(&path)?);
        out.write_all(b"[\n")
            .with_context(|| format!("Couldn't write to {}", path.display()))?;
        Ok(Self {
            out: Some(out),
            path,
            first: true,
        })
    }
}

impl Sink for JsonSink {
    fn write(&mut self, record: &TorrentRecord) -> anyhow::Result<()> {
        let out = self
            .out
            .as_mut()
            .with_context(|| format!("{} is already closed", self.path.display()))?;
        if !self.first {
            out.write_all(b",\n")?;
        }
        serde_json::to_writer_pretty(&mut *out, record)
            .with_context(|| format!("Couldn't write JSON record to {}", self.path.display()))?;
        self.first = false;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut out) = self.out.take() {
            let terminator: &[u8] = if self.first { b"]\n" } else { b"\n]\n" };
            out.write_all(terminator)
                .and_then(|_| out.flush())
                .with_context(|| format!("Couldn't close {}", self.path.display()))?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("JSON output {}", self.path.display())
    }
}
