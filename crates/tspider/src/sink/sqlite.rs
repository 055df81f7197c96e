use std::path::{Path, PathBuf};

use anyhow::Context;
use rusqlite::{params, Connection};

use super::{create_parent_dir, Sink};
use crate::record::TorrentRecord;

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS torrents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        torrent_url TEXT,
        magnet_url TEXT,
        size TEXT,
        seeders INTEGER,
        leechers INTEGER,
        upload_time TEXT,
        category TEXT,
        duration TEXT,
        description TEXT,
        source_url TEXT,
        crawl_time TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )";

const INSERT: &str = "
    INSERT INTO torrents (
        name, torrent_url, magnet_url, size, seeders, leechers,
        upload_time, category, duration, description, source_url, crawl_time
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

/// Inserts one row per record into the `torrents` table, each insert commits.
pub struct SqliteSink {
    conn: Option<Connection>,
    path: PathBuf,
}

impl SqliteSink {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        create_parent_dir(&path)?;
        let conn = Connection::open(&path)
            .with_context(|| format!("Couldn't open database {}", path.display()))?;
        conn.execute(CREATE_TABLE, [])
            .with_context(|| format!("Couldn't create table in {}", path.display()))?;
        Ok(Self {
            conn: Some(conn),
            path,
        })
    }
}

impl Sink for SqliteSink {
    fn write(&mut self, record: &TorrentRecord) -> anyhow::Result<()> {
        let conn = self
            .conn
            .as_ref()
            .with_context(|| format!("{} is already closed", self.path.display()))?;
        conn.execute(
            INSERT,
            params![
                record.name,
                record.torrent_url,
                record.magnet_url,
                record.size,
                record.seeders.unwrap_or(0),
                record.leechers.unwrap_or(0),
                record.upload_time,
                record.category,
                record.duration,
                record.description,
                record.source_url,
                record.crawl_time,
            ],
        )
        .with_context(|| format!("Couldn't insert into {}", self.path.display()))?;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, e)| e)
                .with_context(|| format!("Couldn't close database {}", self.path.display()))?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("SQLite output {}", self.path.display())
    }
}
