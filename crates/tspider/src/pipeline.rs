use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::config::FilterSettings;
use crate::record::{now_timestamp, TorrentRecord, UNKNOWN_NAME};

/// One step of the item pipeline, returning `None` drops the record.
pub trait Stage {
    fn name(&self) -> &'static str;

    fn process(&mut self, record: TorrentRecord) -> Option<TorrentRecord>;
}

pub struct Normalize;

impl Stage for Normalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn process(&mut self, mut record: TorrentRecord) -> Option<TorrentRecord> {
        record.name = record.name.trim().to_string();
        if record.name.is_empty() {
            record.name = String::from(UNKNOWN_NAME);
        }
        if record.crawl_time.is_empty() {
            record.crawl_time = now_timestamp();
        }
        Some(record)
    }
}

/// Drops records whose torrent URL, then magnet URL, was already seen.
#[derive(Default)]
pub struct Dedup {
    seen_urls: HashSet<String>,
    seen_magnets: HashSet<String>,
}

impl Stage for Dedup {
    fn name(&self) -> &'static str {
        "dedup"
    }

    fn process(&mut self, record: TorrentRecord) -> Option<TorrentRecord> {
        // The torrent URL stays recorded when the magnet check drops the record
        if let Some(url) = &record.torrent_url {
            if !self.seen_urls.insert(url.clone()) {
                log::info!("Dropping duplicate torrent {url}");
                return None;
            }
        }
        if let Some(magnet) = &record.magnet_url {
            if !self.seen_magnets.insert(magnet.clone()) {
                log::info!("Dropping duplicate magnet of {}", record.name);
                return None;
            }
        }
        Some(record)
    }
}

pub struct MinSeeders {
    min: i64,
}

impl MinSeeders {
    pub fn new(min: i64) -> Self {
        Self { min }
    }
}

impl Stage for MinSeeders {
    fn name(&self) -> &'static str {
        "min_seeders"
    }

    fn process(&mut self, record: TorrentRecord) -> Option<TorrentRecord> {
        let seeders = i64::from(record.seeders.unwrap_or(0));
        if seeders < self.min {
            log::info!(
                "Dropping {} with {seeders} seeders (min {})",
                record.name,
                self.min
            );
            return None;
        }
        Some(record)
    }
}

pub struct BlockedKeywords {
    keywords: Vec<String>,
}

impl BlockedKeywords {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl Stage for BlockedKeywords {
    fn name(&self) -> &'static str {
        "blocked_keywords"
    }

    fn process(&mut self, record: TorrentRecord) -> Option<TorrentRecord> {
        let name = record.name.to_lowercase();
        if let Some(keyword) = self.keywords.iter().find(|k| name.contains(k.as_str())) {
            log::info!("Dropping {} for blocked keyword {keyword}", record.name);
            return None;
        }
        Some(record)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub processed: usize,
    pub accepted: usize,
    /// Dropped records by stage name
    pub dropped: BTreeMap<&'static str, usize>,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} processed, {} accepted", self.processed, self.accepted)?;
        for (stage, count) in &self.dropped {
            write!(f, ", {count} dropped by {stage}")?;
        }
        Ok(())
    }
}

/// Normalize, dedup, then filter on seeders and keywords.
pub struct ItemPipeline {
    stages: Vec<Box<dyn Stage + Send>>,
    stats: PipelineStats,
}

impl ItemPipeline {
    pub fn new(filter: &FilterSettings) -> Self {
        Self::with_stages(vec![
            Box::new(Normalize),
            Box::new(Dedup::default()),
            Box::new(MinSeeders::new(filter.min_seeders)),
            Box::new(BlockedKeywords::new(&filter.blocked_keywords)),
        ])
    }

    pub fn with_stages(stages: Vec<Box<dyn Stage + Send>>) -> Self {
        Self {
            stages,
            stats: PipelineStats::default(),
        }
    }

    pub fn process(&mut self, record: TorrentRecord) -> Option<TorrentRecord> {
        self.stats.processed += 1;
        let mut current = record;
        for stage in self.stages.iter_mut() {
            match stage.process(current) {
                Some(next) => current = next,
                None => {
                    *self.stats.dropped.entry(stage.name()).or_default() += 1;
                    return None;
                }
            }
        }
        self.stats.accepted += 1;
        Some(current)
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }
}
