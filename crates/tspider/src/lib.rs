pub mod config;
pub mod extract;
pub mod parsers;
pub mod pipeline;
pub mod record;
pub mod scraper;
pub mod sink;

pub use config::{
    AppConfig, FilterSettings, OutputFormat, OutputSettings, SiteProfile, SpiderSettings,
};
pub use pipeline::{ItemPipeline, PipelineStats};
pub use record::{RecordBuilder, TorrentRecord, FIELDS};
pub use self::scraper::{scrap_page, TorrentScraper, TorrentScraperConfig};
pub use sink::{Sink, SinkTarget};

pub use tspider_crawler;
