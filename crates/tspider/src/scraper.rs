use std::collections::HashSet;

use anyhow::{anyhow, Context};
use tspider_crawler::{Page, PageLocation, Request, Scrapable, ScrapingContext};
use url::Url;

use crate::config::{AppConfig, FilterSettings, OutputFormat, SiteProfile};
use crate::parsers::{CrawlMeta, Document, Parsers};
use crate::pipeline::ItemPipeline;
use crate::sink::{Sink, SinkTarget};

#[derive(Debug, Clone)]
pub struct TorrentScraperConfig {
    pub seeds: Vec<String>,
    pub sinks: Vec<SinkTarget>,
    pub filter: FilterSettings,
    pub site: SiteProfile,
}

impl TorrentScraperConfig {
    pub fn from_app(config: &AppConfig, format: OutputFormat) -> Self {
        Self {
            seeds: config.default_urls.clone(),
            sinks: config.output_settings.targets(format),
            filter: config.filter_settings.clone(),
            site: config.site_settings.clone(),
        }
    }
}

/// Seed host, with its port when the seed spells one out.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AllowedDomain {
    host: String,
    port: Option<u16>,
}

impl AllowedDomain {
    fn from_seed(seed: &str) -> Option<Self> {
        let url = Url::parse(seed).ok()?;
        Some(Self {
            host: url.host_str()?.to_lowercase(),
            port: url.port(),
        })
    }

    fn matches(&self, host: &str, port: Option<u16>) -> bool {
        let on_host = host == self.host
            || host
                .strip_suffix(self.host.as_str())
                .map_or(false, |sub| sub.ends_with('.'));
        on_host && self.port.map_or(true, |p| port == Some(p))
    }
}

/// Parses pages, runs the records through the item pipeline, then writes
/// every accepted one to all sinks.
pub struct TorrentScraper {
    parsers: Parsers,
    pipeline: ItemPipeline,
    sinks: Vec<Box<dyn Sink>>,
    allowed_domains: Vec<AllowedDomain>,
    /// URLs already requested, seeds included
    enqueued: HashSet<String>,
}

impl TorrentScraper {
    /// Whether `url` is on one of the seed hosts or their subdomains. A seed
    /// with an explicit port only allows that port.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            log::debug!("Invalid URL: {url}");
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        let port = url.port_or_known_default();
        self.allowed_domains
            .iter()
            .any(|domain| domain.matches(&host, port))
    }

    /// Marks `url` as requested, returns false when it already was.
    pub fn first_request(&mut self, url: &str) -> bool {
        self.enqueued.insert(url.to_string())
    }

    /// Parses a page and pushes its records down to the sinks, returning the
    /// follow-up requests.
    pub fn process_page(
        &mut self,
        page: Page<CrawlMeta>,
    ) -> anyhow::Result<Vec<Request<CrawlMeta>>> {
        let Page {
            body,
            location,
            meta,
        } = page;
        let url = match page_url(&location) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Skipping page {location}: {e:#}");
                return Ok(vec![]);
            }
        };

        let doc = Document::new(body, url);
        let output = self.parsers.parse(&doc, meta);
        log::debug!(
            "Parsed {location}: {} records, {} follow-ups",
            output.records.len(),
            output.requests.len()
        );

        for record in output.records {
            let Some(record) = self.pipeline.process(record) else {
                continue;
            };
            for sink in self.sinks.iter_mut() {
                sink.write(&record)
                    .with_context(|| format!("Couldn't save {}", record.name))?;
            }
        }

        Ok(output.requests)
    }
}

impl Scrapable for TorrentScraper {
    type Config = TorrentScraperConfig;
    type Meta = CrawlMeta;

    fn new(config: &Self::Config) -> anyhow::Result<Self> {
        let parsers = Parsers::new(&config.site, config.filter.max_pages)?;
        let sinks = config
            .sinks
            .iter()
            .map(SinkTarget::open)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let allowed_domains = config
            .seeds
            .iter()
            .filter_map(|seed| AllowedDomain::from_seed(seed))
            .collect();
        Ok(Self {
            parsers,
            pipeline: ItemPipeline::new(&config.filter),
            sinks,
            allowed_domains,
            enqueued: config.seeds.iter().cloned().collect(),
        })
    }

    fn seed(config: &Self::Config) -> Vec<Request<CrawlMeta>> {
        config
            .seeds
            .iter()
            .map(|url| Request::new(url.clone(), CrawlMeta::seed(url.clone())))
            .collect()
    }

    fn accept(&self, url: &str) -> bool {
        self.is_allowed(url)
    }

    fn scrap(
        &mut self,
        page: Page<CrawlMeta>,
        ctx: &mut ScrapingContext<CrawlMeta>,
    ) -> anyhow::Result<()> {
        for request in self.process_page(page)? {
            if self.first_request(&request.url) {
                ctx.send_request(request);
            } else {
                log::debug!("Skipping already requested URL: {}", request.url);
            }
        }
        Ok(())
    }

    fn finalizer(&mut self) -> anyhow::Result<()> {
        let mut res = Ok(());
        for sink in self.sinks.iter_mut() {
            // Every sink gets closed, the first error is reported
            let closed = sink
                .close()
                .with_context(|| format!("Couldn't close {}", sink.describe()));
            res = res.and(closed);
        }
        log::info!("Items: {}", self.pipeline.stats());
        res
    }
}

fn page_url(location: &PageLocation) -> anyhow::Result<Url> {
    match location {
        PageLocation::Url(url) => Url::parse(url).with_context(|| format!("Invalid URL {url}")),
        PageLocation::Path(path) => {
            let path = fs_err::canonicalize(path)?;
            Url::from_file_path(&path).map_err(|_| anyhow!("Invalid path {}", path.display()))
        }
    }
}

/// Scraps a single page outside of a crawl, follow-ups are only logged.
pub fn scrap_page(
    config: &TorrentScraperConfig,
    body: String,
    location: PageLocation,
) -> anyhow::Result<()> {
    let mut scraper = TorrentScraper::new(config)?;
    let meta = match &location {
        PageLocation::Url(url) => CrawlMeta::seed(url.clone()),
        PageLocation::Path(_) => CrawlMeta::seed(String::new()),
    };
    let page = Page {
        body,
        location,
        meta,
    };
    let res = scraper.process_page(page).map(|requests| {
        for request in requests {
            log::info!("Not following {}", request.url);
        }
    });
    let finalized = scraper.finalizer();
    res.and(finalized)
}
