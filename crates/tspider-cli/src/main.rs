use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;
use std::{env, io};

use anyhow::Context;
use chrono::Local;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use tokio::runtime;
use tspider::{
    scrap_page, AppConfig, OutputFormat, SinkTarget, TorrentScraper, TorrentScraperConfig,
};
use tspider_crawler::{crawl_site, CrawlerConfig, OnError, PageLocation};

const EXAMPLES: &str = "\
EXAMPLES:
    tspider crawl --urls https://example.com/browse
    tspider crawl --config config.yaml --output json
    tspider crawl --urls https://a.example,https://b.example --delay 5 --concurrent 2
    tspider scrap --file page.html --as-url https://example.com/search/?q=movie";

const CRAWL_LOG: &str = "tspider=info,tspider_crawler=info";
const SCRAP_LOG: &str = "tspider=info";

/// Torrent listing crawler
#[derive(Debug, Parser)]
#[command(version, after_help = EXAMPLES)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "crawl", after_help = EXAMPLES)]
    Crawl(CrawlArgs),
    #[command(name = "scrap")]
    Scrap(ScrapArgs),
    #[command(hide = true)]
    Completion,
}

/// Crawl seed pages and save the torrents found
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// Comma separated seed URLs, replacing the configured ones
    #[arg(long, short, value_delimiter = ',')]
    pub urls: Vec<String>,
    /// JSON or YAML configuration file
    #[arg(long, short, env = "TSPIDER_CONFIG", default_value = "config.json")]
    pub config: PathBuf,
    /// Override the configured output format
    #[arg(value_enum, long, short)]
    pub output: Option<OutputFormat>,
    /// Override the delay between downloads, in seconds
    #[arg(long)]
    pub delay: Option<f32>,
    /// Override the maximum concurrent downloads
    #[arg(long)]
    pub concurrent: Option<NonZeroUsize>,
    /// Override the user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override the download error handling strategy
    #[arg(value_enum, long)]
    pub on_dl_error: Option<OnError>,
    /// No SIGINT handling, outputs won't be closed on Ctrl-C
    #[arg(long)]
    pub no_sigint: bool,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

fn crawler_config(args: &CrawlArgs, config: &AppConfig) -> CrawlerConfig {
    let mut conf = CrawlerConfig::from(&config.spider_settings);
    if let Some(delay) = args.delay {
        conf.download_delay = delay;
    }
    if let Some(concurrent) = args.concurrent {
        conf.concurrent_requests = concurrent;
    }
    if let Some(user_agent) = &args.user_agent {
        conf.user_agent = user_agent.to_string();
    }
    if let Some(on_dl_error) = args.on_dl_error {
        conf.on_dl_error = on_dl_error;
    }
    if args.no_sigint {
        conf.handle_sigint = false;
    }
    conf
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let started_at = Local::now();
    let mut config = AppConfig::load(&args.config);
    config.apply_timestamp(&started_at);

    let urls: Vec<_> = args
        .urls
        .iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect();
    if !urls.is_empty() {
        config.default_urls = urls;
    }
    if config.default_urls.is_empty() {
        anyhow::bail!(
            "No URL to crawl, either pass them with `--urls URL1,URL2` \
             or list them under `default_urls` in {}",
            args.config.display()
        );
    }

    let format = args.output.unwrap_or(config.spider_settings.output_format);
    let crawler_conf = crawler_config(&args, &config);
    let scraper_conf = TorrentScraperConfig::from_app(&config, format);

    println!("Crawling {} URL(s):", scraper_conf.seeds.len());
    for url in &scraper_conf.seeds {
        println!("  {url}");
    }
    println!("Output format: {format}");
    println!(
        "Download delay: {}s, concurrent requests: {}",
        crawler_conf.download_delay, crawler_conf.concurrent_requests
    );
    println!("Started at {}", started_at.format("%Y-%m-%d %H:%M:%S"));

    let start = Instant::now();
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let res = rt.block_on(crawl_site::<TorrentScraper>(&crawler_conf, &scraper_conf));

    println!("Ended at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("Elapsed: {:.2}s", start.elapsed().as_secs_f64());
    let outputs: Vec<_> = scraper_conf
        .sinks
        .iter()
        .filter_map(SinkTarget::path)
        .filter(|path| path.exists())
        .collect();
    if !outputs.is_empty() {
        println!("Outputs:");
        for path in outputs {
            println!("  {}", path.display());
        }
    }

    res
}

/// Scrap a single page and print the torrents found as CSV
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("page").required(true))]
pub struct ScrapArgs {
    /// A local html page to scrap
    #[arg(group = "page", long)]
    pub file: Option<PathBuf>,
    /// A distant html page to scrap
    #[arg(group = "page", long)]
    pub url: Option<String>,
    /// Parse the local page as if it was downloaded from this URL
    #[arg(long, requires = "file")]
    pub as_url: Option<String>,
    /// Custom user agent to download the page
    #[arg(long, conflicts_with = "file")]
    pub ua: Option<String>,
    /// JSON or YAML configuration file
    #[arg(long, short, env = "TSPIDER_CONFIG", default_value = "config.json")]
    pub config: PathBuf,
}

pub fn scrap(args: ScrapArgs) -> anyhow::Result<()> {
    let (page, location) = if let Some(url) = args.url {
        let mut builder = reqwest::blocking::ClientBuilder::new();
        if let Some(ua) = args.ua {
            builder = builder.user_agent(ua);
        }
        let client = builder.build()?;
        let page = client
            .get(&url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .with_context(|| format!("Couldn't download {url}"))?;
        (page, PageLocation::Url(url))
    } else if let Some(path) = args.file {
        let page = fs_err::read_to_string(&path)?;
        match args.as_url {
            Some(url) => (page, PageLocation::Url(url)),
            None => (page, PageLocation::Path(path)),
        }
    } else {
        anyhow::bail!("Missing `url` or `file`");
    };

    let config = AppConfig::load(&args.config);
    let scraper_conf = TorrentScraperConfig {
        seeds: vec![],
        sinks: vec![SinkTarget::Csv(None, config.output_settings.csv.clone())],
        filter: config.filter_settings,
        site: config.site_settings,
    };
    scrap_page(&scraper_conf, page, location)
}

fn init_logger(default_filter: &str) {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", default_filter);
    }
    env_logger::init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            if !args.quiet {
                init_logger(CRAWL_LOG);
            }
            crawl(args)
        }
        SubCommand::Scrap(args) => {
            init_logger(SCRAP_LOG);
            scrap(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "tspider", &mut io::stdout());
            Ok(())
        }
    }
}
