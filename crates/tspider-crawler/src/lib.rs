mod config;
mod crawler;
mod limiter;
mod scrapable;

pub use config::{CrawlerConfig, OnError};
pub use crawler::crawl_site;
pub use limiter::RateLimiter;
pub use scrapable::{CountedTx, Page, PageLocation, Request, Scrapable, ScrapingContext};

pub use anyhow;
