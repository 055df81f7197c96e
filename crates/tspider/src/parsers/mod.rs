//! Page parsers, each turning one fetched page into records and follow-ups.
//!
//! Seed and listing pages are routed by URL shape: pages of the configured
//! site get the specialized [`SiteParser`], anything else the generic
//! link-discovery parser. Pages reached through a follow-up are parsed by the
//! handler named in their [`Callback`].

mod generic;
mod site;

use anyhow::anyhow;
use scraper::html::Select;
use scraper::{ElementRef, Html, Selector};
use tspider_crawler::Request;
use url::Url;

use crate::config::SiteProfile;
use crate::extract::{clean_text, resolve_url};
use crate::record::TorrentRecord;

pub use self::generic::{parse_detail, parse_listing};
pub use self::site::SiteParser;

/// Handler of the page a request fetches.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    /// Routed by URL shape
    Listing,
    Detail,
    SiteSearch,
    /// Carries the record built from a search result, if any
    SiteDetail(Option<Box<TorrentRecord>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlMeta {
    /// Seed the request descends from
    pub source_url: String,
    pub callback: Callback,
    /// Next pages followed since the seed
    pub page_depth: usize,
}

impl CrawlMeta {
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            source_url: url.into(),
            callback: Callback::Listing,
            page_depth: 0,
        }
    }

    pub fn follow(&self, callback: Callback) -> Self {
        Self {
            source_url: self.source_url.clone(),
            callback,
            page_depth: self.page_depth,
        }
    }

    pub fn next_page(&self, callback: Callback) -> Self {
        Self {
            page_depth: self.page_depth + 1,
            ..self.follow(callback)
        }
    }

    pub fn can_paginate(&self, max_pages: usize) -> bool {
        self.page_depth < max_pages
    }
}

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub records: Vec<TorrentRecord>,
    pub requests: Vec<Request<CrawlMeta>>,
}

/// A parsed HTML page along with the URL it was fetched from.
pub struct Document {
    html: Html,
    url: Url,
    body: String,
}

impl Document {
    pub fn new(body: impl Into<String>, url: Url) -> Self {
        let body = body.into();
        Self {
            html: Html::parse_document(&body),
            url,
            body,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Raw markup, mined by the field patterns.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> Select<'a, 'b> {
        self.html.select(selector)
    }

    pub fn resolve(&self, href: &str) -> Option<String> {
        let resolved = resolve_url(&self.url, href);
        if resolved.is_none() {
            log::debug!("Couldn't resolve {href} against {}", self.url);
        }
        resolved
    }

    /// First non-empty element text, selectors are tried in order.
    pub fn first_text(&self, selectors: &[&Selector]) -> Option<String> {
        selectors.iter().find_map(|selector| {
            self.select(selector)
                .map(element_text)
                .find(|text| !text.is_empty())
        })
    }
}

/// Seed of the request, the page itself when unknown.
pub(crate) fn source_url(doc: &Document, meta: &CrawlMeta) -> String {
    if meta.source_url.is_empty() {
        doc.url().to_string()
    } else {
        meta.source_url.clone()
    }
}

pub(crate) fn element_text(el: ElementRef) -> String {
    clean_text(&el.text().collect::<String>())
}

pub(crate) fn href<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    el.value()
        .attr("href")
        .map(str::trim)
        .filter(|href| !href.is_empty())
}

pub(crate) fn selector(css: &str) -> Selector {
    try_selector(css).unwrap_or_else(|e| panic!("{e}"))
}

pub(crate) fn try_selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {css}: {e:?}"))
}

/// Dispatches pages to the parser named by their request.
pub struct Parsers {
    site: SiteParser,
    max_pages: usize,
}

impl Parsers {
    pub fn new(profile: &SiteProfile, max_pages: usize) -> anyhow::Result<Self> {
        Ok(Self {
            site: SiteParser::new(profile.clone())?,
            max_pages,
        })
    }

    pub fn parse(&self, doc: &Document, mut meta: CrawlMeta) -> ParseOutput {
        let callback = std::mem::replace(&mut meta.callback, Callback::Listing);
        match callback {
            Callback::Listing if self.site.is_detail(doc.url()) => {
                self.site.parse_detail(doc, &meta, None)
            }
            Callback::Listing if self.site.is_search(doc.url()) => {
                self.site.parse_search(doc, &meta, self.max_pages)
            }
            Callback::Listing => parse_listing(doc, &meta, self.max_pages),
            Callback::Detail => parse_detail(doc, &meta),
            Callback::SiteSearch => self.site.parse_search(doc, &meta, self.max_pages),
            Callback::SiteDetail(pending) => self.site.parse_detail(doc, &meta, pending.map(|r| *r)),
        }
    }
}
