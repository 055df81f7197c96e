use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tspider_crawler::Request;

use super::{
    element_text, href, selector, source_url, Callback, CrawlMeta, Document, ParseOutput,
};
use crate::extract::{parse_magnet, ANY_LEECHERS, ANY_SEEDERS, ANY_SIZE};
use crate::record::RecordBuilder;

const MAX_DETAIL_LINKS: usize = 10;

static TORRENT_LINKS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"a[href$=".torrent"]"#,
        r#"a[href*="download"]"#,
        r#"a[href*="torrent"]"#,
        r#"a[href*="magnet:"]"#,
    ]
    .into_iter()
    .map(selector)
    .collect()
});

static DETAIL_LINKS: Lazy<Selector> =
    Lazy::new(|| selector(r#"a[href*="details"], a[href*="view"], a[href*="torrent/"]"#));

static PAGE_LINKS: Lazy<Selector> = Lazy::new(|| selector(r#"a[href*="page"]"#));
static NEXT_CLASS: Lazy<Selector> = Lazy::new(|| selector("a.next"));
static NEXT_REL: Lazy<Selector> = Lazy::new(|| selector(r#"a[rel="next"]"#));

static DETAIL_DOWNLOADS: Lazy<Selector> =
    Lazy::new(|| selector(r#"a[href$=".torrent"], a[href*="download"]"#));
static MAGNET_LINKS: Lazy<Selector> = Lazy::new(|| selector(r#"a[href^="magnet:"]"#));

static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static CLASS_TITLE: Lazy<Selector> = Lazy::new(|| selector(".title"));
static ID_TITLE: Lazy<Selector> = Lazy::new(|| selector("#title"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));

static CLASS_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector(".description"));
static ID_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector("#description"));
static CLASS_CONTENT: Lazy<Selector> = Lazy::new(|| selector(".content"));

/// Link discovery on pages of unknown sites.
///
/// Emits a record per torrent or magnet link, then follows up to
/// [`MAX_DETAIL_LINKS`] detail pages and a single next page.
pub fn parse_listing(doc: &Document, meta: &CrawlMeta, max_pages: usize) -> ParseOutput {
    let mut out = ParseOutput::default();

    for sel in TORRENT_LINKS.iter() {
        for link in doc.select(sel) {
            let Some(href) = href(link) else { continue };
            let mut builder = RecordBuilder::new(source_url(doc, meta));
            if href.starts_with("magnet:") {
                builder.magnet_url(href);
            } else if href.ends_with(".torrent") || href.to_lowercase().contains("download") {
                let Some(url) = doc.resolve(href) else { continue };
                builder.torrent_url(url);
            } else {
                continue;
            }
            if let Some(name) = link_name(link, href) {
                builder.name(&name);
            }
            out.records.push(builder.build());
        }
    }

    let mut seen = HashSet::new();
    let details = doc
        .select(&DETAIL_LINKS)
        .filter_map(href)
        .filter_map(|href| doc.resolve(href))
        .filter(|url| seen.insert(url.clone()))
        .take(MAX_DETAIL_LINKS);
    for url in details {
        out.requests.push(Request::new(url, meta.follow(Callback::Detail)));
    }

    if let Some(url) = next_page(doc) {
        if meta.can_paginate(max_pages) {
            out.requests.push(Request::new(url, meta.next_page(Callback::Listing)));
        } else {
            log::debug!("Reached {max_pages} pages from {}", meta.source_url);
        }
    }

    out
}

/// Detail pages reached from [`parse_listing`], one record per download or
/// magnet link, all sharing the fields mined from the page.
pub fn parse_detail(doc: &Document, meta: &CrawlMeta) -> ParseOutput {
    let name = doc.first_text(&[&*H1, &*CLASS_TITLE, &*ID_TITLE, &*TITLE]);
    let description = doc.first_text(&[&*CLASS_DESCRIPTION, &*ID_DESCRIPTION, &*CLASS_CONTENT]);
    let text = doc.body();
    let size = ANY_SIZE.find(text);
    let seeders = ANY_SEEDERS.find_count(text);
    let leechers = ANY_LEECHERS.find_count(text);

    let mut page = RecordBuilder::new(source_url(doc, meta));
    if let Some(name) = &name {
        page.name(name);
    }
    if let Some(size) = size {
        page.size(size);
    }
    if let Some(seeders) = seeders {
        page.seeders(seeders);
    }
    if let Some(leechers) = leechers {
        page.leechers(leechers);
    }
    if let Some(description) = &description {
        page.description(description);
    }

    let downloads = doc
        .select(&DETAIL_DOWNLOADS)
        .filter_map(href)
        .filter_map(|href| doc.resolve(href));
    let magnets = doc.select(&MAGNET_LINKS).filter_map(href);

    let mut out = ParseOutput::default();
    for url in downloads {
        let mut builder = page.clone();
        builder.torrent_url(url);
        out.records.push(builder.build());
    }
    for magnet in magnets {
        let mut builder = page.clone();
        builder.magnet_url(magnet);
        out.records.push(builder.build());
    }
    out
}

/// Link text, then `title` attribute, then magnet display name.
fn link_name(link: ElementRef, href: &str) -> Option<String> {
    let text = element_text(link);
    if !text.is_empty() {
        return Some(text);
    }
    link.value()
        .attr("title")
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(String::from)
        .or_else(|| parse_magnet(href).and_then(|magnet| magnet.name))
}

fn next_page(doc: &Document) -> Option<String> {
    let by_text = |label: &str| {
        doc.select(&PAGE_LINKS)
            .find(|link| element_text(*link).contains(label))
            .and_then(href)
    };
    by_text("Next")
        .or_else(|| by_text("下一页"))
        .or_else(|| doc.select(&NEXT_CLASS).find_map(href))
        .or_else(|| doc.select(&NEXT_REL).find_map(href))
        .and_then(|href| doc.resolve(href))
}
