use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tspider_crawler::Request;
use url::Url;

use super::{
    element_text, href, selector, source_url, try_selector, Callback, CrawlMeta, Document,
    ParseOutput,
};
use crate::config::SiteProfile;
use crate::extract::{parse_count, CATEGORY, DURATION, LEECHERS, SEEDERS, SIZE, UPLOADED};
use crate::record::{RecordBuilder, TorrentRecord};

/// Search rows shorter than this don't carry the listing columns.
const MIN_ROW_CELLS: usize = 8;

const CATEGORY_CELL: usize = 0;
const UPLOADED_CELL: usize = 3;
const SIZE_CELL: usize = 4;
const SEEDERS_CELL: usize = 5;
const LEECHERS_CELL: usize = 6;

static TABLE_ROWS: Lazy<Selector> = Lazy::new(|| selector("table tr"));
static CELLS: Lazy<Selector> = Lazy::new(|| selector("td"));
static SECOND_CELL_LINK: Lazy<Selector> = Lazy::new(|| selector("td:nth-child(2) a"));
static MAGNET_LINKS: Lazy<Selector> = Lazy::new(|| selector(r#"a[href^="magnet:"]"#));
static H2: Lazy<Selector> = Lazy::new(|| selector("h2"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));

const NEXT_LABELS: [&str; 3] = ["next", "下一页", ">"];

/// Parser for the search and detail pages of one specific site.
pub struct SiteParser {
    profile: SiteProfile,
    name_link: Selector,
    search_links: Selector,
    download_link: Selector,
}

impl SiteParser {
    pub fn new(profile: SiteProfile) -> anyhow::Result<Self> {
        let href_contains = |marker: &str| format!(r#"a[href*="{}"]"#, marker.replace('"', "\\\""));
        Ok(Self {
            name_link: try_selector(&format!("td {}", href_contains(&profile.detail_marker)))?,
            search_links: try_selector(&href_contains(&profile.search_marker))?,
            download_link: try_selector(&href_contains(&profile.download_marker))?,
            profile,
        })
    }

    fn on_site(&self, url: &Url) -> bool {
        let host_marker = self.profile.host_marker.to_lowercase();
        !host_marker.is_empty() && url.as_str().to_lowercase().contains(&host_marker)
    }

    pub fn is_detail(&self, url: &Url) -> bool {
        self.on_site(url) && url.as_str().contains(&self.profile.detail_marker)
    }

    pub fn is_search(&self, url: &Url) -> bool {
        self.on_site(url) && url.as_str().contains(&self.profile.search_marker)
    }

    /// Turns every result row into a pending record travelling with a request
    /// for its detail page.
    pub fn parse_search(&self, doc: &Document, meta: &CrawlMeta, max_pages: usize) -> ParseOutput {
        let mut out = ParseOutput::default();

        let rows: Vec<_> = doc.select(&TABLE_ROWS).collect();
        log::debug!("Found {} table rows on {}", rows.len(), doc.url());

        for row in rows.into_iter().skip(1) {
            let link = row
                .select(&self.name_link)
                .next()
                .or_else(|| row.select(&SECOND_CELL_LINK).next());
            let Some(link) = link else { continue };

            let name = element_text(link);
            let Some(href) = href(link) else { continue };
            if name.is_empty() {
                continue;
            }
            let Some(detail_url) = doc.resolve(href) else { continue };

            let cells: Vec<_> = row.select(&CELLS).collect();
            if cells.len() < MIN_ROW_CELLS {
                log::debug!("Skipping row of {} cells: {name}", cells.len());
                continue;
            }

            let mut builder = RecordBuilder::new(detail_url.clone());
            builder.name(&name);
            if let Some(category) = cell_text(&cells, CATEGORY_CELL) {
                builder.category(category);
            }
            if let Some(uploaded) = cell_text(&cells, UPLOADED_CELL) {
                builder.upload_time(uploaded);
            }
            if let Some(size) = cell_text(&cells, SIZE_CELL) {
                builder.size(size);
            }
            builder
                .seeders(parse_count(&element_text(cells[SEEDERS_CELL])))
                .leechers(parse_count(&element_text(cells[LEECHERS_CELL])));

            let pending = Callback::SiteDetail(Some(Box::new(builder.build())));
            out.requests.push(Request::new(detail_url, meta.follow(pending)));
        }

        if let Some(url) = self.next_page(doc) {
            if meta.can_paginate(max_pages) {
                out.requests.push(Request::new(url, meta.next_page(Callback::SiteSearch)));
            } else {
                log::debug!("Reached {max_pages} pages from {}", meta.source_url);
            }
        }

        out
    }

    /// Completes the pending record of a search result, or builds one from
    /// the page alone. Always emits exactly one record.
    pub fn parse_detail(
        &self,
        doc: &Document,
        meta: &CrawlMeta,
        pending: Option<TorrentRecord>,
    ) -> ParseOutput {
        let mut builder = match pending {
            Some(record) => RecordBuilder::enrich(record),
            None => {
                let mut builder = RecordBuilder::new(source_url(doc, meta));
                if let Some(title) = self.title(doc) {
                    builder.name(&title);
                }
                builder
            }
        };

        if let Some(url) = doc
            .select(&self.download_link)
            .find_map(href)
            .and_then(|href| doc.resolve(href))
        {
            builder.torrent_url(url);
        }
        if let Some(magnet) = doc.select(&MAGNET_LINKS).find_map(href) {
            builder.magnet_url(magnet);
        }

        let text = doc.body();
        if let Some(size) = SIZE.find(text) {
            builder.size(size);
        }
        if let Some(seeders) = SEEDERS.find_count(text) {
            builder.seeders(seeders);
        }
        if let Some(leechers) = LEECHERS.find_count(text) {
            builder.leechers(leechers);
        }
        if let Some(uploaded) = UPLOADED.find(text) {
            builder.upload_time(uploaded);
        }
        if let Some(category) = CATEGORY.find(text) {
            builder.category(category);
        }
        if let Some(duration) = DURATION.find(text) {
            builder.duration(duration);
        }

        ParseOutput {
            records: vec![builder.build()],
            requests: vec![],
        }
    }

    fn title(&self, doc: &Document) -> Option<String> {
        doc.first_text(&[&*H2]).or_else(|| {
            doc.first_text(&[&*TITLE])
                .map(|title| title.replace(&self.profile.title_suffix, "").trim().to_string())
                .filter(|title| !title.is_empty())
        })
    }

    fn next_page(&self, doc: &Document) -> Option<String> {
        doc.select(&self.search_links)
            .filter(|link| {
                let text = element_text(*link).to_lowercase();
                NEXT_LABELS.iter().any(|label| text.contains(label))
            })
            .filter_map(href)
            .find(|href| href.contains("search"))
            .and_then(|href| doc.resolve(href))
    }
}

fn cell_text(cells: &[ElementRef], index: usize) -> Option<String> {
    cells
        .get(index)
        .map(|cell| element_text(*cell))
        .filter(|text| !text.is_empty())
}
