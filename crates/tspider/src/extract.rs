//! Text helpers shared by the page parsers.
//!
//! Field extraction from raw page text goes through [`PatternChain`]s: ordered
//! lists of case-insensitive patterns where the first one that matches wins.
//! The order is part of the behavior, e.g. [`DURATION`] tries `MM:SS` before
//! `HH:MM:SS`.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use url::Url;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Trims and collapses every whitespace run into a single space.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Resolves `href` against the page URL, `None` when it can't be joined.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|url| url.to_string())
}

/// Parses a table cell counter, anything but plain digits counts as 0.
pub fn parse_count(text: &str) -> u32 {
    let text = text.trim();
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        text.parse().unwrap_or(0)
    } else {
        0
    }
}

pub struct PatternChain {
    patterns: Vec<Regex>,
}

impl PatternChain {
    /// Every pattern must have a capture group, it holds the extracted value.
    pub fn new(patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .unwrap_or_else(|e| panic!("Invalid pattern {p}: {e}"))
            })
            .collect();
        Self { patterns }
    }

    pub fn find(&self, text: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|re| re.captures(text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    pub fn find_count(&self, text: &str) -> Option<u32> {
        self.find(text).and_then(|n| n.parse().ok())
    }
}

pub static SIZE: Lazy<PatternChain> =
    Lazy::new(|| PatternChain::new(&[r"Size[:\s]*([0-9.]+\s*[KMGT]?B)"]));

pub static SEEDERS: Lazy<PatternChain> =
    Lazy::new(|| PatternChain::new(&[r"Seeders[:\s]*([0-9]+)"]));

pub static LEECHERS: Lazy<PatternChain> =
    Lazy::new(|| PatternChain::new(&[r"Leechers[:\s]*([0-9]+)"]));

pub static UPLOADED: Lazy<PatternChain> =
    Lazy::new(|| PatternChain::new(&[r"Uploaded[:\s]*([^<\n]+)"]));

pub static CATEGORY: Lazy<PatternChain> =
    Lazy::new(|| PatternChain::new(&[r"Category[:\s]*([^<\n]+)"]));

// NOTE: the unprefixed HH:MM:SS pattern also matches unrelated timestamps
pub static DURATION: Lazy<PatternChain> = Lazy::new(|| {
    PatternChain::new(&[
        r"Duration[:\s]*([0-9]+:[0-9]+)",
        r"Duration[:\s]*([0-9]+:[0-9]+:[0-9]+)",
        r"Runtime[:\s]*([0-9]+:[0-9]+:[0-9]+)",
        r"Runtime[:\s]*([0-9]+:[0-9]+)",
        r"Length[:\s]*([0-9]+:[0-9]+:[0-9]+)",
        r"Length[:\s]*([0-9]+:[0-9]+)",
        r"Time[:\s]*([0-9]+:[0-9]+:[0-9]+)",
        r"Time[:\s]*([0-9]+:[0-9]+)",
        r"([0-9]+:[0-9]+:[0-9]+)",
        r"Duration[:\s]*([0-9]+\s*min)",
        r"Runtime[:\s]*([0-9]+\s*min)",
        r"([0-9]+\s*min\s*[0-9]*\s*sec)",
    ])
});

/// Size patterns for pages of unknown sites, including a Chinese label.
pub static ANY_SIZE: Lazy<PatternChain> = Lazy::new(|| {
    PatternChain::new(&[
        r"Size[:\s]*([0-9.]+\s*[KMGT]?B)",
        r"大小[:\s]*([0-9.]+\s*[KMGT]?B)",
        r"([0-9.]+\s*[KMGT]B)",
    ])
});

pub static ANY_SEEDERS: Lazy<PatternChain> =
    Lazy::new(|| PatternChain::new(&[r"Seed[ers]*[:\s]*([0-9]+)"]));

pub static ANY_LEECHERS: Lazy<PatternChain> =
    Lazy::new(|| PatternChain::new(&[r"Leech[ers]*[:\s]*([0-9]+)"]));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MagnetInfo {
    /// The `dn` display name
    pub name: Option<String>,
    /// The lowercased BitTorrent info hash from `xt=urn:btih:`
    pub info_hash: Option<String>,
}

/// Reads the display name and info hash of a magnet URI.
pub fn parse_magnet(uri: &str) -> Option<MagnetInfo> {
    let query = uri.strip_prefix("magnet:")?.trim_start_matches('?');
    let mut info = MagnetInfo::default();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "dn" if info.name.is_none() => info.name = Some(value.into_owned()),
            "xt" if info.info_hash.is_none() => {
                if let Some(hash) = value.strip_prefix("urn:btih:") {
                    info.info_hash = Some(hash.to_lowercase());
                }
            }
            _ => {}
        }
    }
    Some(info)
}
