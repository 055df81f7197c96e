use std::path::PathBuf;

use chrono::{Local, TimeZone};
use regex::Regex;
use tspider::sink::SinkTarget;
use tspider::{AppConfig, OutputFormat};
use tspider_crawler::CrawlerConfig;

#[test]
fn timestamp_token_is_replaced() {
    let mut config = AppConfig::default();
    config.output_settings.json_file = PathBuf::from("out_{timestamp}.json");
    config.apply_timestamp(&Local::now());

    let re = Regex::new(r"^out_\d{8}_\d{6}\.json$").unwrap();
    let json_file = config.output_settings.json_file.to_str().unwrap();
    assert!(re.is_match(json_file), "{json_file}");
    assert_eq!(config.output_settings.csv_file, PathBuf::from("torrents.csv"));
}

#[test]
fn timestamp_uses_the_given_time() {
    let mut config = AppConfig::default();
    config.output_settings.sqlite_file = PathBuf::from("data/{timestamp}/torrents.db");
    let at = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    config.apply_timestamp(&at);

    assert_eq!(
        config.output_settings.sqlite_file,
        PathBuf::from("data/20240102_030405/torrents.db")
    );
}

#[test]
fn missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load(dir.path().join("missing.json"));

    assert!(config.default_urls.is_empty());
    assert_eq!(config.spider_settings.download_delay, 2.0);
    assert_eq!(config.spider_settings.concurrent_requests.get(), 1);
    assert_eq!(config.spider_settings.output_format, OutputFormat::All);
    assert_eq!(config.filter_settings.min_seeders, 0);
    assert_eq!(config.filter_settings.blocked_keywords, ["spam", "fake", "virus"]);
    assert_eq!(config.filter_settings.max_pages, 10);
    assert_eq!(config.site_settings.host_marker, "rarbg");
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let config = AppConfig::load(&path);
    assert!(config.default_urls.is_empty());
    assert!(AppConfig::from_file(&path).is_err());
}

#[test]
fn missing_keys_take_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "default_urls": ["https://example.com/browse"],
            "spider_settings": {"download_delay": 0.5, "output_format": "csv"},
            "filter_settings": {"min_seeders": 3}
        }"#,
    )
    .unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    assert_eq!(config.default_urls, ["https://example.com/browse"]);
    assert_eq!(config.spider_settings.download_delay, 0.5);
    assert_eq!(config.spider_settings.concurrent_requests.get(), 1);
    assert_eq!(config.filter_settings.min_seeders, 3);
    assert_eq!(config.filter_settings.blocked_keywords, ["spam", "fake", "virus"]);
    assert_eq!(config.output_settings.json_file, PathBuf::from("torrents.json"));

    let targets = config
        .output_settings
        .targets(config.spider_settings.output_format);
    assert!(matches!(targets.as_slice(), [SinkTarget::Csv(Some(_), _)]));

    let crawler = CrawlerConfig::from(&config.spider_settings);
    assert_eq!(crawler.download_delay, 0.5);
    assert!(crawler.randomize_delay);
}

#[test]
fn yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        "default_urls:\n  - https://example.com/browse\n\
         filter_settings:\n  blocked_keywords: [cam]\n\
         site_settings:\n  host_marker: example\n",
    )
    .unwrap();

    let config = AppConfig::load(&path);
    assert_eq!(config.default_urls, ["https://example.com/browse"]);
    assert_eq!(config.filter_settings.blocked_keywords, ["cam"]);
    assert_eq!(config.site_settings.host_marker, "example");
    assert_eq!(config.site_settings.detail_marker, "/torrent/");
}

#[test]
fn all_format_targets_every_sink() {
    let config = AppConfig::default();
    let targets = config.output_settings.targets(OutputFormat::All);
    assert_eq!(targets.len(), 3);
    assert!(matches!(targets[0], SinkTarget::Json(_)));
    assert!(matches!(targets[2], SinkTarget::Sqlite(_)));
}
