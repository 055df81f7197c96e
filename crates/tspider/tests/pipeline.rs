use tspider::pipeline::{BlockedKeywords, Dedup, MinSeeders, Normalize, Stage};
use tspider::record::{is_timestamp, now_timestamp};
use tspider::{FilterSettings, ItemPipeline, TorrentRecord};

fn record(name: &str) -> TorrentRecord {
    TorrentRecord {
        name: name.into(),
        source_url: "https://example.com".into(),
        crawl_time: now_timestamp(),
        ..Default::default()
    }
}

#[test]
fn normalize_fills_name_and_crawl_time() {
    let blank = TorrentRecord {
        crawl_time: String::new(),
        ..record("   ")
    };
    let normalized = Normalize.process(blank).unwrap();
    assert_eq!(normalized.name, "Unknown");
    assert!(is_timestamp(&normalized.crawl_time));

    let normalized = Normalize.process(record("  Movie ")).unwrap();
    assert_eq!(normalized.name, "Movie");
}

#[test]
fn dedup_on_torrent_url() {
    let mut dedup = Dedup::default();
    let mut first = record("a");
    first.torrent_url = Some("https://example.com/1.torrent".into());
    let mut second = record("b");
    second.torrent_url = first.torrent_url.clone();

    assert!(dedup.process(first).is_some());
    assert!(dedup.process(second).is_none());
}

#[test]
fn dedup_on_magnet_url() {
    let mut dedup = Dedup::default();
    let mut first = record("a");
    first.torrent_url = Some("https://example.com/1.torrent".into());
    first.magnet_url = Some("magnet:?xt=urn:btih:ABCD".into());
    let mut second = record("b");
    second.torrent_url = Some("https://example.com/2.torrent".into());
    second.magnet_url = first.magnet_url.clone();

    assert!(dedup.process(first).is_some());
    assert!(dedup.process(second).is_none());

    // The dropped record still marked its torrent URL as seen
    let mut third = record("c");
    third.torrent_url = Some("https://example.com/2.torrent".into());
    assert!(dedup.process(third).is_none());
}

#[test]
fn dedup_ignores_records_without_urls() {
    let mut dedup = Dedup::default();
    assert!(dedup.process(record("a")).is_some());
    assert!(dedup.process(record("a")).is_some());
}

#[test]
fn min_seeders() {
    let mut seeded = record("a");
    seeded.seeders = Some(3);

    assert!(MinSeeders::new(5).process(seeded.clone()).is_none());
    assert!(MinSeeders::new(0).process(seeded).is_some());
    assert!(MinSeeders::new(1).process(record("no seeders")).is_none());
}

#[test]
fn blocked_keywords_ignore_case() {
    let mut stage = BlockedKeywords::new(&["FAKE".to_string()]);
    assert!(stage.process(record("Totally Fake Movie")).is_none());
    assert!(stage.process(record("Real Movie")).is_some());
}

#[test]
fn pipeline_counts_drops_per_stage() {
    let filter = FilterSettings {
        min_seeders: 5,
        ..Default::default()
    };
    let mut pipeline = ItemPipeline::new(&filter);

    let mut good = record("Good Movie");
    good.seeders = Some(10);
    good.torrent_url = Some("https://example.com/1.torrent".into());
    let duplicate = good.clone();
    let mut fake = record("Fake Movie");
    fake.seeders = Some(10);
    let mut unseeded = record("Lonely Movie");
    unseeded.seeders = Some(1);

    assert_eq!(pipeline.process(good.clone()), Some(good));
    assert!(pipeline.process(duplicate).is_none());
    assert!(pipeline.process(fake).is_none());
    assert!(pipeline.process(unseeded).is_none());

    let stats = pipeline.stats();
    assert_eq!(stats.processed, 4);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.dropped.get("dedup"), Some(&1));
    assert_eq!(stats.dropped.get("blocked_keywords"), Some(&1));
    assert_eq!(stats.dropped.get("min_seeders"), Some(&1));
}
