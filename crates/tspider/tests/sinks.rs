use rusqlite::Connection;
use tspider::record::now_timestamp;
use tspider::sink::{CsvWriterConfig, SinkTarget};
use tspider::{RecordBuilder, TorrentRecord, FIELDS};

fn records() -> Vec<TorrentRecord> {
    vec![
        TorrentRecord {
            name: "Movie".into(),
            torrent_url: Some("https://example.com/1.torrent".into()),
            magnet_url: Some("magnet:?xt=urn:btih:ABCD&dn=Movie".into()),
            size: Some("1.4 GB".into()),
            seeders: Some(120),
            leechers: Some(10),
            upload_time: Some("2024-01-01".into()),
            category: Some("Movies".into()),
            duration: Some("01:12:34".into()),
            description: Some("A movie, with \"quotes\"".into()),
            source_url: "https://example.com/search".into(),
            crawl_time: now_timestamp(),
        },
        TorrentRecord {
            name: "Bare".into(),
            source_url: "https://example.com/search".into(),
            crawl_time: now_timestamp(),
            ..Default::default()
        },
    ]
}

#[test]
fn json_sink_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out.json");
    let records = records();

    let mut sink = SinkTarget::Json(path.clone()).open().unwrap();
    for record in &records {
        sink.write(record).unwrap();
    }
    sink.close().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let written: Vec<TorrentRecord> = serde_json::from_str(&content).unwrap();
    assert_eq!(written, records);

    let raw: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert!(raw[1]["magnet_url"].is_null());
}

#[test]
fn json_sink_without_records_is_an_empty_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");

    let mut sink = SinkTarget::Json(path.clone()).open().unwrap();
    sink.close().unwrap();

    let written: Vec<TorrentRecord> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(written.is_empty());
}

#[test]
fn csv_sink_writes_header_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");

    let mut sink = SinkTarget::Csv(Some(path.clone()), CsvWriterConfig::default())
        .open()
        .unwrap();
    for record in records() {
        sink.write(&record).unwrap();
    }
    sink.close().unwrap();

    let mut rdr = csv::Reader::from_path(&path).unwrap();
    assert_eq!(rdr.headers().unwrap(), FIELDS.as_slice());

    let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "Movie");
    assert_eq!(&rows[0][4], "120");
    assert_eq!(&rows[0][9], "A movie, with \"quotes\"");
    assert_eq!(&rows[1][0], "Bare");
    assert_eq!(&rows[1][1], "");
    assert_eq!(&rows[1][4], "");
}

#[test]
fn csv_sink_honors_delimiter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.tsv");
    let config = CsvWriterConfig {
        delimiter: '\t',
        ..Default::default()
    };

    let mut sink = SinkTarget::Csv(Some(path.clone()), config).open().unwrap();
    sink.close().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, format!("{}\r\n", FIELDS.join("\t")));
}

#[test]
fn csv_sink_honors_terminator_and_escape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let config: CsvWriterConfig =
        serde_json::from_str(r#"{"terminator": "\n", "escape": "\\"}"#).unwrap();
    assert_eq!(config.delimiter, ',');

    let mut sink = SinkTarget::Csv(Some(path.clone()), config).open().unwrap();
    let mut builder = RecordBuilder::new("https://example.com");
    builder.name(r#"The "Movie""#);
    sink.write(&builder.build()).unwrap();
    sink.close().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.split('\n');
    assert_eq!(lines.next(), Some(FIELDS.join(",").as_str()));
    assert!(lines.next().unwrap().starts_with(r#""The \"Movie\"","#));
    assert!(!content.contains('\r'));
}

#[test]
fn sqlite_sink_inserts_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db/out.db");

    let mut sink = SinkTarget::Sqlite(path.clone()).open().unwrap();
    for record in records() {
        sink.write(&record).unwrap();
    }
    sink.close().unwrap();

    let conn = Connection::open(&path).unwrap();
    let mut stmt = conn
        .prepare("SELECT name, seeders, leechers, magnet_url, created_at FROM torrents ORDER BY id")
        .unwrap();
    let rows: Vec<(String, i64, i64, Option<String>, Option<String>)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .unwrap()
        .map(Result::unwrap)
        .collect();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, "Movie");
    assert_eq!((rows[0].1, rows[0].2), (120, 10));
    assert!(rows[0].3.is_some());
    assert_eq!(rows[1].0, "Bare");
    assert_eq!((rows[1].1, rows[1].2), (0, 0));
    assert_eq!(rows[1].3, None);
    assert!(rows.iter().all(|row| row.4.is_some()));
}

#[test]
fn sqlite_sink_appends_to_existing_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.db");

    for _ in 0..2 {
        let mut sink = SinkTarget::Sqlite(path.clone()).open().unwrap();
        sink.write(&records()[0]).unwrap();
        sink.close().unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM torrents", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}
