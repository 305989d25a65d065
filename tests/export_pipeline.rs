//! Export pipeline: CSV escaping, image resilience and progress.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use crate_digger::catalog::CollectionItem;
use crate_digger::export::{
    build_export, collection_csv, record_to_csv_row, HttpImageFetcher, ImageFetcher, CSV_HEADER,
};
use crate_digger::models::{DraftRecord, VinylRecord};
use crate_digger::progress::{ExportProgressEvent, ExportProgressReporter, NoProgress};

#[derive(Default)]
struct Collect(Mutex<Vec<u8>>);

impl Collect {
    fn percents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl ExportProgressReporter for Collect {
    fn report(&self, event: ExportProgressEvent) {
        if let ExportProgressEvent::Images { percent, .. } = event {
            self.0.lock().unwrap().push(percent);
        }
    }
}

/// Serves canned bytes per URL; anything else fails.
struct MapFetcher(HashMap<String, Vec<u8>>);

#[async_trait]
impl ImageFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.0
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 for {}", url))
    }
}

fn record(artist: &str, title: &str, images: &[&str]) -> VinylRecord {
    VinylRecord::from_draft(
        DraftRecord {
            artist: artist.to_string(),
            title: title.to_string(),
            ..Default::default()
        },
        images.iter().map(|s| s.to_string()).collect(),
        None,
    )
}

fn unpack(bytes: &[u8]) -> HashMap<String, Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut out = HashMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        out.insert(file.name().to_string(), data);
    }
    out
}

#[test]
fn test_csv_round_trips_quotes_and_commas() {
    let mut r = record("Crosby, Stills & Nash", "\"Déjà vu\"", &[]);
    r.description = "Gatefold, \"textured\" sleeve; small ring wear,\nseam split".to_string();
    r.discogs_release_id = Some(367_083);

    let csv_text = format!("{}\n{}", CSV_HEADER, record_to_csv_row(&r));
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.len(), 13);

    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(&row[0], "Crosby, Stills & Nash");
    assert_eq!(&row[1], "\"Déjà vu\"");
    assert_eq!(&row[10], "367083");
    assert_eq!(&row[11], r.description);
    assert!(row[12].ends_with('Z'));
}

#[test]
fn test_remote_rows_leave_country_condition_notes_empty() {
    let item: CollectionItem = serde_json::from_str(
        r#"{"id":9,"date_added":"2024-01-01T00:00:00-08:00","basic_information":{"id":9,"title":"Ege Bamyasi","year":1972,
            "artists":[{"name":"Can"}],"labels":[{"name":"United Artists","catno":"UAS 29 414"}],"formats":[{"name":"Vinyl"}]}}"#,
    )
    .unwrap();
    let csv_text = collection_csv(&[], &[item]);
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(&row[0], "Can");
    assert_eq!(&row[4], "UAS 29 414");
    assert_eq!((&row[5], &row[7], &row[11]), ("", "", ""));
    assert_eq!(&row[9], "https://www.discogs.com/release/9");
}

#[tokio::test]
async fn test_one_failed_image_is_omitted() {
    let records = vec![
        record("Pink Floyd", "Animals", &["https://img/a1.jpg", "https://img/a2.png"]),
        record("AC/DC", "Highway to Hell", &["https://img/missing.jpg", "https://img/b2.jpg"]),
    ];
    let fetcher = MapFetcher(HashMap::from([
        ("https://img/a1.jpg".to_string(), b"a1".to_vec()),
        ("https://img/a2.png".to_string(), b"a2".to_vec()),
        ("https://img/b2.jpg".to_string(), b"b2".to_vec()),
    ]));
    let progress = Collect::default();

    let archive = build_export(&records, &[], &fetcher, &progress).await.unwrap();
    assert_eq!(archive.images_total, 4);
    assert_eq!(archive.images_included, 3);

    let files = unpack(&archive.bytes);
    assert_eq!(files.len(), 2 + 3);
    assert_eq!(files["images/Pink Floyd - Animals/1.jpg"], b"a1");
    assert_eq!(files["images/Pink Floyd - Animals/2.png"], b"a2");
    assert_eq!(files["images/AC_DC - Highway to Hell/2.jpg"], b"b2");
    assert!(!files.contains_key("images/AC_DC - Highway to Hell/1.jpg"));

    let csv_text = String::from_utf8(files["collection.csv"].clone()).unwrap();
    assert_eq!(csv::Reader::from_reader(csv_text.as_bytes()).records().count(), 2);

    let json: serde_json::Value = serde_json::from_slice(&files["collection.json"]).unwrap();
    assert_eq!(json["localRecords"].as_array().unwrap().len(), 2);
    assert_eq!(json["localRecords"][0]["artist"], "Pink Floyd");
    assert!(json["discogsItems"].as_array().unwrap().is_empty());

    assert_eq!(progress.percents(), vec![25, 50, 75, 100]);
}

#[tokio::test]
async fn test_two_pressings_keep_separate_folders() {
    let records = vec![
        record("Pink Floyd", "Animals", &["https://img/uk.jpg"]),
        record("Pink Floyd", "Animals", &["https://img/us.jpg"]),
    ];
    let fetcher = MapFetcher(HashMap::from([
        ("https://img/uk.jpg".to_string(), b"uk".to_vec()),
        ("https://img/us.jpg".to_string(), b"us".to_vec()),
    ]));

    let archive = build_export(&records, &[], &fetcher, &NoProgress).await.unwrap();
    assert_eq!(archive.images_included, 2);

    let files = unpack(&archive.bytes);
    assert_eq!(files.len(), 2 + 2);
    assert_eq!(files["images/Pink Floyd - Animals/1.jpg"], b"uk");
    assert_eq!(files["images/Pink Floyd - Animals (2)/1.jpg"], b"us");
}

#[tokio::test]
async fn test_no_images_still_reaches_100() {
    let progress = Collect::default();
    let archive = build_export(&[record("Can", "Tago Mago", &[])], &[], &MapFetcher(HashMap::new()), &progress)
        .await
        .unwrap();
    assert_eq!(unpack(&archive.bytes).len(), 2);
    assert_eq!(progress.percents(), vec![100]);
}

#[tokio::test]
async fn test_http_and_file_urls_are_fetched() {
    let app = Router::new()
        .route("/front.png", get(|| async { (StatusCode::OK, vec![1u8, 2, 3]) }))
        .route("/gone.jpg", get(|| async { StatusCode::NOT_FOUND }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let dir = tempfile::TempDir::new().unwrap();
    let local = dir.path().join("back.jpg");
    std::fs::write(&local, [9u8, 9]).unwrap();

    let fetcher = HttpImageFetcher::new(5).unwrap();
    assert_eq!(
        fetcher.fetch(&format!("{}/front.png", base)).await.unwrap(),
        vec![1, 2, 3]
    );
    assert!(fetcher.fetch(&format!("{}/gone.jpg", base)).await.is_err());
    assert_eq!(
        fetcher
            .fetch(&format!("file://{}", local.display()))
            .await
            .unwrap(),
        vec![9, 9]
    );
    assert!(fetcher.fetch("file:///nonexistent/photo.jpg").await.is_err());
}
