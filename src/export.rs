//! Export the collection as a downloadable ZIP snapshot.
//!
//! The archive holds:
//!
//! | Entry | Content |
//! |-------|---------|
//! | `collection.csv` | One row per local record, then one per Discogs item |
//! | `collection.json` | `{ "localRecords": [...], "discogsItems": [...] }` |
//! | `images/<Artist - Title>/<n>.<ext>` | Photos of local records |
//!
//! Photos are downloaded one at a time so progress stays monotonic. A photo
//! that cannot be fetched is left out of the archive; it still counts toward
//! progress and never fails the export.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::ArchiveBuilder;
use crate::catalog::{release_url, CollectionItem, DiscogsClient, ALL_FOLDER};
use crate::collection::{CollectionStore, JsonFileStore};
use crate::config::Config;
use crate::error::CatalogError;
use crate::models::VinylRecord;
use crate::progress::{ExportProgressEvent, ExportProgressReporter, ProgressMode};

pub const CSV_HEADER: &str = "Artist,Title,Year,Label,Catalog Number,Country,Format,Condition,Estimated Price,Discogs URL,Discogs Release ID,Notes,Date Added";

const MAX_FOLDER_NAME: usize = 80;

// ═══════════════════════════════════════════════════════════════════════
// CSV
// ═══════════════════════════════════════════════════════════════════════

/// Quote a field, doubling embedded quotes.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Epoch milliseconds as ISO-8601 UTC with millisecond precision.
fn iso_millis(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

pub fn record_to_csv_row(r: &VinylRecord) -> String {
    [
        quote(&r.artist),
        quote(&r.title),
        quote(&r.year),
        quote(&r.label),
        quote(&r.catalog_number),
        quote(r.country.as_deref().unwrap_or("")),
        quote(r.format.as_deref().unwrap_or("")),
        quote(r.condition.as_deref().unwrap_or("")),
        quote(&r.estimated_price),
        quote(&r.discogs_url),
        r.discogs_release_id
            .map(|id| id.to_string())
            .unwrap_or_default(),
        quote(&r.description),
        iso_millis(r.date_added),
    ]
    .join(",")
}

/// Row for a remote collection item. Country, condition and notes are
/// not part of the collection listing and stay empty.
pub fn catalog_item_to_csv_row(item: &CollectionItem) -> String {
    let info = &item.basic_information;
    let join = |names: Vec<&str>| names.join("; ");
    [
        quote(&join(info.artists.iter().map(|a| a.name.as_str()).collect())),
        quote(&info.title),
        if info.year > 0 {
            info.year.to_string()
        } else {
            String::new()
        },
        quote(&join(info.labels.iter().map(|l| l.name.as_str()).collect())),
        quote(info.labels.first().map(|l| l.catno.as_str()).unwrap_or("")),
        quote(""),
        quote(&join(info.formats.iter().map(|f| f.name.as_str()).collect())),
        quote(""),
        quote(""),
        quote(&release_url(info.id)),
        info.id.to_string(),
        quote(""),
        item.date_added.clone(),
    ]
    .join(",")
}

/// Full CSV document: header, local rows, then remote rows.
pub fn collection_csv(local: &[VinylRecord], remote: &[CollectionItem]) -> String {
    let mut rows = Vec::with_capacity(1 + local.len() + remote.len());
    rows.push(CSV_HEADER.to_string());
    rows.extend(local.iter().map(record_to_csv_row));
    rows.extend(remote.iter().map(catalog_item_to_csv_row));
    rows.join("\n")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    local_records: &'a [VinylRecord],
    discogs_items: &'a [CollectionItem],
}

// ═══════════════════════════════════════════════════════════════════════
// Image paths
// ═══════════════════════════════════════════════════════════════════════

/// Replace characters outside `[A-Za-z0-9_- ]` with `_` and cap the
/// length at 80 characters.
pub fn sanitize_folder_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FOLDER_NAME)
        .collect()
}

pub fn image_extension(url: &str) -> &'static str {
    if url.contains(".png") {
        "png"
    } else {
        "jpg"
    }
}

/// Folder for one record's photos. Records sharing a display name get
/// ` (2)`, ` (3)`, ... so their images never overwrite each other.
pub fn unique_folder_name(used: &mut HashSet<String>, display_name: &str) -> String {
    let base = sanitize_folder_name(display_name);
    let mut folder = base.clone();
    let mut n = 2;
    while !used.insert(folder.clone()) {
        folder = format!("{} ({})", base, n);
        n += 1;
    }
    folder
}

/// `vinyl-collection-YYYY-MM-DD.zip`
pub fn archive_file_name(date: NaiveDate) -> String {
    format!("vinyl-collection-{}.zip", date.format("%Y-%m-%d"))
}

// ═══════════════════════════════════════════════════════════════════════
// Image fetching
// ═══════════════════════════════════════════════════════════════════════

/// Downloads one photo by URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches `http(s)://` URLs with reqwest and reads `file://` URLs from
/// disk.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(path) = url.strip_prefix("file://") {
            return tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path));
        }
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════════════════

/// An encoded archive plus what went into it.
#[derive(Debug)]
pub struct ExportArchive {
    pub bytes: Vec<u8>,
    pub images_included: usize,
    pub images_total: usize,
}

/// Assemble the archive from local records and remote items.
///
/// Progress is reported after every photo attempt; with no photos it is
/// reported once, at 100%.
pub async fn build_export(
    local: &[VinylRecord],
    remote: &[CollectionItem],
    fetcher: &dyn ImageFetcher,
    progress: &dyn ExportProgressReporter,
) -> Result<ExportArchive> {
    let mut builder = ArchiveBuilder::new().modified_at(chrono::Local::now().naive_local());

    builder.add("collection.csv", collection_csv(local, remote));
    let snapshot = Snapshot {
        local_records: local,
        discogs_items: remote,
    };
    builder.add("collection.json", serde_json::to_string_pretty(&snapshot)?);

    let total: usize = local.iter().map(|r| r.images.len()).sum();
    let mut done = 0usize;
    let mut included = 0usize;
    let mut folders = HashSet::new();

    for record in local {
        let folder = unique_folder_name(&mut folders, &record.display_name());
        for (i, url) in record.images.iter().enumerate() {
            match fetcher.fetch(url).await {
                Ok(bytes) => {
                    let name = format!("images/{}/{}.{}", folder, i + 1, image_extension(url));
                    debug!(%name, size = bytes.len(), "adding image");
                    builder.add(name, bytes);
                    included += 1;
                }
                Err(e) => warn!(%url, error = %e, "skipping image"),
            }
            done += 1;
            progress.report(ExportProgressEvent::images(done as u64, total as u64));
        }
    }
    if total == 0 {
        progress.report(ExportProgressEvent::images(0, 0));
    }

    let bytes = builder.finish()?;
    Ok(ExportArchive {
        bytes,
        images_included: included,
        images_total: total,
    })
}

/// Every item in the user's "All" folder, walking pages until the last.
pub async fn fetch_remote_collection(
    client: &DiscogsClient,
    username: &str,
    per_page: u32,
    progress: &dyn ExportProgressReporter,
) -> Result<Vec<CollectionItem>, CatalogError> {
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let result = client
            .collection_page(username, ALL_FOLDER, page, per_page)
            .await?;
        progress.report(ExportProgressEvent::FetchingCollection {
            page,
            pages: result.pagination.pages,
        });
        items.extend(result.releases);
        if result.pagination.is_last() {
            break;
        }
        page += 1;
    }
    Ok(items)
}

/// `digger export`.
pub async fn run_export(
    config: &Config,
    output: Option<&Path>,
    include_discogs: bool,
    mode: ProgressMode,
) -> Result<()> {
    let progress = mode.reporter();
    let store = JsonFileStore::new(&config.collection.path);
    let local = store.list().await?;

    let remote = if include_discogs && config.export.include_discogs {
        match config.discogs.token() {
            Some(token) => {
                let client = DiscogsClient::new(&config.discogs, &token)?;
                let identity = client
                    .verify_credential()
                    .await
                    .context("Failed to verify Discogs token")?;
                fetch_remote_collection(
                    &client,
                    &identity.username,
                    config.discogs.per_page,
                    progress.as_ref(),
                )
                .await
                .context("Failed to fetch Discogs collection")?
            }
            None => {
                info!(env = %config.discogs.token_env, "no Discogs token, exporting local records only");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let fetcher = HttpImageFetcher::new(config.export.timeout_secs)?;
    let archive = build_export(&local, &remote, &fetcher, progress.as_ref()).await?;

    let path: PathBuf = match output {
        Some(p) => p.to_path_buf(),
        None => config
            .export
            .output_dir
            .join(archive_file_name(chrono::Local::now().date_naive())),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &archive.bytes)
        .with_context(|| format!("Failed to write archive: {}", path.display()))?;

    eprintln!(
        "Exported {} local records, {} Discogs items, {}/{} images to {}",
        local.len(),
        remote.len(),
        archive.images_included,
        archive.images_total,
        path.display()
    );
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ArtistRef, BasicInformation, FormatRef, LabelRef};
    use crate::models::DraftRecord;

    fn item() -> CollectionItem {
        CollectionItem {
            id: 249504,
            instance_id: 1,
            folder_id: 1,
            rating: 0,
            date_added: "2024-03-01T10:00:00-08:00".to_string(),
            basic_information: BasicInformation {
                id: 249504,
                title: "Unknown Pleasures".to_string(),
                year: 1979,
                thumb: String::new(),
                cover_image: String::new(),
                resource_url: String::new(),
                artists: vec![ArtistRef {
                    name: "Joy Division".to_string(),
                    id: 1,
                }],
                labels: vec![
                    LabelRef {
                        name: "Factory".to_string(),
                        catno: "FACT 10".to_string(),
                        id: 2,
                    },
                    LabelRef {
                        name: "Factory Benelux".to_string(),
                        catno: "FACT 10B".to_string(),
                        id: 3,
                    },
                ],
                formats: vec![FormatRef {
                    name: "Vinyl".to_string(),
                    qty: "1".to_string(),
                    descriptions: None,
                }],
                genres: vec![],
                styles: vec![],
            },
            notes: None,
        }
    }

    #[test]
    fn test_unique_folder_name_suffixes_repeats() {
        let mut used = HashSet::new();
        assert_eq!(unique_folder_name(&mut used, "Pink Floyd - Animals"), "Pink Floyd - Animals");
        assert_eq!(unique_folder_name(&mut used, "Pink Floyd - Animals"), "Pink Floyd - Animals (2)");
        assert_eq!(unique_folder_name(&mut used, "Pink Floyd - Animals"), "Pink Floyd - Animals (3)");
        assert_eq!(unique_folder_name(&mut used, "Can - Tago Mago"), "Can - Tago Mago");
    }

    #[test]
    fn test_sanitize_folder_name() {
        assert_eq!(
            sanitize_folder_name("AC/DC - Back in Black!"),
            "AC_DC - Back in Black_"
        );
        assert_eq!(sanitize_folder_name("Björk - Homogenic"), "Bj_rk - Homogenic");
        assert_eq!(sanitize_folder_name(&"x".repeat(200)).len(), 80);
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("https://i.ibb.co/abc/front.png"), "png");
        assert_eq!(image_extension("https://i.ibb.co/abc/front.jpeg"), "jpg");
        assert_eq!(image_extension("file:///photos/label"), "jpg");
    }

    #[test]
    fn test_archive_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        assert_eq!(archive_file_name(date), "vinyl-collection-2024-05-07.zip");
    }

    #[test]
    fn test_local_row_format() {
        let mut record = VinylRecord::from_draft(
            DraftRecord {
                artist: "Pink Floyd".to_string(),
                title: "Animals".to_string(),
                year: "1977".to_string(),
                discogs_release_id: Some(42),
                description: "Gatefold, \"hype\" sticker".to_string(),
                ..Default::default()
            },
            vec![],
            Some("VG+".to_string()),
        );
        record.date_added = 1_700_000_000_123;
        assert_eq!(
            record_to_csv_row(&record),
            "\"Pink Floyd\",\"Animals\",\"1977\",\"\",\"\",\"\",\"\",\"VG+\",\"N/A\",\"\",42,\
             \"Gatefold, \"\"hype\"\" sticker\",2023-11-14T22:13:20.123Z"
        );
    }

    #[test]
    fn test_remote_row_format() {
        assert_eq!(
            catalog_item_to_csv_row(&item()),
            "\"Joy Division\",\"Unknown Pleasures\",1979,\"Factory; Factory Benelux\",\"FACT 10\",\
             \"\",\"Vinyl\",\"\",\"\",\"https://www.discogs.com/release/249504\",249504,\"\",\
             2024-03-01T10:00:00-08:00"
        );
    }

    #[test]
    fn test_csv_has_header_then_rows() {
        let csv = collection_csv(&[], &[item()]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(CSV_HEADER.split(',').count(), 13);
    }
}
