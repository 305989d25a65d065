//! Local record collection.
//!
//! The [`CollectionStore`] trait is the persistence seam for accepted
//! identifications. Both operations that change it (appending a confirmed
//! record and removing one by id) rewrite the whole document; callers must
//! not run them concurrently against the same store.
//!
//! Records are kept newest first.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::models::VinylRecord;

/// Persistence backend for [`VinylRecord`]s.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// All records, newest first.
    async fn list(&self) -> Result<Vec<VinylRecord>>;

    /// Add a confirmed record at the front of the collection.
    async fn append(&self, record: VinylRecord) -> Result<()>;

    /// Remove a record by id. Returns `false` when no record matched.
    async fn remove(&self, id: &str) -> Result<bool>;

    async fn get(&self, id: &str) -> Result<Option<VinylRecord>> {
        Ok(self.list().await?.into_iter().find(|r| r.id == id))
    }
}

#[derive(Serialize, Deserialize, Default)]
struct CollectionDocument {
    #[serde(default)]
    records: Vec<VinylRecord>,
}

/// Collection persisted as one JSON document on disk.
///
/// Writes go to a sibling temp file which is then renamed over the
/// document, so a crash never leaves a truncated collection.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<CollectionDocument> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(CollectionDocument::default()),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Corrupt collection file: {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CollectionDocument::default()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read collection: {}", self.path.display())),
        }
    }

    async fn write(&self, doc: &CollectionDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write collection: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace collection: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for JsonFileStore {
    async fn list(&self) -> Result<Vec<VinylRecord>> {
        Ok(self.read().await?.records)
    }

    async fn append(&self, record: VinylRecord) -> Result<()> {
        let mut doc = self.read().await?;
        info!(id = %record.id, artist = %record.artist, title = %record.title, "adding record");
        doc.records.insert(0, record);
        self.write(&doc).await
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut doc = self.read().await?;
        let before = doc.records.len();
        doc.records.retain(|r| r.id != id);
        if doc.records.len() == before {
            return Ok(false);
        }
        info!(id, "removed record");
        self.write(&doc).await?;
        Ok(true)
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<VinylRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<VinylRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl CollectionStore for InMemoryStore {
    async fn list(&self) -> Result<Vec<VinylRecord>> {
        Ok(self.records.read().unwrap().clone())
    }

    async fn append(&self, record: VinylRecord) -> Result<()> {
        self.records.write().unwrap().insert(0, record);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}

/// `digger collection list`.
pub async fn run_list(config: &Config, json: bool) -> Result<()> {
    let store = JsonFileStore::new(&config.collection.path);
    let records = store.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("Collection is empty.");
        return Ok(());
    }
    for r in &records {
        println!(
            "{}  {}  [{}] {} {}  {}",
            r.id,
            r.display_name(),
            r.catalog_number,
            r.year,
            r.country.as_deref().unwrap_or(""),
            r.estimated_price
        );
    }
    println!("{} record(s)", records.len());
    Ok(())
}

/// `digger collection show <id>`.
pub async fn run_show(config: &Config, id: &str) -> Result<()> {
    let store = JsonFileStore::new(&config.collection.path);
    match store.get(id).await? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => anyhow::bail!("No record with id {}", id),
    }
}

/// `digger collection remove <id>`.
pub async fn run_remove(config: &Config, id: &str) -> Result<()> {
    let store = JsonFileStore::new(&config.collection.path);
    if store.remove(id).await? {
        println!("Removed {}", id);
        Ok(())
    } else {
        anyhow::bail!("No record with id {}", id)
    }
}
