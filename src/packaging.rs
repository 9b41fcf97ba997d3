//! Zip packaging of fetched items
//!
//! [`ZipPackager`] writes one deflate-compressed `.zip` per artifact into an output directory.
//! Each item lands in its own folder named after its publication date and title:
//!
//! ```text
//! 2024-03-01 Release notes/Release notes v1_2.html
//! ```
//!
//! The packager also keeps every finished archive in memory, keyed by its handle, so a consumer
//! can offer it again without touching the disk. [`Packager::release`] drops that copy.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::collab::{ArchiveBuilder, PackagedArtifact, Packager};
use crate::error::Result;
use crate::types::{ArtifactHandle, WorkItem};

/// Deflate level used for archives
const COMPRESSION_LEVEL: i32 = 6;

type HeldArchives = Arc<tokio::sync::Mutex<HashMap<ArtifactHandle, Arc<Vec<u8>>>>>;

/// [`Packager`] producing zip archives on disk
#[derive(Clone, Debug)]
pub struct ZipPackager {
    output_dir: PathBuf,
    held: HeldArchives,
    next_handle: Arc<AtomicU64>,
}

impl ZipPackager {
    /// Create a packager writing into `output_dir` (created on first use).
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            held: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            next_handle: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Directory archives are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// In-memory copy of a packaged archive, if its handle has not been released.
    pub async fn archive_bytes(&self, handle: &ArtifactHandle) -> Option<Arc<Vec<u8>>> {
        self.held.lock().await.get(handle).cloned()
    }

    /// Number of archives currently held in memory
    pub async fn held_count(&self) -> usize {
        self.held.lock().await.len()
    }
}

#[async_trait::async_trait]
impl Packager for ZipPackager {
    async fn open(&self, name: &str) -> Result<Box<dyn ArchiveBuilder>> {
        Ok(Box::new(ZipArchiveBuilder {
            name: name.to_string(),
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            added: 0,
            output_dir: self.output_dir.clone(),
            held: Arc::clone(&self.held),
            next_handle: Arc::clone(&self.next_handle),
        }))
    }

    async fn release(&self, handle: &ArtifactHandle) {
        if self.held.lock().await.remove(handle).is_some() {
            tracing::debug!(handle = %handle, "Released packaged archive");
        }
    }
}

struct ZipArchiveBuilder {
    name: String,
    writer: ZipWriter<Cursor<Vec<u8>>>,
    added: usize,
    output_dir: PathBuf,
    held: HeldArchives,
    next_handle: Arc<AtomicU64>,
}

fn file_options() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
}

/// Folder an item is stored under: `"{yyyy-mm-dd} {title}"` with `/` replaced.
pub(crate) fn entry_folder(item: &WorkItem) -> String {
    let date = chrono::DateTime::from_timestamp(item.published_at, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown-date".to_string());
    format!("{} {}", date, item.title.replace('/', "_"))
}

/// Path of an item's document inside the archive.
pub(crate) fn entry_path(item: &WorkItem) -> String {
    let file_stem = item.title.replace(['.', '/'], "_");
    format!("{}/{}.html", entry_folder(item), file_stem)
}

#[async_trait::async_trait]
impl ArchiveBuilder for ZipArchiveBuilder {
    async fn add_item(&mut self, item: &WorkItem) -> Result<bool> {
        let Some(content) = item.content.as_deref() else {
            return Ok(false);
        };

        self.writer.start_file(entry_path(item), file_options())?;
        self.writer.write_all(content.as_bytes())?;
        self.added += 1;
        Ok(true)
    }

    async fn finish(self: Box<Self>) -> Result<PackagedArtifact> {
        let Self {
            name,
            mut writer,
            added,
            output_dir,
            held,
            next_handle,
        } = *self;

        let bytes = writer.finish()?.into_inner();
        let filename = format!("{}.zip", name);

        tokio::fs::create_dir_all(&output_dir).await?;
        tokio::fs::write(output_dir.join(&filename), &bytes).await?;

        let handle = ArtifactHandle(next_handle.fetch_add(1, Ordering::Relaxed));
        held.lock().await.insert(handle, Arc::new(bytes));

        tracing::debug!(filename = %filename, items = added, handle = %handle, "Archive written");

        Ok(PackagedArtifact {
            filename,
            handle,
            item_count: added,
        })
    }
}
