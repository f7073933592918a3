//! Bulk library import
//!
//! Files are split into fixed-size chunks and each chunk is tag-read on a
//! blocking worker. Workers share nothing but the lookup; results come back
//! as a finished batch.

use crate::error::{MetadataError, Result};
use cadence_core::{MetadataLookup, TrackMetadata, TrackRef};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Import configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Files handed to one worker at a time
    pub import_chunk_size: usize,

    /// Concurrent workers (default: num_cpus)
    pub workers: usize,

    /// Supported audio file extensions, lowercase
    pub extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            import_chunk_size: 1111,
            workers: num_cpus::get(),
            extensions: [
                "m4a", "flac", "mp3", "opus", "ogg", "wav", "aif", "aiff", "wma", "spc",
            ]
            .iter()
            .map(|ext| (*ext).to_string())
            .collect(),
        }
    }
}

/// Import progress updates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportProgress {
    /// Discovery finished
    Started { total_files: usize, chunks: usize },

    /// A chunk finished; chunks are reported in order
    ChunkCompleted {
        chunk: usize,
        files_done: usize,
        total_files: usize,
    },

    /// Import finished
    Completed { imported: usize, failed: usize },
}

/// A file and its tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedTrack {
    pub track: TrackRef,
    pub metadata: TrackMetadata,
}

/// A file that could not be imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub track: TrackRef,
    pub reason: String,
}

/// Result of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBatch {
    /// Number of files discovered
    pub files_discovered: usize,

    /// Imported files, in discovery order
    pub tracks: Vec<ImportedTrack>,

    /// Files that vanished or could not be read
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug, Default)]
struct ChunkResult {
    tracks: Vec<ImportedTrack>,
    failures: Vec<ImportFailure>,
}

/// Bulk importer
pub struct LibraryImporter {
    config: LibraryConfig,
    lookup: Arc<dyn MetadataLookup>,
}

impl LibraryImporter {
    /// Create an importer with the given lookup
    pub fn new(config: LibraryConfig, lookup: Arc<dyn MetadataLookup>) -> Self {
        Self { config, lookup }
    }

    /// Importer configuration
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Expand `paths` into supported files, sorted and deduplicated
    ///
    /// # Errors
    /// Returns `FileNotFound` if one of the roots does not exist
    pub fn discover(&self, paths: &[PathBuf]) -> Result<Vec<TrackRef>> {
        let mut files = Vec::new();

        for root in paths {
            if !root.exists() {
                return Err(MetadataError::FileNotFound(root.display().to_string()));
            }

            if root.is_file() {
                if self.is_supported_file(root) {
                    files.push(TrackRef::new(root));
                }
                continue;
            }

            for entry in walkdir::WalkDir::new(root).follow_links(true) {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        if self.is_supported_file(entry.path()) {
                            files.push(TrackRef::new(entry.path()));
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(root = %root.display(), error = %e, "skipping unreadable entry"),
                }
            }
        }

        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Discover and tag-read every file under `paths`
    ///
    /// # Arguments
    /// * `paths` - Files or directories to import
    /// * `progress_tx` - Optional channel for progress updates
    ///
    /// # Errors
    /// Fails if a root is missing or a worker panicked
    pub async fn import(
        &self,
        paths: &[PathBuf],
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
    ) -> Result<ImportBatch> {
        let files = self.discover(paths)?;
        let total_files = files.len();
        let chunks: Vec<Vec<TrackRef>> = files
            .chunks(self.config.import_chunk_size.max(1))
            .map(<[TrackRef]>::to_vec)
            .collect();

        tracing::info!(total_files, chunks = chunks.len(), "import started");
        notify(
            progress_tx.as_ref(),
            ImportProgress::Started {
                total_files,
                chunks: chunks.len(),
            },
        )
        .await;

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                let semaphore = Arc::clone(&semaphore);
                let lookup = Arc::clone(&self.lookup);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| MetadataError::Worker(e.to_string()))?;
                    tokio::task::spawn_blocking(move || import_chunk(lookup.as_ref(), chunk))
                        .await
                        .map_err(|e| MetadataError::Worker(e.to_string()))
                })
            })
            .collect();

        let mut batch = ImportBatch {
            files_discovered: total_files,
            ..ImportBatch::default()
        };
        for (index, handle) in handles.into_iter().enumerate() {
            let result = handle
                .await
                .map_err(|e| MetadataError::Worker(e.to_string()))??;
            batch.tracks.extend(result.tracks);
            batch.failures.extend(result.failures);

            notify(
                progress_tx.as_ref(),
                ImportProgress::ChunkCompleted {
                    chunk: index,
                    files_done: batch.tracks.len() + batch.failures.len(),
                    total_files,
                },
            )
            .await;
        }

        tracing::info!(
            imported = batch.tracks.len(),
            failed = batch.failures.len(),
            "import completed"
        );
        notify(
            progress_tx.as_ref(),
            ImportProgress::Completed {
                imported: batch.tracks.len(),
                failed: batch.failures.len(),
            },
        )
        .await;

        Ok(batch)
    }

    fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.config.extensions.contains(&e.to_lowercase()))
    }
}

fn import_chunk(lookup: &dyn MetadataLookup, chunk: Vec<TrackRef>) -> ChunkResult {
    let mut result = ChunkResult::default();
    for track in chunk {
        match std::fs::metadata(track.path()) {
            Ok(_) => {
                let metadata = lookup.lookup(&track);
                result.tracks.push(ImportedTrack { track, metadata });
            }
            Err(e) => result.failures.push(ImportFailure {
                track,
                reason: e.to_string(),
            }),
        }
    }
    result
}

async fn notify(progress_tx: Option<&mpsc::Sender<ImportProgress>>, progress: ImportProgress) {
    if let Some(tx) = progress_tx {
        let _ = tx.send(progress).await;
    }
}
