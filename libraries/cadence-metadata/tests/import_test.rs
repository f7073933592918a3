//! Library import against a real directory tree

use cadence_metadata::{
    ImportProgress, LibraryConfig, LibraryImporter, LoftyMetadataLookup, MetadataError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn spc_file(path: &Path, title: &str, game: &str) {
    let mut header = vec![0u8; 0x100];
    let signature = b"SNES-SPC700 Sound File Data v0.30";
    header[..signature.len()].copy_from_slice(signature);
    header[0x21] = 26;
    header[0x22] = 26;
    header[0x23] = 26;
    header[0x2E..0x2E + title.len()].copy_from_slice(title.as_bytes());
    header[0x4E..0x4E + game.len()].copy_from_slice(game.as_bytes());
    fs::write(path, header).unwrap();
}

fn library() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("album/disc2")).unwrap();
    fs::write(dir.path().join("album/01.mp3"), b"not really audio").unwrap();
    fs::write(dir.path().join("album/02.FLAC"), b"not really audio").unwrap();
    fs::write(dir.path().join("album/cover.jpg"), b"jpeg").unwrap();
    fs::write(dir.path().join("notes.txt"), b"text").unwrap();
    spc_file(&dir.path().join("album/disc2/03.spc"), "Corridors of Time", "Chrono Trigger");
    dir
}

fn importer(config: LibraryConfig) -> LibraryImporter {
    LibraryImporter::new(config, Arc::new(LoftyMetadataLookup::new()))
}

#[test]
fn discovery_filters_by_extension_case_insensitively() {
    let dir = library();
    let importer = importer(LibraryConfig::default());

    let files = importer.discover(&[dir.path().to_path_buf()]).unwrap();
    let names: Vec<_> = files.iter().map(|t| t.file_name()).collect();

    assert_eq!(names, vec!["01.mp3", "02.FLAC", "03.spc"]);
}

#[test]
fn overlapping_roots_are_deduplicated() {
    let dir = library();
    let importer = importer(LibraryConfig::default());

    let files = importer
        .discover(&[
            dir.path().to_path_buf(),
            dir.path().join("album/01.mp3"),
            dir.path().join("notes.txt"),
        ])
        .unwrap();

    assert_eq!(files.len(), 3);
}

#[test]
fn missing_root_is_an_error() {
    let importer = importer(LibraryConfig::default());
    let result = importer.discover(&[PathBuf::from("/nonexistent/music")]);
    assert!(matches!(result, Err(MetadataError::FileNotFound(_))));
}

#[tokio::test]
async fn import_reads_tags_in_chunks_and_reports_progress() {
    let dir = library();
    let importer = importer(LibraryConfig {
        import_chunk_size: 2,
        workers: 2,
        ..LibraryConfig::default()
    });
    let (tx, mut rx) = mpsc::channel(16);

    let batch = importer
        .import(&[dir.path().to_path_buf()], Some(tx))
        .await
        .unwrap();

    assert_eq!(batch.files_discovered, 3);
    assert_eq!(batch.tracks.len(), 3);
    assert!(batch.failures.is_empty());

    // Unparseable files still import, with empty tags
    assert!(batch.tracks[0].metadata.is_empty());
    let spc = &batch.tracks[2];
    assert_eq!(spc.metadata.title.as_deref(), Some("Corridors of Time"));
    assert_eq!(spc.metadata.album.as_deref(), Some("Chrono Trigger"));

    let mut progress = Vec::new();
    while let Some(update) = rx.recv().await {
        progress.push(update);
    }
    assert_eq!(
        progress,
        vec![
            ImportProgress::Started {
                total_files: 3,
                chunks: 2
            },
            ImportProgress::ChunkCompleted {
                chunk: 0,
                files_done: 2,
                total_files: 3
            },
            ImportProgress::ChunkCompleted {
                chunk: 1,
                files_done: 3,
                total_files: 3
            },
            ImportProgress::Completed {
                imported: 3,
                failed: 0
            },
        ]
    );
}

#[tokio::test]
async fn empty_directory_imports_nothing() {
    let dir = TempDir::new().unwrap();
    let batch = importer(LibraryConfig::default())
        .import(&[dir.path().to_path_buf()], None)
        .await
        .unwrap();

    assert_eq!(batch.files_discovered, 0);
    assert!(batch.tracks.is_empty());
}
