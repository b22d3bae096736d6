//! File ingestion.
//!
//! Validates a file, extracts its chunks and stores each chunk as its own
//! knowledge entry. A failing chunk is counted and skipped; it never aborts
//! the rest of the file.

use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{Value, json};
use walkdir::WalkDir;

use super::chunker::TextChunker;
use super::extract::{FileFormat, dotted_extension, extract_chunks};
use super::knowledge::{KnowledgeBase, today};
use crate::types::{AppError, IngestSummary, KnowledgeEntry, NewKnowledgeEntry, Result};

/// Where an ingested file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportSource {
    /// Attached to a `--learn` mention.
    FileUpload,
    /// Read from disk by the `import` command.
    BulkImport,
}

impl ImportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportSource::FileUpload => "file_upload",
            ImportSource::BulkImport => "bulk_import",
        }
    }

    /// Value of the `source` metadata key used by delete filters.
    pub fn source_label(&self) -> &'static str {
        match self {
            ImportSource::FileUpload => "slack",
            ImportSource::BulkImport => "offline",
        }
    }
}

/// Provenance of a file being ingested.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// Slack user id, or the importing user for offline imports.
    pub user: String,
    /// Slack message ts, or file mtime in seconds.
    pub ts: String,
    pub file_url: Option<String>,
    /// Original file name; defaults to the name on disk.
    pub file_name: Option<String>,
    pub import_source: ImportSource,
}

/// Counters for a directory import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub total_chunks: usize,
    pub stored_chunks: usize,
    pub failed_chunks: usize,
}

#[derive(Clone)]
pub struct FileIngestor {
    knowledge: KnowledgeBase,
    chunker: TextChunker,
}

impl FileIngestor {
    pub fn new(knowledge: KnowledgeBase, chunker: TextChunker) -> Self {
        Self { knowledge, chunker }
    }

    /// Validate, extract and store one file.
    ///
    /// Size is checked before format, so an oversized file of any type is
    /// reported as too large.
    pub async fn process_file(
        &self,
        path: &Path,
        metadata: &FileMetadata,
        max_file_size: Option<u64>,
    ) -> Result<IngestSummary> {
        let started = Instant::now();
        let size = tokio::fs::metadata(path).await?.len();

        if let Some(max) = max_file_size {
            if size > max {
                return Err(AppError::FileTooLarge { size, max });
            }
        }

        let format = FileFormat::from_path(path)
            .ok_or_else(|| AppError::UnsupportedFormat(dotted_extension(path)))?;

        let bytes = tokio::fs::read(path).await?;
        let chunker = self.chunker;
        let chunks = tokio::task::spawn_blocking(move || extract_chunks(format, &bytes, &chunker))
            .await
            .map_err(|e| AppError::Internal(format!("Extraction task failed: {}", e)))??;

        let file_name = metadata.file_name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let mut summary = IngestSummary {
            total_chunks: chunks.len(),
            ..Default::default()
        };

        for (index, chunk) in chunks.iter().enumerate() {
            match self.store_chunk(chunk, format, &file_name, metadata).await {
                Ok(entry) => {
                    summary.stored_chunks += 1;
                    tracing::debug!(entry_id = %entry.id, chunk = index, "Stored chunk");
                }
                Err(e) => {
                    summary.failed_chunks += 1;
                    tracing::warn!(file = %file_name, chunk = index, error = %e, "Failed to store chunk");
                }
            }
        }

        tracing::info!(
            file = %file_name,
            format = format.media_type(),
            total = summary.total_chunks,
            stored = summary.stored_chunks,
            failed = summary.failed_chunks,
            duration_ms = started.elapsed().as_millis() as u64,
            "File processed"
        );

        Ok(summary)
    }

    async fn store_chunk(
        &self,
        chunk: &str,
        format: FileFormat,
        file_name: &str,
        metadata: &FileMetadata,
    ) -> Result<KnowledgeEntry> {
        let additional_metadata = match json!({
            "file_type": format.extension().trim_start_matches('.'),
            "file_name": file_name,
            "import_source": metadata.import_source.as_str(),
            "source": metadata.import_source.source_label(),
            "date": today(),
        }) {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        self.knowledge
            .learn(NewKnowledgeEntry {
                content: chunk.to_string(),
                slack_username: metadata.user.clone(),
                slack_timestamp: metadata.ts.clone(),
                source_url: metadata.file_url.clone(),
                tags: vec!["imported".to_string()],
                additional_metadata,
            })
            .await
    }

    /// Recursively ingest every file under `directory` whose extension is in `formats`.
    ///
    /// Source URLs are `url_prefix` joined with the path relative to `directory`.
    pub async fn import_directory(
        &self,
        directory: &Path,
        formats: &[FileFormat],
        url_prefix: &str,
        user: &str,
    ) -> Result<ImportStats> {
        if !directory.is_dir() {
            return Err(AppError::InvalidInput(format!(
                "Not a directory: {}",
                directory.display()
            )));
        }

        let files = collect_files(directory, formats);
        let mut stats = ImportStats {
            total_files: files.len(),
            ..Default::default()
        };
        let prefix = url_prefix.trim_end_matches('/');

        for path in files {
            let relative = path
                .strip_prefix(directory)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let metadata = FileMetadata {
                user: user.to_string(),
                ts: modified_seconds(&path),
                file_url: Some(format!("{}/{}", prefix, relative)),
                file_name: None,
                import_source: ImportSource::BulkImport,
            };

            match self.process_file(&path, &metadata, None).await {
                Ok(summary) => {
                    stats.processed_files += 1;
                    stats.total_chunks += summary.total_chunks;
                    stats.stored_chunks += summary.stored_chunks;
                    stats.failed_chunks += summary.failed_chunks;
                }
                Err(e) => {
                    stats.failed_files += 1;
                    tracing::error!(file = %relative, error = %e, "Failed to import file");
                }
            }
        }

        Ok(stats)
    }
}

fn collect_files(directory: &Path, formats: &[FileFormat]) -> Vec<PathBuf> {
    WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable path");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            FileFormat::from_path(entry.path())
                .map(|format| formats.contains(&format))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}

fn modified_seconds(path: &Path) -> String {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| format!("{:.6}", d.as_secs_f64()))
        .unwrap_or_else(|| "0".to_string())
}

/// Parses a comma separated extension list such as `txt,md,.pdf`.
pub fn parse_formats(list: &str) -> Result<Vec<FileFormat>> {
    list.split(',')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            FileFormat::from_extension(ext)
                .ok_or_else(|| AppError::UnsupportedFormat(format!(".{}", ext.trim_start_matches('.'))))
        })
        .collect()
}
