//! File content extraction.
//!
//! Turns uploaded files into chunk text. Each supported format has its own
//! normalisation rule; the result is handed to storage chunk by chunk.

use std::path::Path;

use serde::Serialize;

use super::chunker::TextChunker;
use crate::types::{AppError, Result};

/// File formats accepted for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileFormat {
    Csv,
    Json,
    Text,
    Markdown,
    Mdx,
    Rst,
    Pdf,
}

impl FileFormat {
    pub const ALL: [FileFormat; 7] = [
        FileFormat::Csv,
        FileFormat::Json,
        FileFormat::Text,
        FileFormat::Markdown,
        FileFormat::Mdx,
        FileFormat::Rst,
        FileFormat::Pdf,
    ];

    /// Looks up a format by extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension().trim_start_matches('.') == ext)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => ".csv",
            FileFormat::Json => ".json",
            FileFormat::Text => ".txt",
            FileFormat::Markdown => ".md",
            FileFormat::Mdx => ".mdx",
            FileFormat::Rst => ".rst",
            FileFormat::Pdf => ".pdf",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv",
            FileFormat::Json => "application/json",
            FileFormat::Text => "text/plain",
            FileFormat::Markdown => "text/markdown",
            FileFormat::Mdx => "text/markdown+jsx",
            FileFormat::Rst => "text/x-rst",
            FileFormat::Pdf => "application/pdf",
        }
    }
}

/// Lowercased extension of `path` including the dot, or an empty string.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Extracts the chunk texts of a file's raw bytes.
pub fn extract_chunks(format: FileFormat, bytes: &[u8], chunker: &TextChunker) -> Result<Vec<String>> {
    match format {
        FileFormat::Pdf => {
            let text = extract_pdf_text(bytes)?;
            Ok(chunker.chunk(&text))
        }
        FileFormat::Csv => extract_csv_rows(bytes),
        FileFormat::Json => extract_json(bytes, chunker),
        FileFormat::Text | FileFormat::Markdown | FileFormat::Mdx | FileFormat::Rst => {
            let text = std::str::from_utf8(bytes).map_err(|e| {
                AppError::InvalidInput(format!("File is not valid UTF-8 text: {}", e))
            })?;
            Ok(chunker.chunk(text))
        }
    }
}

/// Page texts joined by newlines. pdf-extract separates pages with form feeds.
fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::InvalidInput(format!("Failed to read PDF: {}", e)))?;

    Ok(text
        .split('\x0C')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// One chunk per data row, rendered as `column: value` lines.
fn extract_csv_rows(bytes: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| AppError::InvalidInput(format!("Failed to read CSV header: {}", e)))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| AppError::InvalidInput(format!("Failed to read CSV row: {}", e)))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n");
        rows.push(row);
    }

    Ok(rows)
}

/// Arrays are split per element; anything else is chunked as a whole.
fn extract_json(bytes: &[u8], chunker: &TextChunker) -> Result<Vec<String>> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| AppError::InvalidInput(format!("Invalid JSON: {}", e)))?;

    let pretty = |v: &serde_json::Value| {
        serde_json::to_string_pretty(v).map_err(|e| AppError::Internal(e.to_string()))
    };

    match &value {
        serde_json::Value::Array(items) => {
            let mut chunks = Vec::new();
            for item in items {
                chunks.extend(chunker.chunk(&pretty(item)?));
            }
            Ok(chunks)
        }
        other => Ok(chunker.chunk(&pretty(other)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lookup() {
        assert_eq!(FileFormat::from_extension(".PDF"), Some(FileFormat::Pdf));
        assert_eq!(FileFormat::from_extension("mdx"), Some(FileFormat::Mdx));
        assert_eq!(FileFormat::from_extension(".docx"), None);
        assert_eq!(FileFormat::Mdx.media_type(), "text/markdown+jsx");
        assert_eq!(
            FileFormat::from_path(Path::new("notes/readme.rst")),
            Some(FileFormat::Rst)
        );
        assert_eq!(dotted_extension(Path::new("a/B.TXT")), ".txt");
        assert_eq!(dotted_extension(Path::new("Makefile")), "");
    }

    #[test]
    fn test_csv_rows_become_key_value_chunks() {
        let csv = b"col1,col2\nvalue1,value2\nvalue3,value4\n,\n";
        let chunks = extract_chunks(FileFormat::Csv, csv, &TextChunker::default()).unwrap();
        assert_eq!(
            chunks,
            vec!["col1: value1\ncol2: value2", "col1: value3\ncol2: value4"]
        );
    }

    #[test]
    fn test_json_array_splits_per_element() {
        let json = br#"[{"name": "a"}, {"name": "b"}]"#;
        let chunks = extract_chunks(FileFormat::Json, json, &TextChunker::default()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "{\n  \"name\": \"a\"\n}");
    }

    #[test]
    fn test_json_object_is_single_chunk() {
        let json = br#"{"team": "platform", "oncall": true}"#;
        let chunks = extract_chunks(FileFormat::Json, json, &TextChunker::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("\"team\": \"platform\""));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let result = extract_chunks(FileFormat::Json, b"{not json", &TextChunker::default());
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_markdown_is_chunked_as_text() {
        let md = "# Title\n\nSome *markdown* body.";
        let chunks =
            extract_chunks(FileFormat::Markdown, md.as_bytes(), &TextChunker::default()).unwrap();
        assert_eq!(chunks, vec![md.to_string()]);
    }
}
