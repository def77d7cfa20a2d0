//! Corpus ingestion: loading source documents and splitting them into
//! retrievable passages
//!
//! CSV rows become one document each, built from a configured set of content
//! columns rendered as `column: value` lines. Plain-text files are taken
//! whole. [`TextSplitter`] then windows documents into character chunks with
//! optional overlap.

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::retrieval::Passage;

/// Character-window splitter.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 750,
            chunk_overlap: 0,
        }
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        // A window needs at least one char, and overlap must leave forward
        // progress, or the split loop would never advance.
        let chunk_size = chunk_size.max(1);
        let chunk_overlap = chunk_overlap.min(chunk_size - 1);
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split on char boundaries so multi-byte text never panics.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        let stride = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += stride;
        }
        chunks
    }

    /// Split a whole document into passages tagged with its source.
    pub fn passages(&self, text: &str, source: &str) -> Vec<Passage> {
        self.split(text)
            .into_iter()
            .map(|content| Passage {
                content,
                source: source.to_string(),
            })
            .collect()
    }
}

/// Load a CSV corpus, rendering `content_columns` of each row into one
/// document. Columns absent from the header or empty in a row are skipped.
pub fn load_csv(path: impl AsRef<Path>, content_columns: &[&str]) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let indices: Vec<(usize, String)> = content_columns
        .iter()
        .filter_map(|col| {
            headers
                .iter()
                .position(|h| h == *col)
                .map(|i| (i, col.to_string()))
        })
        .collect();

    let mut documents = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut parts = Vec::new();
        for (idx, name) in &indices {
            if let Some(value) = record.get(*idx) {
                if !value.trim().is_empty() {
                    parts.push(format!("{name}: {value}"));
                }
            }
        }
        if !parts.is_empty() {
            documents.push(parts.join("\n"));
        }
    }
    info!(path = %path.display(), documents = documents.len(), "loaded csv corpus");
    Ok(documents)
}

/// Load every regular file in a directory as one document each, sorted by
/// file name.
pub fn load_text_dir(dir: impl AsRef<Path>) -> Result<Vec<(String, String)>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir.as_ref())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let text = std::fs::read_to_string(&path)?;
        documents.push((name, text));
    }
    Ok(documents)
}
