//! Folder ingestion: documents -> word-window chunks -> embeddings -> store

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::chunking::{chunk_words, ChunkConfig};
use super::embeddings::Embedder;
use super::store::{NewChunk, VectorStore};

const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    /// Files skipped because they could not be read as UTF-8 text
    pub skipped: Vec<String>,
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|d| d.eq_ignore_ascii_case(ext))
        })
}

/// Index every `.txt`/`.md` file directly inside `folder`.
///
/// Documents are numbered in file-name order; chunk ids are
/// `{doc_id}_chunk_{i}` and each chunk's source is its file name.
/// The collection is created on demand, bound to the embedder's model.
pub async fn ingest_folder(
    folder: &Path,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    collection: &str,
    config: ChunkConfig,
) -> Result<IngestReport> {
    if !folder.is_dir() {
        bail!("{} is not a directory", folder.display());
    }

    store
        .ensure_collection(collection, embedder.model())
        .await
        .with_context(|| format!("Failed to prepare collection '{}'", collection))?;

    let mut files: Vec<_> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_document(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    let mut report = IngestReport::default();

    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Skipping unreadable document");
                report.skipped.push(file_name);
                continue;
            }
        };

        let doc_id = report.documents;
        report.documents += 1;

        let chunks = chunk_words(&text, config);
        if chunks.is_empty() {
            continue;
        }

        let embeddings = embedder
            .embed(&chunks)
            .await
            .with_context(|| format!("Failed to embed {}", file_name))?;
        if embeddings.len() != chunks.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks of {}",
                embeddings.len(),
                chunks.len(),
                file_name
            );
        }

        let rows: Vec<NewChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| NewChunk {
                id: format!("{}_chunk_{}", doc_id, i),
                text,
                source: file_name.clone(),
                embedding,
            })
            .collect();

        report.chunks += rows.len();
        store
            .upsert(collection, rows)
            .await
            .with_context(|| format!("Failed to store chunks of {}", file_name))?;
        info!(file = %file_name, doc_id, "Indexed document");
    }

    info!(
        documents = report.documents,
        chunks = report.chunks,
        collection,
        "Ingestion finished"
    );
    Ok(report)
}
