//! Local corpus retriever.
//!
//! Walks a directory for `.md`, `.markdown` and `.txt` files, splits them
//! into chunks with the `text-splitter` crate and answers queries by
//! term overlap. Markdown files use `MarkdownSplitter` for heading-aware
//! splitting; plain text uses `TextSplitter`.
//!
//! The index is built once at construction. A missing or empty directory is
//! not an error at startup: queries report [`RetrievalError::IndexNotFound`]
//! and the retrieval step continues with no documents.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use text_splitter::{MarkdownSplitter, TextSplitter};

use studyflow_core::retrieval::retriever::Retriever;
use studyflow_types::retrieval::{RetrievalError, RetrievedSnippet};

/// Terms shorter than this are ignored when ranking.
const MIN_TERM_LEN: usize = 2;

#[derive(Debug)]
struct Chunk {
    source: String,
    ordinal: usize,
    content: String,
    terms: HashMap<String, u32>,
}

/// In-memory index over a directory of study notes.
#[derive(Debug)]
pub struct CorpusRetriever {
    root: PathBuf,
    chunks: Vec<Chunk>,
}

impl CorpusRetriever {
    /// Index every supported file under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Backend`] when an existing directory cannot
    /// be listed. A missing `root` yields an empty index; files that cannot
    /// be read as UTF-8 text are skipped with a warning.
    pub async fn open(root: impl AsRef<Path>, chunk_chars: usize) -> Result<Self, RetrievalError> {
        let root = root.as_ref().to_path_buf();
        let mut retriever = Self::empty(&root);

        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            tracing::info!(corpus = %root.display(), "corpus directory not found, retrieval disabled");
            return Ok(retriever);
        }

        let files = collect_files(&root).await?;
        let chunk_chars = chunk_chars.max(1);
        let mut indexed = 0usize;
        for path in &files {
            let text = match tokio::fs::read_to_string(path).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable corpus file");
                    continue;
                }
            };
            indexed += 1;
            let source = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            for (ordinal, content) in split(path, &text, chunk_chars).into_iter().enumerate() {
                retriever.chunks.push(Chunk {
                    source: source.clone(),
                    ordinal,
                    terms: term_counts(&content),
                    content,
                });
            }
        }

        tracing::info!(
            corpus = %root.display(),
            files = indexed,
            skipped = files.len() - indexed,
            chunks = retriever.chunks.len(),
            "corpus indexed"
        );
        Ok(retriever)
    }

    /// An index with no documents; every query reports
    /// [`RetrievalError::IndexNotFound`].
    pub fn empty(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            chunks: Vec::new(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl Retriever for CorpusRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedSnippet>, RetrievalError> {
        if self.chunks.is_empty() {
            return Err(RetrievalError::IndexNotFound(format!(
                "no documents indexed under {}",
                self.root.display()
            )));
        }

        let query_terms: HashSet<String> = term_counts(query).into_keys().collect();
        let mut scored: Vec<(u32, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(idx, chunk)| {
                let matched = query_terms
                    .iter()
                    .filter_map(|t| chunk.terms.get(t))
                    .sum::<u32>();
                (matched > 0).then_some((matched, idx))
            })
            .collect();
        // Highest overlap first; index order breaks ties.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(matched, idx)| {
                let chunk = &self.chunks[idx];
                let mut metadata = Map::new();
                metadata.insert("source".to_string(), Value::from(chunk.source.clone()));
                metadata.insert("chunk".to_string(), Value::from(chunk.ordinal));
                metadata.insert("matched_terms".to_string(), Value::from(matched));
                RetrievedSnippet {
                    content: chunk.content.clone(),
                    metadata,
                }
            })
            .collect())
    }
}

fn is_indexable(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("md" | "markdown" | "txt")
    )
}

fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("md" | "markdown")
    )
}

/// Iterative directory walk, sorted for a stable chunk order.
async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, RetrievalError> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| RetrievalError::Backend(format!("failed to list {}: {e}", dir.display())))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RetrievalError::Backend(e.to_string()))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| RetrievalError::Backend(e.to_string()))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && is_indexable(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn split(path: &Path, text: &str, chunk_chars: usize) -> Vec<String> {
    let chunks: Vec<String> = if is_markdown(path) {
        MarkdownSplitter::new(chunk_chars)
            .chunks(text)
            .map(str::to_string)
            .collect()
    } else {
        TextSplitter::new(chunk_chars)
            .chunks(text)
            .map(str::to_string)
            .collect()
    };
    chunks.into_iter().filter(|c| !c.trim().is_empty()).collect()
}

fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
    {
        *counts.entry(term.to_lowercase()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn corpus() -> TempDir {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("ownership.md"),
            "# Ownership\n\nEach value in Rust has a single owner. Ownership moves on assignment.",
        )
        .await
        .unwrap();
        tokio::fs::create_dir(tmp.path().join("nested")).await.unwrap();
        tokio::fs::write(
            tmp.path().join("nested/borrowing.txt"),
            "Borrowing lends access to a value without taking ownership.",
        )
        .await
        .unwrap();
        tokio::fs::write(tmp.path().join("image.png"), [0u8, 1, 2]).await.unwrap();
        tmp
    }

    #[tokio::test]
    async fn indexes_supported_files_only() {
        let tmp = corpus().await;
        let retriever = CorpusRetriever::open(tmp.path(), 512).await.unwrap();
        assert_eq!(retriever.chunk_count(), 2);
    }

    #[tokio::test]
    async fn ranks_by_term_overlap() {
        let tmp = corpus().await;
        let retriever = CorpusRetriever::open(tmp.path(), 512).await.unwrap();

        let hits = retriever.retrieve("What is ownership in Rust?", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].content.contains("single owner"));
        assert_eq!(hits[0].metadata["source"], "ownership.md");
        assert_eq!(hits[1].metadata["source"], "nested/borrowing.txt");

        let top = retriever.retrieve("ownership", 1).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn unrelated_query_returns_nothing() {
        let tmp = corpus().await;
        let retriever = CorpusRetriever::open(tmp.path(), 512).await.unwrap();
        assert!(retriever.retrieve("photosynthesis", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_reports_no_index() {
        let tmp = TempDir::new().unwrap();
        let retriever = CorpusRetriever::open(tmp.path().join("absent"), 512)
            .await
            .unwrap();
        assert!(matches!(
            retriever.retrieve("ownership", 5).await,
            Err(RetrievalError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn non_utf8_files_are_skipped() {
        let tmp = corpus().await;
        // Latin-1 "café" is not valid UTF-8.
        tokio::fs::write(tmp.path().join("latin1.txt"), [0x63u8, 0x61, 0x66, 0xe9])
            .await
            .unwrap();

        let retriever = CorpusRetriever::open(tmp.path(), 512).await.unwrap();
        assert_eq!(retriever.chunk_count(), 2);
        assert_eq!(retriever.retrieve("ownership", 5).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_index_reports_no_index() {
        let retriever = CorpusRetriever::empty("/nowhere");
        assert_eq!(retriever.chunk_count(), 0);
        assert!(matches!(
            retriever.retrieve("ownership", 5).await,
            Err(RetrievalError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn long_files_are_chunked() {
        let tmp = TempDir::new().unwrap();
        let paragraph = "Lifetimes describe how long references stay valid. ".repeat(20);
        let text = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");
        tokio::fs::write(tmp.path().join("lifetimes.txt"), text).await.unwrap();

        let retriever = CorpusRetriever::open(tmp.path(), 256).await.unwrap();
        assert!(retriever.chunk_count() > 1);
        let hits = retriever.retrieve("lifetimes", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_ne!(hits[0].metadata["chunk"], hits[1].metadata["chunk"]);
    }
}
