//! The per-question retrieval pipeline: extract, chunk, embed, rank, and
//! compose the context string.
//!
//! Nothing here survives a question: embeddings are recomputed on every
//! round, exactly as often as the question pipeline runs.

use anyhow::{Context, Result};
use paperchat_retrieval::chunker::{chunk_text, ChunkerConfig};
use paperchat_retrieval::{compose_context, rank, EmbeddingProvider};
use paperchat_schema::{Chunk, EmbeddedChunk, RankedChunk, UploadedFile};

use crate::config::RetrievalConfig;

/// A file the pipeline had to skip, with a human-readable reason.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct GatheredContext {
    /// The composed context block (or the fixed fallback sentence).
    pub context: String,
    pub ranked: Vec<RankedChunk>,
    pub skipped: Vec<SkippedFile>,
    /// Total chunks produced before ranking.
    pub chunk_count: usize,
}

/// Run the retrieval pipeline for one question over the uploaded files.
///
/// File-level failures (unsupported type, bad encoding, broken PDF) never
/// abort the batch; they are collected into `skipped`. Embedding-service
/// failures are fatal to the question round and propagate.
pub async fn gather_context(
    files: &[UploadedFile],
    question: &str,
    embedder: &dyn EmbeddingProvider,
    retrieval: &RetrievalConfig,
) -> Result<GatheredContext> {
    let chunker = ChunkerConfig {
        chunk_size: retrieval.chunk_size,
        overlap: retrieval.chunk_overlap,
    };

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut skipped = Vec::new();
    for file in files {
        match paperchat_extract::extract(file) {
            Ok(text) => {
                for piece in chunk_text(&text, &chunker) {
                    chunks.push(Chunk {
                        source_file: file.name.clone(),
                        text: piece,
                    });
                }
            }
            Err(err) => {
                tracing::warn!(file = %file.name, "skipping file: {err}");
                skipped.push(SkippedFile {
                    name: file.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    let chunk_count = chunks.len();
    if chunks.is_empty() {
        return Ok(GatheredContext {
            context: compose_context(&[]),
            ranked: Vec::new(),
            skipped,
            chunk_count: 0,
        });
    }

    let query_vector = embedder
        .embed(&[question.to_string()])
        .await
        .context("failed to embed the question")?
        .embeddings
        .into_iter()
        .next()
        .context("embedding service returned no vector for the question")?;

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embedded_result = embedder
        .embed(&texts)
        .await
        .context("failed to embed document chunks")?;
    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(embedded_result.embeddings)
        .map(|(chunk, vector)| EmbeddedChunk {
            source_file: chunk.source_file,
            text: chunk.text,
            vector,
        })
        .collect();

    let ranked = rank(&query_vector, embedded, retrieval.top_k);
    let context = compose_context(&ranked);

    tracing::debug!(
        chunks = chunk_count,
        ranked = ranked.len(),
        skipped = skipped.len(),
        "gathered context"
    );

    Ok(GatheredContext {
        context,
        ranked,
        skipped,
        chunk_count,
    })
}
