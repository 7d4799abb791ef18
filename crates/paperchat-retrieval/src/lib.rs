//! Retrieval pipeline building blocks: chunking, embedding, ranking, and
//! context composition.

pub mod chunker;
pub mod composer;
pub mod embedding;
pub mod ranker;

pub use chunker::{chunk_text, ChunkerConfig};
pub use composer::{compose_context, CONTEXT_INTRO, EMPTY_CONTEXT_FALLBACK};
pub use embedding::{
    EmbeddingProvider, EmbeddingResult, OpenAiEmbeddingProvider, StubEmbeddingProvider,
};
pub use ranker::{cosine_similarity, rank, DEFAULT_TOP_K};
