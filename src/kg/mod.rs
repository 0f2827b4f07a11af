//! Knowledge graph construction.
//!
//! The ingestion driver only sees the [`GraphBuilder`] trait: hand it a batch
//! of note paths, get back success or failure. The default implementation,
//! [`Neo4jGraphBuilder`], splits each note into chunks, extracts entities and
//! relationships with an OpenAI chat model, embeds the chunks and writes
//! everything to Neo4j.

pub mod embeddings;
pub mod extractor;
pub mod pipeline;
pub mod schema;
pub mod splitter;
pub mod store;

use async_trait::async_trait;

use crate::batch::Batch;
use crate::Result;

pub use embeddings::EmbeddingService;
pub use extractor::{EntityExtractor, ExtractedEntity, ExtractedGraph, ExtractedRelationship};
pub use pipeline::Neo4jGraphBuilder;
pub use schema::GraphSchema;
pub use splitter::{TextChunk, TextSplitter};
pub use store::{GraphStats, GraphStore};

/// What a builder wrote for one batch. Informational only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub notes: usize,
    pub skipped_notes: usize,
    pub chunks: usize,
    pub entities: usize,
    pub relationships: usize,
}

impl std::ops::AddAssign for BatchReport {
    fn add_assign(&mut self, other: Self) {
        self.notes += other.notes;
        self.skipped_notes += other.skipped_notes;
        self.chunks += other.chunks;
        self.entities += other.entities;
        self.relationships += other.relationships;
    }
}

/// Ingests a batch of notes into the knowledge graph.
#[async_trait]
pub trait GraphBuilder: Send + Sync {
    async fn build(&self, batch: &Batch<'_>) -> Result<BatchReport>;
}
