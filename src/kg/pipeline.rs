//! Default [`GraphBuilder`]: notes in, chunks, embeddings and extracted
//! entities out to Neo4j.
//!
//! Per note the pipeline is load, split, extract, embed, upsert. Notes that
//! cannot be read are skipped with a warning; any other error fails the batch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::embeddings::EmbeddingService;
use super::extractor::EntityExtractor;
use super::splitter::TextSplitter;
use super::store::{GraphStore, StoredChunk};
use super::{BatchReport, GraphBuilder};
use crate::batch::Batch;
use crate::config::Config;
use crate::integrations::OpenAIClient;
use crate::vault::NoteDocument;
use crate::Result;

/// Builds the graph in Neo4j with OpenAI extraction and embeddings.
pub struct Neo4jGraphBuilder {
    store: GraphStore,
    extractor: EntityExtractor,
    embeddings: EmbeddingService,
    splitter: TextSplitter,
    vault_root: PathBuf,
}

impl Neo4jGraphBuilder {
    /// Connect to Neo4j, prepare constraints and set up the OpenAI clients.
    pub async fn connect(config: &Config) -> Result<Self> {
        let store = GraphStore::connect(&config.neo4j).await?;
        let builder = Self::with_store(store, config)?;
        builder
            .store
            .init_schema(&config.schema, builder.embeddings.dimension())
            .await?;
        Ok(builder)
    }

    pub fn with_store(store: GraphStore, config: &Config) -> Result<Self> {
        let mut chat = OpenAIClient::new(config.openai_api_key.as_str())?;
        if let Some(base) = config.openai_base_url.as_deref() {
            chat = chat.with_base_url(base);
        }

        Ok(Self {
            store,
            extractor: EntityExtractor::new(
                chat,
                config.openai_model.as_str(),
                config.schema.clone(),
            ),
            embeddings: EmbeddingService::new(
                &config.openai_api_key,
                config.openai_embedding_model.as_str(),
                config.openai_base_url.as_deref(),
            )?,
            splitter: TextSplitter::default(),
            vault_root: config.vault_path.clone(),
        })
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    async fn ingest_note(&self, path: &Path) -> Result<BatchReport> {
        let skipped = BatchReport {
            skipped_notes: 1,
            ..Default::default()
        };
        let Some(note) = read_note(path, &self.vault_root) else {
            return Ok(skipped);
        };
        if note.is_blank() {
            warn!("Skipping empty note {}", note.relative_path);
            return Ok(skipped);
        }

        let chunks = self.splitter.split(&note.content);
        let mut extractions = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            extractions.push(self.extractor.extract(&chunk.text).await?);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embeddings.embed_batch(&texts).await?;

        self.store.upsert_note(&note).await?;

        let mut report = BatchReport {
            notes: 1,
            ..Default::default()
        };
        let mut previous_id = None;

        for ((chunk, extraction), embedding) in chunks.iter().zip(&extractions).zip(&vectors) {
            let id = chunk_id(&note.relative_path, chunk.index);
            self.store
                .upsert_chunk(&StoredChunk {
                    id: id.clone(),
                    note_path: &note.relative_path,
                    index: chunk.index,
                    text: &chunk.text,
                    embedding,
                    previous_id: previous_id.take(),
                })
                .await?;

            for entity in &extraction.entities {
                self.store.upsert_entity(&id, entity).await?;
            }
            for relationship in &extraction.relationships {
                self.store.upsert_relationship(relationship).await?;
            }

            report.chunks += 1;
            report.entities += extraction.entities.len();
            report.relationships += extraction.relationships.len();
            previous_id = Some(id);
        }

        debug!(
            "Ingested {} ({} chunks, {} entities)",
            note.title, report.chunks, report.entities
        );
        Ok(report)
    }
}

#[async_trait]
impl GraphBuilder for Neo4jGraphBuilder {
    async fn build(&self, batch: &Batch<'_>) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for path in batch.files {
            report += self.ingest_note(path).await?;
        }

        info!(
            "Batch {}/{}: {} notes, {} chunks, {} entities, {} relationships",
            batch.index,
            batch.total,
            report.notes,
            report.chunks,
            report.entities,
            report.relationships
        );
        Ok(report)
    }
}

/// Load a note, or log and skip it when it is unreadable or not UTF-8.
fn read_note(path: &Path, vault_root: &Path) -> Option<NoteDocument> {
    match NoteDocument::load(path, vault_root) {
        Ok(note) => Some(note),
        Err(err) => {
            warn!("Skipping unreadable note: {}", err);
            None
        }
    }
}

/// Stable chunk id, so re-running a note overwrites rather than duplicates.
pub fn chunk_id(note_path: &str, index: usize) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("obsidian://{}#{}", note_path, index).as_bytes(),
    )
    .to_string()
}
