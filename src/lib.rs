//! Obsidian vault to Neo4j knowledge graph ingester
//!
//! This library provides tools to:
//! - Discover markdown notes in an Obsidian vault
//! - Split the notes into fixed-size batches
//! - Build a knowledge graph in Neo4j from each batch (chunks, embeddings,
//!   extracted entities and relationships)
//! - Inspect and clear the resulting graph
//! - Expose batch metrics to Prometheus

pub mod batch;
pub mod config;
pub mod error;
pub mod ingest;
pub mod integrations;
pub mod kg;
pub mod metrics;
pub mod vault;

// Re-export common types
pub use batch::{batches, Batch};
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{FailurePolicy, IngestOptions, RunSummary};
pub use integrations::OpenAIClient;
pub use kg::{GraphBuilder, GraphStore, Neo4jGraphBuilder};
