//! Knowledge graph persistence in Neo4j

use std::collections::BTreeMap;

use neo4rs::{query, ConfigBuilder, Graph};
use tracing::{debug, info};

use super::extractor::{ExtractedEntity, ExtractedRelationship};
use super::schema::{is_cypher_identifier, GraphSchema};
use crate::config::Neo4jConfig;
use crate::vault::NoteDocument;
use crate::{Error, Result};

/// Label shared by every extracted entity node.
pub const ENTITY_LABEL: &str = "__Entity__";

/// Graph store backed by Neo4j
#[derive(Clone)]
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    /// Connect to the configured Neo4j database
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.username.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .build()?;
        let graph = Graph::connect(neo4j_config).await?;

        debug!("Connected to Neo4j at {}", config.uri);
        Ok(Self { graph })
    }

    /// Initialize schema with constraints and indexes.
    ///
    /// Every entity label gets a uniqueness constraint on `name`, which makes
    /// concurrent `MERGE`s of the same entity resolve to one node.
    pub async fn init_schema(&self, schema: &GraphSchema, embedding_dimension: usize) -> Result<()> {
        for statement in schema_statements(schema, embedding_dimension)? {
            self.graph.run(query(&statement)).await?;
        }

        info!("Neo4j schema ready");
        Ok(())
    }

    /// Create or update the note node and drop chunks from earlier runs.
    pub async fn upsert_note(&self, note: &NoteDocument) -> Result<()> {
        let q = query(
            "MERGE (n:Note {path: $path})
             SET n.title = $title,
                 n.file_path = $file_path,
                 n.updated_at = datetime()
             WITH n
             OPTIONAL MATCH (n)<-[:FROM_NOTE]-(old:Chunk)
             DETACH DELETE old",
        )
        .param("path", note.relative_path.clone())
        .param("title", note.title.clone())
        .param("file_path", note.path.to_string_lossy().to_string());

        self.graph.run(q).await?;
        debug!("Upserted note: {}", note.relative_path);
        Ok(())
    }

    /// Create a chunk node linked to its note and to the previous chunk.
    pub async fn upsert_chunk(&self, chunk: &StoredChunk<'_>) -> Result<()> {
        let embedding: Vec<f64> = chunk.embedding.iter().map(|v| f64::from(*v)).collect();

        let q = query(
            "MATCH (n:Note {path: $note_path})
             MERGE (c:Chunk {id: $id})
             SET c.index = $index,
                 c.text = $text,
                 c.embedding = $embedding
             MERGE (c)-[:FROM_NOTE]->(n)",
        )
        .param("note_path", chunk.note_path)
        .param("id", chunk.id.as_str())
        .param("index", chunk.index as i64)
        .param("text", chunk.text)
        .param("embedding", embedding);

        self.graph.run(q).await?;

        if let Some(previous) = chunk.previous_id.as_deref() {
            let link = query(
                "MATCH (prev:Chunk {id: $prev_id})
                 MATCH (c:Chunk {id: $id})
                 MERGE (prev)-[:NEXT_CHUNK]->(c)",
            )
            .param("prev_id", previous)
            .param("id", chunk.id.as_str());

            self.graph.run(link).await?;
        }

        Ok(())
    }

    /// Merge an entity by name and label, and link it to the chunk it came from.
    pub async fn upsert_entity(&self, chunk_id: &str, entity: &ExtractedEntity) -> Result<()> {
        let label = checked_identifier(&entity.label)?;

        // Labels cannot be parameters; `label` is validated above.
        let cypher = format!(
            "MATCH (c:Chunk {{id: $chunk_id}})
             MERGE (e:{ENTITY_LABEL}:{label} {{name: $name}})
             SET e.description = coalesce($description, e.description)
             MERGE (e)-[:FROM_CHUNK]->(c)"
        );

        let q = query(&cypher)
            .param("chunk_id", chunk_id)
            .param("name", entity.name.clone())
            .param("description", entity.description.clone());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Merge a typed relationship between two entities.
    pub async fn upsert_relationship(&self, relationship: &ExtractedRelationship) -> Result<()> {
        let rel_type = checked_identifier(&relationship.relation_type)?;

        let cypher = format!(
            "MATCH (a:{ENTITY_LABEL} {{name: $source}})
             MATCH (b:{ENTITY_LABEL} {{name: $target}})
             MERGE (a)-[:{rel_type}]->(b)"
        );

        let q = query(&cypher)
            .param("source", relationship.source.clone())
            .param("target", relationship.target.clone());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Node counts by first label and relationship counts by type.
    pub async fn stats(&self) -> Result<GraphStats> {
        let mut stats = GraphStats::default();

        let mut nodes = self
            .graph
            .execute(query(
                "MATCH (n) RETURN labels(n) AS labels, count(n) AS count",
            ))
            .await?;
        while let Some(row) = nodes.next().await? {
            let labels: Vec<String> = row.get("labels").unwrap_or_default();
            let count: i64 = row.get("count").unwrap_or(0);
            if let Some(label) = labels.into_iter().next() {
                *stats.nodes.entry(label).or_insert(0) += count as u64;
            }
        }

        let mut rels = self
            .graph
            .execute(query(
                "MATCH ()-[r]->() RETURN type(r) AS rel_type, count(r) AS count",
            ))
            .await?;
        while let Some(row) = rels.next().await? {
            let rel_type: String = row.get("rel_type").unwrap_or_default();
            let count: i64 = row.get("count").unwrap_or(0);
            *stats.relationships.entry(rel_type).or_insert(0) += count as u64;
        }

        Ok(stats)
    }

    /// Delete every relationship, then every node.
    pub async fn clear(&self) -> Result<ClearCounts> {
        let relationships_deleted = self
            .count_query("MATCH ()-[r]->() DELETE r RETURN count(r) AS deleted")
            .await?;
        let nodes_deleted = self
            .count_query("MATCH (n) DELETE n RETURN count(n) AS deleted")
            .await?;

        info!(
            "Deleted {} nodes and {} relationships",
            nodes_deleted, relationships_deleted
        );
        Ok(ClearCounts {
            nodes_deleted,
            relationships_deleted,
        })
    }

    async fn count_query(&self, cypher: &str) -> Result<u64> {
        let mut result = self.graph.execute(query(cypher)).await?;
        match result.next().await? {
            Some(row) => Ok(row.get::<i64>("deleted").unwrap_or(0) as u64),
            None => Ok(0),
        }
    }

    /// Entities extracted from the note with this title.
    pub async fn entities_in_note(&self, title: &str) -> Result<Vec<EntityRef>> {
        let q = query(
            "MATCH (n:Note {title: $title})<-[:FROM_NOTE]-(:Chunk)<-[:FROM_CHUNK]-(e:__Entity__)
             RETURN DISTINCT e.name AS name,
                    [l IN labels(e) WHERE l <> '__Entity__'] AS types
             ORDER BY name",
        )
        .param("title", title);

        let mut result = self.graph.execute(q).await?;
        let mut entities = Vec::new();
        while let Some(row) = result.next().await? {
            entities.push(EntityRef {
                name: row.get("name").unwrap_or_default(),
                types: row.get("types").unwrap_or_default(),
            });
        }
        Ok(entities)
    }

    /// Notes mentioning an entity whose name contains `name` (case-insensitive).
    pub async fn notes_with_entity(&self, name: &str) -> Result<Vec<NoteRef>> {
        let q = query(
            "MATCH (e:__Entity__)
             WHERE toLower(e.name) CONTAINS toLower($name)
             MATCH (e)-[:FROM_CHUNK]->(:Chunk)-[:FROM_NOTE]->(n:Note)
             RETURN DISTINCT n.title AS title, n.path AS path
             ORDER BY path",
        )
        .param("name", name);

        let mut result = self.graph.execute(q).await?;
        let mut notes = Vec::new();
        while let Some(row) = result.next().await? {
            notes.push(NoteRef {
                title: row.get("title").unwrap_or_default(),
                path: row.get("path").unwrap_or_default(),
            });
        }
        Ok(notes)
    }
}

fn schema_statements(schema: &GraphSchema, embedding_dimension: usize) -> Result<Vec<String>> {
    let mut statements = vec![
        "CREATE CONSTRAINT note_path IF NOT EXISTS FOR (n:Note) REQUIRE n.path IS UNIQUE"
            .to_string(),
        "CREATE CONSTRAINT chunk_id IF NOT EXISTS FOR (c:Chunk) REQUIRE c.id IS UNIQUE"
            .to_string(),
        "CREATE INDEX note_title IF NOT EXISTS FOR (n:Note) ON (n.title)".to_string(),
        format!("CREATE INDEX entity_name IF NOT EXISTS FOR (e:{ENTITY_LABEL}) ON (e.name)"),
        format!(
            "CREATE VECTOR INDEX chunk_embedding IF NOT EXISTS FOR (c:Chunk) ON (c.embedding)
             OPTIONS {{indexConfig: {{`vector.dimensions`: {embedding_dimension}, `vector.similarity_function`: 'cosine'}}}}"
        ),
    ];

    for label in &schema.entity_types {
        let label = checked_identifier(label)?;
        statements.push(format!(
            "CREATE CONSTRAINT entity_{}_name IF NOT EXISTS FOR (e:{label}) REQUIRE e.name IS UNIQUE",
            label.to_lowercase()
        ));
    }

    Ok(statements)
}

fn checked_identifier(name: &str) -> Result<&str> {
    if is_cypher_identifier(name) {
        Ok(name)
    } else {
        Err(Error::Graph(format!("refusing unsafe label or type {:?}", name)))
    }
}

/// Chunk row written to the graph.
#[derive(Debug, Clone)]
pub struct StoredChunk<'a> {
    pub id: String,
    pub note_path: &'a str,
    pub index: usize,
    pub text: &'a str,
    pub embedding: &'a [f32],
    pub previous_id: Option<String>,
}

/// Graph statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: BTreeMap<String, u64>,
    pub relationships: BTreeMap<String, u64>,
}

impl GraphStats {
    pub fn total_nodes(&self) -> u64 {
        self.nodes.values().sum()
    }

    pub fn total_relationships(&self) -> u64 {
        self.relationships.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_nodes() == 0 && self.total_relationships() == 0
    }
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Nodes: {}", self.total_nodes())?;
        for (label, count) in &self.nodes {
            writeln!(f, "  {:<20} {}", label, count)?;
        }
        writeln!(f, "Relationships: {}", self.total_relationships())?;
        for (rel_type, count) in &self.relationships {
            writeln!(f, "  {:<20} {}", rel_type, count)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClearCounts {
    pub nodes_deleted: u64,
    pub relationships_deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub name: String,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRef {
    pub title: String,
    pub path: String,
}
