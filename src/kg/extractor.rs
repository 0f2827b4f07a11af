//! LLM-backed entity and relationship extraction.
//!
//! Each chunk is sent to the chat model with the graph schema in the system
//! prompt. The reply is parsed as JSON and filtered so that only schema
//! labels, schema relationship types and relationships between extracted
//! entities survive.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::schema::GraphSchema;
use crate::integrations::openai::{ChatMessage, ChatOptions, OpenAIClient};
use crate::{Error, Result};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("valid code fence regex")
});

/// Entity found in a chunk, label already mapped onto the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntity {
    pub name: String,
    pub label: String,
    pub description: Option<String>,
}

/// Relationship between two extracted entities, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRelationship {
    pub source: String,
    pub target: String,
    pub relation_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedGraph {
    pub entities: Vec<ExtractedEntity>,
    pub relationships: Vec<ExtractedRelationship>,
}

impl ExtractedGraph {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    entities: Vec<RawEntity>,
    #[serde(default, alias = "relations")]
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    name: String,
    #[serde(default, alias = "type")]
    label: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    source: String,
    target: String,
    #[serde(rename = "type", alias = "relation_type")]
    relation_type: String,
}

/// Extracts a schema-constrained graph from chunk text with a chat model.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    client: OpenAIClient,
    model: String,
    schema: GraphSchema,
    options: ChatOptions,
}

impl EntityExtractor {
    pub fn new(client: OpenAIClient, model: impl Into<String>, schema: GraphSchema) -> Self {
        Self {
            client,
            model: model.into(),
            schema,
            options: ChatOptions {
                json_response: true,
                ..Default::default()
            },
        }
    }

    pub async fn extract(&self, text: &str) -> Result<ExtractedGraph> {
        let messages = vec![
            ChatMessage::system(system_prompt(&self.schema)),
            ChatMessage::user(text),
        ];

        let reply = self
            .client
            .chat_completion(messages, &self.model, &self.options)
            .await?;

        let graph = parse_extraction(&reply, &self.schema)?;
        debug!(
            "Extracted {} entities, {} relationships",
            graph.entities.len(),
            graph.relationships.len()
        );
        Ok(graph)
    }
}

pub fn system_prompt(schema: &GraphSchema) -> String {
    format!(
        "You extract a knowledge graph from personal Markdown notes.\n\
         Allowed entity labels: {}.\n\
         Allowed relationship types: {}.\n\
         Return only a JSON object of the form \
         {{\"entities\": [{{\"name\": \"...\", \"label\": \"...\", \"description\": \"...\"}}], \
         \"relationships\": [{{\"source\": \"...\", \"target\": \"...\", \"type\": \"...\"}}]}}.\n\
         Relationship source and target must be names of entities you returned. \
         Treat [[wiki links]] as references to entities. \
         Omit anything that does not fit the allowed labels or types.",
        schema.entity_types.join(", "),
        schema.relationship_types.join(", "),
    )
}

/// Parse a model reply and keep only what fits `schema`.
pub fn parse_extraction(reply: &str, schema: &GraphSchema) -> Result<ExtractedGraph> {
    let body = CODE_FENCE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply);

    let raw: RawExtraction = serde_json::from_str(body)
        .map_err(|e| Error::Extraction(format!("model returned invalid JSON: {}", e)))?;

    Ok(filter_to_schema(raw, schema))
}

fn filter_to_schema(raw: RawExtraction, schema: &GraphSchema) -> ExtractedGraph {
    let mut graph = ExtractedGraph::default();
    // lowercased name -> index into graph.entities
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for entity in raw.entities {
        let name = entity.name.trim();
        if name.is_empty() {
            continue;
        }
        let Some(label) = schema.entity_label(&entity.label) else {
            debug!("Dropping entity {:?} with unknown label {:?}", name, entity.label);
            continue;
        };
        let key = name.to_lowercase();
        if let Some(&idx) = by_name.get(&key) {
            let existing = &mut graph.entities[idx];
            if existing.description.is_none() {
                existing.description = clean_description(entity.description);
            }
            continue;
        }
        by_name.insert(key, graph.entities.len());
        graph.entities.push(ExtractedEntity {
            name: name.to_string(),
            label: label.to_string(),
            description: clean_description(entity.description),
        });
    }

    for rel in raw.relationships {
        let Some(relation_type) = schema.relationship_type(&rel.relation_type) else {
            continue;
        };
        let source = by_name.get(&rel.source.trim().to_lowercase());
        let target = by_name.get(&rel.target.trim().to_lowercase());
        let (Some(&source), Some(&target)) = (source, target) else {
            continue;
        };
        if source == target {
            continue;
        }

        let relationship = ExtractedRelationship {
            source: graph.entities[source].name.clone(),
            target: graph.entities[target].name.clone(),
            relation_type: relation_type.to_string(),
        };
        if !graph.relationships.contains(&relationship) {
            graph.relationships.push(relationship);
        }
    }

    graph
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
