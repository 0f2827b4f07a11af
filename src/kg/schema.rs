//! Entity labels and relationship types the extractor is allowed to emit.

/// Entity labels recognised by default.
pub const DEFAULT_ENTITY_TYPES: &[&str] =
    &["Person", "Book", "Topic", "Organisation", "Article", "Paper"];

/// Relationship types recognised by default.
pub const DEFAULT_RELATIONSHIP_TYPES: &[&str] =
    &["MENTIONS", "RELATES_TO", "WRITTEN_BY", "ABOUT", "PART_OF"];

/// Closed set of labels and relationship types for the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSchema {
    pub entity_types: Vec<String>,
    pub relationship_types: Vec<String>,
}

impl Default for GraphSchema {
    fn default() -> Self {
        Self {
            entity_types: DEFAULT_ENTITY_TYPES.iter().map(|s| s.to_string()).collect(),
            relationship_types: DEFAULT_RELATIONSHIP_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl GraphSchema {
    /// Canonical label for `raw`, matched case-insensitively.
    pub fn entity_label(&self, raw: &str) -> Option<&str> {
        let raw = raw.trim();
        self.entity_types
            .iter()
            .find(|t| t.eq_ignore_ascii_case(raw))
            .map(String::as_str)
    }

    /// Canonical relationship type for `raw`; spaces and dashes map to `_`.
    pub fn relationship_type(&self, raw: &str) -> Option<&str> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        self.relationship_types
            .iter()
            .find(|t| **t == normalized)
            .map(String::as_str)
    }
}

/// True if `name` can be spliced into Cypher as a label or relationship type.
pub fn is_cypher_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_matches_vault_domain() {
        let schema = GraphSchema::default();
        assert_eq!(schema.entity_types.len(), 6);
        assert!(schema.entity_types.contains(&"Organisation".to_string()));
        assert!(schema.relationship_types.contains(&"WRITTEN_BY".to_string()));
    }

    #[test]
    fn entity_labels_match_case_insensitively() {
        let schema = GraphSchema::default();
        assert_eq!(schema.entity_label("person"), Some("Person"));
        assert_eq!(schema.entity_label(" BOOK "), Some("Book"));
        assert_eq!(schema.entity_label("Location"), None);
    }

    #[test]
    fn relationship_types_are_normalized() {
        let schema = GraphSchema::default();
        assert_eq!(schema.relationship_type("written by"), Some("WRITTEN_BY"));
        assert_eq!(schema.relationship_type("part-of"), Some("PART_OF"));
        assert_eq!(schema.relationship_type("ABOUT"), Some("ABOUT"));
        assert_eq!(schema.relationship_type("LIKES"), None);
    }

    #[test]
    fn every_default_name_is_a_safe_identifier() {
        let schema = GraphSchema::default();
        for name in schema
            .entity_types
            .iter()
            .chain(schema.relationship_types.iter())
        {
            assert!(is_cypher_identifier(name), "{name}");
        }
        assert!(!is_cypher_identifier("Bad Label"));
        assert!(!is_cypher_identifier("x`) DETACH DELETE n //"));
        assert!(!is_cypher_identifier("1Person"));
        assert!(!is_cypher_identifier(""));
    }
}
