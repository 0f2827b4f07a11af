//! Run configuration
//!
//! Built once at startup from environment variables (and `.env`, loaded by the
//! binaries) and passed by reference to every component afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::kg::schema::GraphSchema;

pub const NEO4J_URI: &str = "NEO4J_URI";
pub const NEO4J_USERNAME: &str = "NEO4J_USERNAME";
pub const NEO4J_PASSWORD: &str = "NEO4J_PASSWORD";
pub const NEO4J_DATABASE: &str = "NEO4J_DATABASE";
pub const AURA_INSTANCEID: &str = "AURA_INSTANCEID";
pub const AURA_INSTANCENAME: &str = "AURA_INSTANCENAME";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const OPENAI_EMBEDDING_MODEL: &str = "OPENAI_EMBEDDING_MODEL";
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const OBSIDIAN_VAULT_PATH: &str = "OBSIDIAN_VAULT_PATH";
pub const BATCH_SIZE: &str = "BATCH_SIZE";

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// Neo4j connection settings. The maintenance tools need only these.
#[derive(Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub aura_instance_id: Option<String>,
    pub aura_instance_name: Option<String>,
}

impl Neo4jConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(&lookup, key);
        let require = |key: &str| {
            get(key).ok_or_else(|| Error::configuration(key, "required variable is not set"))
        };

        Ok(Self {
            uri: require(NEO4J_URI)?,
            username: require(NEO4J_USERNAME)?,
            password: require(NEO4J_PASSWORD)?,
            database: require(NEO4J_DATABASE)?,
            aura_instance_id: get(AURA_INSTANCEID),
            aura_instance_name: get(AURA_INSTANCENAME),
        })
    }
}

impl fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("aura_instance_id", &self.aura_instance_id)
            .field("aura_instance_name", &self.aura_instance_name)
            .finish()
    }
}

/// Validated run configuration.
#[derive(Clone)]
pub struct Config {
    pub neo4j: Neo4jConfig,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_embedding_model: String,
    /// Override for the OpenAI API base (proxies, compatible servers)
    pub openai_base_url: Option<String>,
    pub vault_path: PathBuf,
    pub batch_size: usize,
    pub schema: GraphSchema,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from the process environment, with a per-run batch size
    /// (e.g. `--batch-size`) taking precedence over `BATCH_SIZE`.
    pub fn from_env_with_batch_size(batch_size: Option<usize>) -> Result<Self> {
        Self::from_lookup_with_batch_size(|key| std::env::var(key).ok(), batch_size)
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with_batch_size(lookup, None)
    }

    /// Like [`Config::from_lookup`]. When `batch_size` is given, `BATCH_SIZE`
    /// is not read at all.
    pub fn from_lookup_with_batch_size<F>(lookup: F, batch_size: Option<usize>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(&lookup, key);
        let require = |key: &str| {
            get(key).ok_or_else(|| Error::configuration(key, "required variable is not set"))
        };

        let batch_size = match (batch_size, get(BATCH_SIZE)) {
            (Some(0), _) => {
                return Err(Error::configuration(
                    "--batch-size",
                    "must be a positive integer",
                ))
            }
            (Some(n), _) => n,
            (None, Some(raw)) => parse_batch_size(BATCH_SIZE, &raw)?,
            (None, None) => DEFAULT_BATCH_SIZE,
        };

        let vault_path = PathBuf::from(require(OBSIDIAN_VAULT_PATH)?);
        validate_vault_path(&vault_path)?;

        Ok(Self {
            neo4j: Neo4jConfig::from_lookup(&lookup)?,
            openai_api_key: require(OPENAI_API_KEY)?,
            openai_model: get(OPENAI_MODEL).unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_embedding_model: get(OPENAI_EMBEDDING_MODEL)
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            openai_base_url: get(OPENAI_BASE_URL),
            vault_path,
            batch_size,
            schema: GraphSchema::default(),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("neo4j", &self.neo4j)
            .field("openai_api_key", &"***")
            .field("openai_model", &self.openai_model)
            .field("openai_embedding_model", &self.openai_embedding_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("vault_path", &self.vault_path)
            .field("batch_size", &self.batch_size)
            .field("schema", &self.schema)
            .finish()
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_batch_size(field: &str, raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(0) => Err(Error::configuration(field, "must be at least 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(Error::configuration(
            field,
            format!("expected a positive integer, got {:?}", raw),
        )),
    }
}

fn validate_vault_path(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::configuration(
            OBSIDIAN_VAULT_PATH,
            format!("{} is not a directory", path.display()),
        )),
        Err(err) => Err(Error::configuration(
            OBSIDIAN_VAULT_PATH,
            format!("{} is not accessible: {}", path.display(), err),
        )),
    }
}
