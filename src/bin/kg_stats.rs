//! Knowledge graph statistics and lookups.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use obsidian_autolink::config::Neo4jConfig;
use obsidian_autolink::GraphStore;

#[derive(Parser)]
#[command(name = "kg_stats")]
#[command(about = "Show knowledge graph statistics")]
struct Cli {
    /// List the entities extracted from the note with this title
    #[arg(long)]
    note: Option<String>,

    /// List the notes mentioning an entity (substring, case-insensitive)
    #[arg(long)]
    entity: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("obsidian_autolink=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let store = GraphStore::connect(&Neo4jConfig::from_env()?).await?;

    let stats = store.stats().await?;
    println!("=== Knowledge graph ===\n{}", stats);

    if let Some(title) = cli.note.as_deref() {
        let entities = store.entities_in_note(title).await?;
        println!("=== Entities in \"{}\" ({}) ===", title, entities.len());
        if entities.is_empty() {
            println!("  (none)");
        }
        for entity in &entities {
            println!("  {} [{}]", entity.name, entity.types.join(", "));
        }
        println!();
    }

    if let Some(name) = cli.entity.as_deref() {
        let notes = store.notes_with_entity(name).await?;
        println!("=== Notes mentioning \"{}\" ({}) ===", name, notes.len());
        if notes.is_empty() {
            println!("  (none)");
        }
        for note in &notes {
            println!("  {} ({})", note.title, note.path);
        }
    }

    Ok(())
}
