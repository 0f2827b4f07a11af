//! Wipe the knowledge graph.
//!
//! Prints what is about to be deleted, asks for confirmation, then removes
//! every relationship and node and checks that nothing is left.

use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use obsidian_autolink::config::Neo4jConfig;
use obsidian_autolink::GraphStore;

#[derive(Parser)]
#[command(name = "clear_kg")]
#[command(about = "Delete every node and relationship from the knowledge graph")]
struct Cli {
    /// Skip the confirmation prompt
    #[arg(short, long, default_value_t = false)]
    yes: bool,
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
    let config = Neo4jConfig::from_env()?;
    let store = GraphStore::connect(&config).await?;

    let before = store.stats().await?;
    println!("=== Current graph ({}) ===\n{}", config.database, before);

    if before.is_empty() {
        println!("Graph is already empty, nothing to do");
        return Ok(());
    }

    if !cli.yes && !confirm("Type 'yes' to delete everything: ")? {
        println!("Aborted");
        return Ok(());
    }

    let counts = store.clear().await?;
    println!(
        "Deleted {} relationships and {} nodes",
        counts.relationships_deleted, counts.nodes_deleted
    );

    let after = store.stats().await?;
    if !after.is_empty() {
        anyhow::bail!(
            "graph still has {} nodes and {} relationships",
            after.total_nodes(),
            after.total_relationships()
        );
    }

    println!("Graph is empty");
    Ok(())
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input)? == 0 {
        return Ok(false);
    }
    Ok(input.trim().eq_ignore_ascii_case("yes"))
}
