//! # DELVE World Generator CLI
//!
//! Initializes a world into a SQLite file and prints the topology report of
//! the starting Subzone.
//!
//! ```bash
//! worldgen ./world.db                # random seed
//! worldgen ./world.db ember-vault    # fixed seed
//! DELVE_CONFIG=delve.toml RUST_LOG=delve=debug worldgen ./world.db
//! ```

use std::error::Error;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use delve::{TemplateTextGenerator, ThemedPopulator, World, WorldConfig};
use delve_persistence::{SqliteStore, WorldStore};
use delve_procedural::TopologyValidator;
use tracing::info;
use tracing_subscriber::EnvFilter;

const GLOBAL_LORE: &str = "Beneath the old kingdom the earth remembers every vault that was sealed.";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("delve=info".parse()?))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(db_path) = args.next() else {
        eprintln!("usage: worldgen <db-path> [seed]");
        std::process::exit(2);
    };
    let seed = args.next().unwrap_or_else(|| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos());
        format!("{nanos:x}")
    });

    let config = match std::env::var("DELVE_CONFIG") {
        Ok(path) => WorldConfig::load(path)?,
        Err(_) => WorldConfig::production(),
    };

    let store: Arc<dyn WorldStore> = Arc::new(SqliteStore::open(&db_path)?);
    let world = World::open(
        config,
        store,
        Arc::new(TemplateTextGenerator),
        Arc::new(ThemedPopulator),
    )?;
    let created = world.initialize(&seed, GLOBAL_LORE).await?;
    info!(seed = %created.seed, start = %created.starting_space, "world ready");

    let persistence = world.persistence();
    let start = persistence
        .node(&created.starting_space)?
        .ok_or("starting space missing from storage")?;
    let nodes = persistence.subzone_nodes(&start.chunk_id)?;
    let report = TopologyValidator::validate(&nodes);

    println!("world     {db_path}");
    println!("seed      {}", created.seed);
    println!("start     {}", created.starting_space);
    println!("subzone   {}", start.chunk_id);
    println!("nodes     {}", report.node_count);
    println!("reachable {}", report.reachable);
    println!("cycle     {}", report.has_cycle);
    println!("degree    {:.2}", report.average_out_degree);
    println!("frontiers {}", report.frontier_count);
    if report.passed() {
        println!("status    valid");
    } else {
        for reason in report.reasons() {
            println!("failure   {reason}");
        }
    }

    world.shutdown().await?;
    Ok(())
}
