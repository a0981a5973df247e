//! Materialized Path Demo Binary
//!
//! Builds the location tree (Africa, Europe and the Swedish subtree) in an
//! in-memory Store, moves Sweden to Africa, removes it again, and prints the
//! children tree after each step.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin mpath-demo
//!
//! # Cascade removal and a custom separator
//! MPATH_CONFIG='{"onDelete":"DELETE","pathSeparator":"|"}' cargo run --bin mpath-demo
//! ```
//!
//! # Environment Variables
//!
//! - `MPATH_CONFIG`: JSON `MpathConfig`; omitted keys take their defaults
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::env;
use std::sync::Arc;

use anyhow::Context;
use mpath_core::db::InMemoryStore;
use mpath_core::{ChildrenTreeArgs, MpathConfig, Node, NodeService, TrackedNode, TreeNode};
use serde_json::json;

const LOCATIONS: [(&str, Option<&str>, &str); 6] = [
    ("af", None, "Africa"),
    ("eu", None, "Europe"),
    ("no", Some("eu"), "Norway"),
    ("se", Some("eu"), "Sweden"),
    ("sthlm", Some("se"), "Stockholm"),
    ("skansen", Some("sthlm"), "Skansen"),
];

fn load_config() -> anyhow::Result<MpathConfig> {
    match env::var("MPATH_CONFIG") {
        Ok(raw) => serde_json::from_str(&raw).context("MPATH_CONFIG is not a valid config"),
        Err(_) => Ok(MpathConfig::default()),
    }
}

async fn print_tree(service: &NodeService, title: &str) -> anyhow::Result<()> {
    let forest: Vec<TreeNode> = service.get_children_tree(ChildrenTreeArgs::new()).await?;
    println!("== {} ==", title);
    println!("{}", serde_json::to_string_pretty(&forest)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!("Config: {:?}", config);

    let store = Arc::new(InMemoryStore::new());
    let service = NodeService::with_config(store.clone(), config)?;

    for (id, parent, name) in LOCATIONS {
        let mut doc = TrackedNode::new(Node::new_with_id(
            id.to_string(),
            parent.map(str::to_string),
            json!({ "name": name }),
        ));
        let saved = service.save(&mut doc).await?;
        tracing::info!(
            "{} saved at '{}' (level {})",
            name,
            saved.path.as_deref().unwrap_or_default(),
            service.level(&saved)
        );
    }
    print_tree(&service, "initial").await?;

    let mut sweden = service.get("se").await?;
    sweden.set_parent(Some("af".to_string()));
    service.save(&mut sweden).await?;
    print_tree(&service, "Sweden moved to Africa").await?;

    service.remove(sweden.node()).await?;
    print_tree(&service, "Sweden removed").await?;

    let stats = store.stats();
    tracing::info!(
        "Store traffic: {} read(s), {} write(s), peak {} concurrent update(s)",
        stats.reads,
        stats.writes,
        stats.max_concurrent_updates
    );

    Ok(())
}
