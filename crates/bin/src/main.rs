use std::path::Path;

use clap::Parser;
use driftdoc::{
    Document,
    backend::InMemory,
    config::{DocumentConfig, NetworkConfig},
    sync::{ChannelLink, Network, connect_pair},
};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands, DemoSyncArgs};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("driftdoc=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DocumentConfig::from_file(path)?,
        None => DocumentConfig::default(),
    };
    let document = open(&cli.db, config).await?;

    match cli.command {
        Commands::Get { path } => {
            let value = document.get(&path).await?;
            println!("{}", serde_json::to_string_pretty(&value.unwrap_or(Value::Null))?);
        }
        Commands::Set { path, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            document.set(&path, value).await?;
            save(&document, &cli.db).await?;
        }
        Commands::Delete { path } => {
            document.delete(&path).await?;
            save(&document, &cli.db).await?;
        }
        Commands::NewId => println!("{}", document.new_unique_id()),
        Commands::DemoSync(args) => demo_sync(document, &cli.db, args).await?,
    }
    Ok(())
}

async fn open(db: &Path, config: DocumentConfig) -> CliResult<Document> {
    let backend = InMemory::load_from_file(db).await?;
    debug!(path = %db.display(), "loaded document file");
    Ok(Document::open(Box::new(backend), config).await?)
}

async fn save(document: &Document, db: &Path) -> CliResult<()> {
    if let Some(backend) = document.backend().as_any().downcast_ref::<InMemory>() {
        backend.save_to_file(db).await?;
        info!(path = %db.display(), "saved document");
    }
    Ok(())
}

/// Loads the document into the first of `args.peers` in-memory peers, lets
/// each peer write its own key, and pumps the links until every copy agrees.
async fn demo_sync(document: Document, db: &Path, args: DemoSyncArgs) -> CliResult<()> {
    let base = document.config().network.clone();
    let mut networks = vec![Network::new(document.clone()).await?];
    for i in 1..args.peers.max(2) {
        let replica = Document::open(Box::new(InMemory::new()), DocumentConfig::default()).await?;
        let config = NetworkConfig {
            peer_id: Some(format!("peer-{i}")),
            ..base.clone()
        };
        networks.push(Network::with_config(replica, config).await?);
    }

    let mut links: Vec<ChannelLink> = Vec::new();
    for pair in networks.windows(2) {
        links.push(connect_pair(&pair[0], &pair[1]).await?);
    }
    for network in &networks {
        let id = network.peer_id().to_string();
        network.document().set(&format!("peers.{id}"), true).await?;
    }

    let mut frames = 0;
    loop {
        let mut delivered = 0;
        for link in &mut links {
            delivered += link.pump().await?;
        }
        if delivered == 0 {
            break;
        }
        frames += delivered;
    }
    info!(frames, peers = networks.len(), "mesh settled");

    for network in &networks {
        let hash = network.document().root_hash().await?;
        println!("{}  {hash}", network.peer_id());
    }
    let view = document.get("").await?.unwrap_or(Value::Null);
    println!("{}", serde_json::to_string_pretty(&view)?);

    if args.save {
        save(&document, db).await?;
    }
    Ok(())
}
