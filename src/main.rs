use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pubgraph::config::{Backend, Config};
use pubgraph::server::{ServerState, serve};
use pubgraph::{InMemoryStorage, Storage, Subgraph};

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[cfg(feature = "postgres")]
async fn postgres_storage(config: &Config) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    let storage = pubgraph::pg_storage::PgStorage::connect(
        &config.database_url(),
        config.max_connections,
    )
    .await?;
    if config.migrate || config.drop {
        storage.migrate(config.drop).await?;
    }
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_storage(_: &Config) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    Err("this build has no PostgreSQL support, rebuild with --features postgres".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();
    let config = Config::parse();
    info!(listen = %config.listen, backend = ?config.backend, policy = ?config.policy, "starting pubgraph");

    let storage: Arc<dyn Storage> = match config.backend {
        Backend::Memory => Arc::new(InMemoryStorage::new()),
        Backend::Postgres => postgres_storage(&config).await.inspect_err(|e| {
            error!(error = %e, "storage backend unavailable");
        })?,
    };

    let subgraph = Arc::new(Subgraph::with_storage(storage, config.policy.permission())?);
    if let Some(path) = &config.seed {
        subgraph.load_seed(path).await?;
    }

    let listener = TcpListener::bind(config.listen).await?;
    let state = Arc::new(ServerState {
        subgraph,
        principal_header: config.principal_header.clone(),
    });
    serve(listener, state).await?;
    Ok(())
}
