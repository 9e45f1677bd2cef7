use clap::Parser;
use parley::{Cli, PersistenceGateway, RelayServerBuilder, SqliteStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // `parley` also matches the parley_* library targets.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("parley=info")),
        )
        .init();

    tracing::info!("Parley relay v{} starting", env!("CARGO_PKG_VERSION"));

    let gateway = match &cli.database {
        Some(path) => {
            tracing::info!(path = %path.display(), "opening message history");
            PersistenceGateway::start(SqliteStore::open(path))
        }
        None => {
            tracing::info!("no database configured, history disabled");
            PersistenceGateway::disabled()
        }
    };

    let server = RelayServerBuilder::new()
        .bind(&cli.bind_addr())
        .config(cli.relay_config())
        .build(gateway)
        .await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server.run_until(shutdown_signal()).await?;
    tracing::info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        // Without a signal handler, keep serving until killed.
        std::future::pending::<()>().await;
    }
}
