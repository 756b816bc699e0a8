//! Vellum API server binary.
//!
//! Reads configuration from the environment (and `.env`), connects the
//! document store and serves the API until interrupted.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use vellum_api::config::ApiConfig;
use vellum_core::documents::{ClientRegistry, MemoryConnector, PgConnector, StoreConnector};
use vellum_core::oauth::OAuthClient;

/// Document store backend.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreBackend {
    /// PostgreSQL JSONB documents (migrations run on start).
    Postgres,
    /// In-process store; data is lost on exit.
    Memory,
}

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "vellum_server", about = "Vellum API server")]
struct Args {
    /// Port to listen on; overrides the port in `BIND_ADDR`.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Document store backend.
    #[arg(long, env = "DOCUMENT_STORE", value_enum, default_value_t = StoreBackend::Postgres)]
    store: StoreBackend,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,vellum_api=debug,vellum_core=debug")),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env()?;
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map_or("127.0.0.1", |(host, _)| host);
        config.bind_addr = format!("{host}:{port}");
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    info!(bind_addr = %config.bind_addr, store = ?args.store, "starting vellum_server");

    let connector: Arc<dyn StoreConnector> = match args.store {
        StoreBackend::Postgres => {
            info!(max_connections = args.max_connections, "configuring connection pool");
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(std::time::Duration::from_secs(30))
                .connect(&config.database_url)
                .await?;

            info!("running database migrations");
            vellum_api::migrate(&pool).await?;
            Arc::new(PgConnector::new(pool))
        }
        StoreBackend::Memory => Arc::new(MemoryConnector::new()),
    };

    let stores = Arc::new(ClientRegistry::new(connector));
    let oauth = OAuthClient::new(config.oauth.clone(), Arc::clone(&stores))?;
    let app = vellum_api::router(vellum_api::AppState::new(oauth, stores));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
