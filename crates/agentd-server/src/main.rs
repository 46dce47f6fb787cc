use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agentd_core::{ModelFactory, ModelSettings, PgStore, PostgresSettings};
use agentd_server::http;
use agentd_server::service::AppState;

#[derive(Debug, Parser)]
#[command(name = "agentd-server")]
struct Args {
    #[arg(long, env = "AGENTD_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: String,

    #[arg(long, env = "POSTGRES_DB", default_value = "postgres")]
    postgres_db: String,

    #[arg(long, env = "POSTGRES_USER", default_value = "postgres")]
    postgres_user: String,

    #[arg(long, env = "POSTGRES_PASSWORD", default_value = "postgres")]
    postgres_password: String,

    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    postgres_port: u16,

    /// Model name passed to the Ollama-compatible endpoint.
    #[arg(long, env = "OLLAMA_MODEL")]
    ollama_model: Option<String>,

    /// Base URL of the Ollama-compatible endpoint.
    #[arg(long, env = "OLLAMA_BASE_URL")]
    ollama_base_url: Option<String>,

    #[arg(long, env = "AGENTD_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = PostgresSettings {
        database: args.postgres_db,
        user: args.postgres_user,
        password: args.postgres_password,
        host: args.postgres_host,
        port: args.postgres_port,
    };
    let store = match PgStore::connect(&settings, args.max_connections).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("failed to connect to postgres: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = store.ensure_tables().await {
        eprintln!("failed to prepare tables: {e}");
        std::process::exit(2);
    }

    let model_settings = ModelSettings::resolve(args.ollama_model, args.ollama_base_url);
    info!(model = %model_settings.model, base_url = %model_settings.base_url, "model configured");
    let factory = Arc::new(ModelFactory::new(model_settings));

    let state = AppState::new(store.clone(), store.clone(), factory);
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&args.http_addr)
        .await
        .expect("failed to bind http listener");
    info!(addr = %args.http_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("http server crashed");

    store.close().await;
}
