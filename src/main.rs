use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::sync::Arc;

mod birthdays;
mod commands;
mod errors;
mod models;
mod routes;
mod seed;
mod settings;
mod store;
mod validation;

use commands::{Args, Commands};
use routes::{AppState, local_today};
use settings::Settings;
use store::ContactStore;

async fn open_store(settings: &Settings) -> Result<ContactStore> {
    let store = ContactStore::connect(settings)
        .await
        .context("Could not connect to database")?;
    store
        .ensure_schema()
        .await
        .context("Database error while creating contacts table")?;
    Ok(store)
}

async fn serve(settings: Settings, bind: Option<String>) -> Result<()> {
    let store = open_store(&settings).await?;
    let address = bind.unwrap_or_else(|| settings.bind_address.clone());

    let app = routes::router(AppState {
        store: store.clone(),
        settings: Arc::new(settings),
        today: local_today,
    });

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Could not bind to {address}"))?;
    tracing::info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {:?}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Args::parse();
    match cli.command {
        Some(Commands::Serve { bind }) => serve(Settings::from_env()?, bind).await?,
        Some(Commands::InitDb) => {
            open_store(&Settings::from_env()?).await?;
            tracing::info!("Contacts table ready");
        }
        Some(Commands::Seed { count }) => {
            let store = open_store(&Settings::from_env()?).await?;
            seed::seed_contacts(&store, count).await?;
        }
        None => {
            println!("Run with --help to see instructions");
        }
    }

    Ok(())
}
