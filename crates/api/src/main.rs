mod dto;
mod error;
mod metrics;
mod routes;
mod state;

use anyhow::Context;
use pipeline::{Providers, Settings};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    pipeline::init_tracing(&settings.log)?;

    let providers = Providers::from_settings(&settings)
        .await
        .context("Failed to initialise providers")?;

    let bind = settings.server.bind.clone();
    let state = AppState::new(settings, providers)?;
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    tracing::info!(address = %bind, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
