//! Demonstration binary: wires an in-memory [`workers_platform::Platform`]
//! behind the thin HTTP front-end and serves it. Not required by the spec
//! (a library's exit codes/env vars/CLI are N/A) but useful for exercising
//! the seed scenarios end to end.

use std::sync::Arc;

use workers_platform::bundler::EchoBundler;
use workers_platform::config::settings::ServerSettings;
use workers_platform::facade::{Platform, Stores};
use workers_platform::http::router;
use workers_platform::loader::InMemoryLoader;
use workers_platform::storage::memory::InMemoryStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = ServerSettings::load();

    let storage = InMemoryStorage::new();
    let platform = Arc::new(Platform::new(
        Stores::from(storage),
        Arc::new(EchoBundler),
        Arc::new(InMemoryLoader),
    ));

    let addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "workers-platform control plane listening");

    axum::serve(listener, router(platform)).await?;

    Ok(())
}
