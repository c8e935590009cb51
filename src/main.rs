use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use admission_portal::MemorySessionStore;
use admission_portal::middleware::{PortalConfig, PortalState, portal_routes, protect};
use axum::Router;
use clap::Parser;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: SocketAddr,
    /// Directory of prebuilt pages and static assets.
    #[arg(long, default_value = "public")]
    assets: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = PortalConfig::from_env()?;
    info!(
        sandwich_mode = config.sandwich_mode(),
        session_ttl = %config.session_ttl(),
        "portal configured"
    );

    let store = MemorySessionStore::new();
    let sweeper = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sweeper.purge_expired().await;
            if removed > 0 {
                info!(removed, "purged expired sessions");
            }
        }
    });

    let state = PortalState::new(config, store);
    let pages = ServeDir::new(&args.assets).append_index_html_on_directories(true);
    let app = protect(
        Router::new()
            .merge(portal_routes(state.clone()))
            .fallback_service(pages),
        state,
    )
    .layer(TraceLayer::new_for_http());

    info!("admission-portal listening on {}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
