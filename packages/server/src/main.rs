use std::net::SocketAddr;

use tracing::{Level, info};

use formdesk_server::config::AppConfig;
use formdesk_server::state::AppState;
use formdesk_server::{build_router, database, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load()?;
    let db = database::init_db(&config.database).await?;
    seed::ensure_indexes(&db).await?;
    seed::ensure_super_admin(&db, &config.bootstrap).await?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = build_router(AppState { db, config });

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
