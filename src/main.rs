use std::{net::SocketAddr, sync::Arc, time::Duration};

mod app;
mod auth;
mod catalog;
mod config;
mod db;
mod error;
mod files;
mod folders;
mod routes;
mod sessions;
mod share;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "foldershare=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let db = db::connect(&config).await?;
    db::migrate(&db).await?;

    let state = AppState::init(config.clone(), db.clone()).await?;
    let sweeper = sessions::sweeper::spawn(
        state.sessions.clone(),
        Duration::from_secs(config.session.sweep_secs),
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let result = app::serve(app::build_app(state), addr).await;

    sweeper.abort();
    db.close().await;
    tracing::info!("server stopped");
    result
}
