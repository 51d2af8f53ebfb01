use anyhow::Context;
use clap::Parser;
use icp_lookup::server::{build_router, AppState};
use icp_lookup::utils::{error::LookupError, logger};
use icp_lookup::CliArgs;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            // 日誌尚未初始化，直接輸出
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(&config.logging.format, config.logging.verbose);
    tracing::info!("Starting icp-lookup {}", env!("CARGO_PKG_VERSION"));

    let auth_key = config
        .server
        .usable_auth_key()
        .map(str::to_string)
        .ok_or_else(|| LookupError::MissingConfigError {
            field: "server.auth_key".to_string(),
        })?;

    let service = config.build_service().await?;
    let app = build_router(AppState::new(Arc::new(service), auth_key));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("🌐 Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("👋 icp-lookup stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
