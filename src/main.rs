//! Wren - ReAct 工具调用智能体服务
//!
//! 入口：加载配置、初始化日志与 AgentService，启动 HTTP 服务，收到 Ctrl+C / SIGTERM 时优雅关闭。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use wren::{config::load_config, observability, server, AgentService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 第一个参数可指定额外的配置文件
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    observability::init(&cfg.app.log_level);
    cfg.validate().context("Invalid config")?;

    let addr = cfg.server.bind_addr();
    tracing::info!(name = %cfg.app.name, version = %cfg.app.version, "Starting");

    let service = Arc::new(AgentService::new(cfg));
    service
        .initialize()
        .await
        .context("Failed to initialize agent service")?;

    let app = server::router(Arc::clone(&service));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "Listening");

    let shutdown_service = Arc::clone(&service);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_service.shutdown().await;
        })
        .await
        .context("Server error")?;

    tracing::info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
