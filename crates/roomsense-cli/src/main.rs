//! roomsense - ゲートウェイのサーバ
//!
//! 1. 設定の読み込み（TOML + 環境変数）
//! 2. tracing の初期化
//! 3. 画像ディレクトリとテレメトリストアの準備
//! 4. 画像ディレクトリのバックアップ（失敗しても起動は続ける）
//! 5. HTTP サーバの起動。Ctrl-C で停止

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use roomsense_core::app::{bootstrap, snapshot_media};
use roomsense_core::config::GatewayConfig;
use roomsense_core::http::router;
use roomsense_core::observability::init_tracing;
use roomsense_core::ports::{Clock, SystemClock};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "roomsense", about = "IoT gateway for classroom sensors and cameras")]
struct Cli {
    /// TOML 設定ファイル（省略時はデフォルト + 環境変数のみ）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 起動時のバックアップを行わない
    #[arg(long)]
    no_backup: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        bail!("config file not found: {}", path.display());
    }
    let config = GatewayConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to initialise logging")?;

    let gateway = bootstrap(&config).await.context("failed to start gateway")?;
    info!(
        media_dir = %config.media.dir.display(),
        telemetry = ?config.telemetry.path,
        devices = config.devices.len(),
        "gateway initialised"
    );

    if config.backup.enabled && !cli.no_backup {
        if let Err(e) =
            snapshot_media(&config.media.dir, &config.backup.root, SystemClock.now()).await
        {
            error!(error = %e, "media backup failed");
        }
    } else {
        info!("startup backup disabled");
    }

    let app = router(Arc::new(gateway));
    let listener = tokio::net::TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(addr = %config.server.bind, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
