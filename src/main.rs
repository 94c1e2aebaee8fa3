use anyhow::{Context, Result};
use csvpump::{
    broker,
    config::Config,
    fetch::HttpZipSource,
    publish,
    table::load_table,
};
use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let cfg = Config::from_env().context("loading configuration")?;
    info!(?cfg, "configured");

    // ─── 3) provision + load dataset ─────────────────────────────────
    let source = HttpZipSource::new(Client::new());
    let table = load_table(
        &cfg.dataset_filename,
        &cfg.dataset_url,
        &cfg.dataset_dir,
        &source,
    )
    .await?;

    // ─── 4) connect to the broker ────────────────────────────────────
    let channel = broker::connect(&cfg.username, &cfg.password, &cfg.queue_name).await?;

    // ─── 5) publish until Ctrl-C ─────────────────────────────────────
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let sent = publish::run(&channel, &table, &cfg.queue_name, shutdown).await;

    info!(sent, "all done");
    Ok(())
}
