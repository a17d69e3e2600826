use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use yesbee_http::{Config, Gateway};

#[derive(Parser, Debug)]
#[command(name = "yesbee-http", version, about)]
struct Args {
    /// Path to the YAML route configuration
    #[arg(short, long, env = "YESBEE_HTTP_CONFIG")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "yesbee_http=info")]
    log_level: String,

    /// Abort open connections on shutdown instead of draining them
    #[arg(long)]
    force_close: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_file(&args.config)?;
    info!(
        "Loaded {} route(s) from {}",
        config.routes.len(),
        args.config.display()
    );

    let gateway = Gateway::new(&config);
    if let Err(e) = gateway.start().await {
        gateway.shutdown(true).await;
        return Err(e.into());
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    gateway.shutdown(args.force_close).await;
    Ok(())
}
