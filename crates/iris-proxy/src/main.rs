//! `iris-proxy` binary entrypoint.

use clap::Parser;
use iris_proxy::{kimi, serve, ProxyConfig};
use std::path::PathBuf;

/// Anthropic Messages proxy for OpenAI-compatible backends
#[derive(Parser, Debug)]
#[command(name = "iris-proxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: iris.{jsonc,json,yml,yaml} in the working
    /// directory or ~/.config/iris)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Respect `RUST_LOG` if set; otherwise default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    kimi::init_patterns();

    let mut config = ProxyConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    serve(config).await
}
