//! Storage event relay
//!
//! Receives Cloud Storage "object finalized" events and forwards the new
//! document to the agent service as a session plus a message.
//!
//! ## Usage
//!
//! ```bash
//! # On Cloud Run, identity tokens come from the metadata server
//! TARGET_APP_URL=https://coa-agent-xyz.a.run.app gcs-event-relay
//!
//! # Locally, against a coa-agent started with `serve`
//! TARGET_APP_URL=http://127.0.0.1:8000 gcs-event-relay --static-token-env DEV_TOKEN --port 8081
//! ```

use clap::Parser;
use coa_agent::auth::{MetadataTokenProvider, StaticTokenProvider, TokenProvider};
use coa_agent::config::RelayConfig;
use coa_agent::observability::init_default_logging;
use coa_agent::relay::{server, EventRelay};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "gcs-event-relay",
    about = "Relay Cloud Storage upload events to the COA agent service"
)]
#[command(version)]
struct Args {
    /// Listen port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Read a fixed bearer token from this environment variable instead of
    /// the metadata server
    #[arg(long, value_name = "VAR")]
    static_token_env: Option<String>,

    /// Metadata server base URL
    #[arg(long, env = "METADATA_URL")]
    metadata_url: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_default_logging();

    if let Err(e) = run(args).await {
        error!("Relay failed to start: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = RelayConfig::from_env()?;
    if config.target_url.is_none() {
        // Keep serving; every event will answer with a configuration error
        error!("TARGET_APP_URL environment variable is not set");
    }

    let tokens: Arc<dyn TokenProvider> = match (&args.static_token_env, &args.metadata_url) {
        (Some(var), _) => Arc::new(StaticTokenProvider::from_env(var)?),
        (None, Some(url)) => Arc::new(MetadataTokenProvider::with_base_url(url.clone())?),
        (None, None) => Arc::new(MetadataTokenProvider::new()?),
    };

    let port = args.port.unwrap_or(config.port);
    info!(
        target_url = config.target_url.as_deref().unwrap_or("<unset>"),
        app = %config.app_name,
        "Relay configured"
    );

    let relay = Arc::new(EventRelay::new(config, tokens)?);
    server::serve(relay, port).await;
    Ok(())
}
