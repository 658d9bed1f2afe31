//! COA hold agent - main entry point
//!
//! `serve` hosts the agent service the relay talks to, `run` pushes a single
//! document through the hold pipeline from the command line.

use clap::{Parser, Subcommand};
use coa_agent::auth::{MetadataTokenProvider, StaticTokenProvider, TokenProvider};
use coa_agent::config::{AgentConfig, AuthMode, StorageBackend};
use coa_agent::ledger::HoldLedger;
use coa_agent::llm::provider::LlmProvider;
use coa_agent::llm::providers::{VertexConfig, VertexGeminiProvider};
use coa_agent::observability::init_default_logging;
use coa_agent::pipeline::{HoldPipeline, PipelineSettings};
use coa_agent::service::{self, AgentService};
use coa_agent::storage::{GcsConfig, GcsObjectStore, LocalObjectStore, ObjectStore};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// COA hold-decision agent
#[derive(Parser)]
#[command(name = "coa-agent")]
#[command(about = "Checks certificates of analysis against spec sheets and records product holds")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "COA_AGENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the agent HTTP API
    Serve {
        /// Listen port (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the pipeline once for a document
    Run {
        /// Document URI, e.g. gs://bucket/coa.pdf
        #[arg(long)]
        uri: String,
    },
    /// List the records in the hold ledger
    Holds,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting coa-agent v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Run { uri } => run_once(config, &uri).await,
        Commands::Holds => list_holds(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(AgentConfig::load_from_file(path)?);
    }

    for path_str in ["coa-agent.toml", "config/coa-agent.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(AgentConfig::load_from_file(&path)?);
        }
    }

    info!("No configuration file found, using defaults and environment");
    Ok(AgentConfig::from_env()?)
}

/// Builds collaborators from configuration
struct Collaborators {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn ObjectStore>,
}

impl Collaborators {
    fn from_config(config: &AgentConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let tokens = Self::token_provider(config)?;
        Ok(Self {
            llm: Self::llm_provider(config, tokens.clone())?,
            store: Self::object_store(config, tokens)?,
        })
    }

    fn token_provider(
        config: &AgentConfig,
    ) -> Result<Arc<dyn TokenProvider>, Box<dyn std::error::Error>> {
        Ok(match config.auth.mode {
            AuthMode::Metadata => match &config.auth.metadata_url {
                Some(url) => Arc::new(MetadataTokenProvider::with_base_url(url.clone())?),
                None => Arc::new(MetadataTokenProvider::new()?),
            },
            AuthMode::Static => Arc::new(StaticTokenProvider::from_env(&config.auth.token_env)?),
        })
    }

    fn llm_provider(
        config: &AgentConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Arc<dyn LlmProvider>, Box<dyn std::error::Error>> {
        match config.llm.provider.as_str() {
            "vertex" => {
                let vertex_config = VertexConfig {
                    project: config.project()?.to_string(),
                    location: config.llm.location.clone(),
                    base_url: config.llm.base_url.clone(),
                    timeout: config.llm_timeout(),
                };
                Ok(Arc::new(VertexGeminiProvider::new(vertex_config, tokens)?))
            }
            provider => Err(format!("Unsupported LLM provider: {provider}").into()),
        }
    }

    fn object_store(
        config: &AgentConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error>> {
        match config.storage.backend {
            StorageBackend::Gcs => {
                let gcs_config = GcsConfig {
                    timeout: config.storage_timeout(),
                    ..Default::default()
                };
                Ok(Arc::new(GcsObjectStore::new(gcs_config, tokens)?))
            }
            StorageBackend::Local => {
                let root = config
                    .storage
                    .local_root
                    .as_deref()
                    .ok_or("storage.local_root is required for the local backend")?;
                Ok(Arc::new(LocalObjectStore::new(root)))
            }
        }
    }
}

fn build_pipeline(
    config: &AgentConfig,
    collaborators: &Collaborators,
) -> Result<HoldPipeline, Box<dyn std::error::Error>> {
    let settings = PipelineSettings::from_config(config)?;
    Ok(HoldPipeline::new(
        collaborators.llm.clone(),
        collaborators.store.clone(),
        settings,
    ))
}

async fn serve(config: AgentConfig, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let collaborators = Collaborators::from_config(&config)?;
    let pipeline = build_pipeline(&config, &collaborators)?;
    let agent = Arc::new(AgentService::new(
        config.server.app_name.clone(),
        pipeline,
        collaborators.llm.clone(),
    ));
    let port = port.unwrap_or(config.server.port);

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = service::serve(agent, port) => {}
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
    }

    Ok(())
}

async fn run_once(config: AgentConfig, uri: &str) -> Result<(), Box<dyn std::error::Error>> {
    let collaborators = Collaborators::from_config(&config)?;
    let pipeline = build_pipeline(&config, &collaborators)?;

    let run = pipeline.run_uri(uri).await?;
    info!(run_id = %run.run_id, hold_recorded = run.hold_recorded, "Run finished");

    println!("{}", serde_json::to_string_pretty(&run.reports)?);
    Ok(())
}

async fn list_holds(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let collaborators = Collaborators::from_config(&config)?;
    let settings = PipelineSettings::from_config(&config)?;
    let ledger = HoldLedger::new(collaborators.store, settings.ledger_location());

    for record in ledger.records().await? {
        println!("{record}");
    }
    Ok(())
}

fn handle_config_command(
    config: AgentConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
