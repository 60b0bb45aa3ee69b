//! Cortex CLI - inspect action text and capability manifests

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cortex_core::capabilities::{CapabilityRegistry, load_manifest};
use cortex_core::config::CortexConfig;
use cortex_core::embeddings::EmbeddingProviderFactory;
use cortex_core::events::tracing_sink;
use cortex_core::parsing::ActionParser;
use cortex_core::router::Router;
use cortex_core::tools::{BoundedExecutor, FnHandler, ToolTable};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cortex")]
#[command(about = "Cortex ReAct runtime CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to cortex.toml / CORTEX_CONFIG_PATH)
    #[arg(short, long, global = true, env = "CORTEX_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Json)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse action text ("-" reads stdin) and print the extracted request
    Parse {
        text: String,
    },
    /// Capability manifest commands
    Capabilities {
        #[command(subcommand)]
        command: CapabilityCommands,
    },
    /// Route action text against a manifest whose handlers echo their input
    Route {
        /// Capability manifest (YAML or JSON list)
        #[arg(short, long)]
        manifest: PathBuf,
        text: String,
    },
    /// Print the effective configuration
    Config,
    /// Version information
    Version,
}

#[derive(Subcommand)]
enum CapabilityCommands {
    /// List capabilities in registration order
    List {
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Rank capabilities against a query
    Search {
        #[arg(short, long)]
        manifest: PathBuf,
        query: String,
        /// Number of results (defaults to registry.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match cli.command {
        Commands::Version => {
            println!("cortex {}", env!("CARGO_PKG_VERSION"));
            println!("cortex-core {}", cortex_core::VERSION);
        }
        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            emit(format, &config)?;
        }
        Commands::Parse { text } => {
            let text = read_text(text)?;
            let parser = ActionParser::new(tracing_sink());
            let reply = parser.inspect(&text);
            emit(
                format,
                &serde_json::json!({
                    "action": reply.action,
                    "continuation": reply.continuation,
                }),
            )?;
        }
        Commands::Capabilities { command } => {
            let config = load_config(cli.config.as_deref())?;
            match command {
                CapabilityCommands::List { manifest } => {
                    let registry = registry_from_manifest(&config, &manifest).await?;
                    emit(format, &registry.list().await)?;
                }
                CapabilityCommands::Search {
                    manifest,
                    query,
                    top_k,
                } => {
                    let registry = registry_from_manifest(&config, &manifest).await?;
                    let top_k = top_k.unwrap_or(config.registry.default_top_k);
                    let hits = registry.search(&query, top_k).await?;
                    let scored: Vec<_> = hits
                        .iter()
                        .map(|h| {
                            serde_json::json!({
                                "name": h.name,
                                "score": h.score,
                                "description": h.description,
                                "instruction": h.instruction,
                            })
                        })
                        .collect();
                    emit(format, &scored)?;
                }
            }
        }
        Commands::Route { manifest, text } => {
            let config = load_config(cli.config.as_deref())?;
            let text = read_text(text)?;
            let registry = registry_from_manifest(&config, &manifest).await?;

            let sink = tracing_sink();
            let parser = ActionParser::new(Arc::clone(&sink));
            let Some(request) = parser.parse(&text) else {
                anyhow::bail!("no action found in input");
            };

            let executor = BoundedExecutor::new(config.agent.executor_config(), Arc::clone(&sink));
            let router = Router::new(ToolTable::new(), registry, executor, sink)
                .with_top_k(config.registry.default_top_k);
            let result = router.route(&request).await;
            emit(format, &result)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CortexConfig> {
    let config = match path {
        Some(path) => CortexConfig::from_file(path)?,
        None => CortexConfig::load()?,
    };
    Ok(config)
}

fn read_text(text: String) -> Result<String> {
    if text != "-" {
        return Ok(text);
    }
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;
    Ok(buffer)
}

async fn registry_from_manifest(
    config: &CortexConfig,
    manifest: &Path,
) -> Result<Arc<CapabilityRegistry>> {
    let specs = load_manifest(manifest)
        .with_context(|| format!("Failed to load manifest {}", manifest.display()))?;
    let embeddings = EmbeddingProviderFactory::from_config(config.embeddings.as_ref())?;
    let registry = Arc::new(CapabilityRegistry::new(embeddings));

    for spec in specs {
        let name = spec.name.clone();
        let handler = Arc::new(FnHandler::new(move |action, arguments| {
            Ok(serde_json::json!({
                "capability": name,
                "action": action,
                "arguments": arguments,
            }))
        }));
        registry.register(spec.into_descriptor(handler)).await?;
    }

    tracing::info!(manifest = %manifest.display(), capabilities = registry.len().await, "Loaded manifest");
    Ok(registry)
}

fn emit<T: Serialize>(format: Format, value: &T) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
