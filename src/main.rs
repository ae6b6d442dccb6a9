//! Companion - Kubernetes companion agent
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use companion::agent::{AgentGraph, GraphConfig};
use companion::cluster::{ClusterClient, HttpClusterClient};
use companion::llm::ModelFactory;
use companion::session::{ConversationService, ModelQuestionsHandler};
use companion::tools::ToolRegistry;
use companion::{history, Config, Repl};

/// Companion - Kubernetes companion agent
#[derive(Parser, Debug)]
#[command(name = "companion")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Kubernetes API server URL
    #[arg(long)]
    api_server: Option<String>,

    /// Session id to continue
    #[arg(long, short = 's')]
    session: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", Config::default_config_toml());
        return Ok(());
    }

    let mut config = Config::load();

    // CLI overrides
    if let Some(model) = args.model {
        config.model.name = model;
    }
    if let Some(api_server) = args.api_server {
        config.cluster.api_server = Some(api_server);
    }

    let filter = match args.verbose {
        0 => EnvFilter::new(&config.logging.filter),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;
    info!(model = %config.model.name, agent = %config.agent.name, "starting companion");

    // === Wiring ===
    let model = ModelFactory::from_config(&config)?.create_model(&config.model.name)?;
    let tools = Arc::new(ToolRegistry::with_cluster_tools());
    let graph_config = GraphConfig::from(&config.graph);
    let graph = match &config.agent.system_prompt {
        Some(prompt) => AgentGraph::with_system_prompt(
            config.agent.name.clone(),
            model.clone(),
            tools,
            graph_config,
            prompt.clone(),
        )?,
        None => AgentGraph::new(config.agent.name.clone(), model.clone(), tools, graph_config)?,
    };

    let service = ConversationService::builder(
        Arc::new(graph),
        history::from_config(&config),
        Arc::new(ModelQuestionsHandler::new(model)),
    )
    .build();

    let client: Arc<dyn ClusterClient> =
        Arc::new(HttpClusterClient::from_config(&config.cluster)?);
    let mut repl = Repl::new(config, service, client, args.session);

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        repl.ask(&prompt).await?;
        return Ok(());
    }

    repl.run().await?;
    Ok(())
}
