use agent_gateway::gateway::{Gateway, GatewaySettings};
use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML settings file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a query through the gateway
    Ask {
        /// The query to answer
        #[arg(short, long)]
        query: String,

        /// Print the full final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the nodes and edges of the gateway graph
    Graph,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let settings = GatewaySettings::load(args.config.as_ref())
        .with_context(|| format!("failed to load settings from {:?}", args.config))?;
    log::info!(
        "Using {:?} provider (simple: {}, complex: {})",
        settings.provider,
        settings.model_simple,
        settings.model_complex
    );

    let gateway = Gateway::from_settings(settings).await?;

    match args.command {
        Commands::Ask { query, json } => {
            let state = gateway.ask(query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                println!("{}", state.response);
                println!();
                println!(
                    "[intent: {} ({:.2}), model: {}, retries: {}, tokens: {} prompt / {} completion]",
                    state.intent,
                    state.confidence,
                    state.model_id,
                    state.retry_count,
                    state.prompt_tokens,
                    state.completion_tokens
                );
            }
        }
        Commands::Graph => {
            let graph = gateway.graph();
            println!("graph: {} (entry: {})", graph.name(), graph.entry());
            for node in graph.node_names() {
                let kind = if graph.is_conditional(node) { "conditional" } else { "direct" };
                println!("  {:<18} {:<12} -> {}", node, kind, graph.successors(node).join(", "));
            }
        }
    }

    Ok(())
}
