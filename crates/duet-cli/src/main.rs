//! duet: two cooperating agents over A2A
//!
//! Usage:
//!   duet knowledge            # serve the knowledge agent on :8001
//!   duet chat                 # talk to the orchestrator
//!   duet ask "capital of France?"
//!   duet example              # print a sample request/reply pair

mod agents;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

use duet_a2a::A2aServer;
use duet_knowledge::NOT_INITIALIZED;

use crate::config::DuetConfig;

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Orchestrator and knowledge agents talking A2A")]
#[command(version)]
struct Cli {
    /// Config file (default: ./duet.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging, including full A2A payloads
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the knowledge agent
    Knowledge {
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,
        /// Directory of documents to index
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Chat with the orchestrator agent on stdin/stdout
    Chat {
        /// Knowledge agent exchange endpoint
        #[arg(long)]
        knowledge_url: Option<String>,
    },
    /// Send one query to the knowledge agent and print the answer
    Ask {
        query: String,
        /// Knowledge agent exchange endpoint
        #[arg(long)]
        knowledge_url: Option<String>,
    },
    /// Print a sample A2A request and reply
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env loaded: {}", e);
    }

    let mut config = DuetConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Knowledge { bind, data_dir } => {
            if let Some(bind) = bind {
                config.knowledge.bind = bind;
            }
            if let Some(dir) = data_dir {
                config.knowledge.data_dir = dir;
            }
            run_knowledge(&config).await
        }
        Command::Chat { knowledge_url } => {
            if let Some(url) = knowledge_url {
                config.orchestrator.knowledge_url = url;
            }
            run_chat(&config).await
        }
        Command::Ask {
            query,
            knowledge_url,
        } => {
            if let Some(url) = knowledge_url {
                config.orchestrator.knowledge_url = url;
            }
            let tool = agents::knowledge_agent_tool(&config)?;
            println!("{}", tool.ask(&query).await);
            Ok(())
        }
        Command::Example => {
            let (request, reply) = agents::example_exchange(&config)?;
            println!("--- request ---\n{}", request.to_json_pretty());
            println!("--- reply ---\n{}", reply.to_json_pretty());
            Ok(())
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run_knowledge(config: &DuetConfig) -> Result<()> {
    let addr: SocketAddr = config
        .knowledge
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.knowledge.bind))?;

    let responder = match agents::build_knowledge_responder(config) {
        Ok(r) => r,
        Err(e) => {
            error!("Knowledge base could not be initialized: {:#}", e);
            return Err(e);
        }
    };

    info!("Starting {} on http://{}", config.knowledge.agent_name, addr);
    A2aServer::new(Arc::new(responder))
        .with_unavailable_detail(NOT_INITIALIZED)
        .serve(addr)
        .await
}

async fn run_chat(config: &DuetConfig) -> Result<()> {
    let mut session = match agents::build_chat_session(config) {
        Ok(s) => s,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };
    let name = &config.orchestrator.agent_name;
    println!("[{}] Initialized. Type 'exit' to quit.", name);

    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let reply = session.send(input).await;
        stdout
            .write_all(format!("{}: {}\n", name, reply).as_bytes())
            .await?;
    }
    Ok(())
}
