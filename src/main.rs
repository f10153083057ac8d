//! ragcrew CLI
//!
//! Ask questions about a local document collection, with long-term memory.

use clap::{Parser, Subcommand};
use ragcrew::config::default_home;
use ragcrew::session::SessionStore;
use ragcrew::{ConversationTurn, PipelineResponse, RagCrewConfig, RagPipeline};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// ragcrew - multi-agent question answering over your documents
#[derive(Parser, Debug)]
#[command(name = "ragcrew")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Home directory (config.toml, docs/, data/); defaults to $RAGCREW_HOME or ~/.ragcrew
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Model provider id (mock, openai, nvidia, ollama, or one from config.toml)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name sent to the provider
    #[arg(long, global = true)]
    model: Option<String>,

    /// Passages fetched per search
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Verbose output: debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat (default)
    Chat {
        /// Save and resume the conversation under this name
        #[arg(long)]
        session: Option<String>,
    },
    /// Answer a single question
    Ask {
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,

        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// Rebuild the document index from the docs directory
    Index,
    /// Copy files into the docs directory and reindex
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List saved chat sessions
    Sessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let home = match &cli.home {
        Some(home) => home.clone(),
        None => default_home()?,
    };
    let config = build_config(&cli, home).await?;

    if let Some(Command::Sessions) = cli.command {
        return list_sessions(&config).await;
    }

    let pipeline = RagPipeline::open(config).await?;

    let outcome = match cli.command.unwrap_or(Command::Chat { session: None }) {
        Command::Chat { session } => run_chat(&pipeline, session).await,
        Command::Ask { json, question } => run_ask(&pipeline, &question.join(" "), json).await,
        Command::Index => {
            let count = pipeline.reindex_documents().await?;
            println!("Indexed {} chunks.", count);
            Ok(())
        }
        Command::Add { files } => {
            let count = pipeline.import_documents(&files).await?;
            println!("Indexed {} chunks.", count);
            Ok(())
        }
        Command::Sessions => Ok(()),
    };

    pipeline.shutdown().await?;
    outcome
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn build_config(cli: &Cli, home: PathBuf) -> anyhow::Result<RagCrewConfig> {
    let mut config = RagCrewConfig::load(&home).await?;
    if let Some(provider) = &cli.provider {
        config = config.with_provider(provider.clone());
    }
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    if let Some(top_k) = cli.top_k {
        config = config.with_top_k(top_k);
    }
    config.validate()?;
    info!("Home directory: {:?}", config.home);
    Ok(config)
}

async fn list_sessions(config: &RagCrewConfig) -> anyhow::Result<()> {
    let store = SessionStore::new(&config.home).await?;
    let sessions = store.list_sessions().await?;
    if sessions.is_empty() {
        println!("No saved sessions.");
    }
    for id in sessions {
        println!("{}", id);
    }
    Ok(())
}

async fn run_ask(pipeline: &RagPipeline, question: &str, json: bool) -> anyhow::Result<()> {
    let response = pipeline.answer_question(question, &[]).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

async fn run_chat(pipeline: &RagPipeline, session: Option<String>) -> anyhow::Result<()> {
    let store = SessionStore::new(&pipeline.config().home).await?;
    let mut history: Vec<ConversationTurn> = match &session {
        Some(id) => store
            .load(id)
            .await?
            .map(|snapshot| snapshot.history)
            .unwrap_or_default(),
        None => Vec::new(),
    };

    println!(
        "ragcrew ({}) - ask anything. /reset clears the conversation, /quit exits.",
        pipeline.model_name()
    );
    if !history.is_empty() {
        println!("Resumed {} earlier turns.", history.len());
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                history.clear();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        match pipeline.answer_question(input, &history).await {
            Ok(response) => {
                print_response(&response);
                history = response.history;
            }
            Err(e) => error!("Failed to answer: {}", e),
        }
    }

    if let Some(id) = &session {
        store.save(id, &history).await?;
        println!("Session '{}' saved.", id);
    }
    Ok(())
}

fn print_response(response: &PipelineResponse) {
    println!("\n{}\n", response.answer);
    println!("Critique: {}", response.critique);
    println!("Mode: {}", response.mode);
    if !response.context.is_empty() {
        println!("Sources:");
        for source in &response.context {
            println!("  - {}", source.passage.metadata.label());
        }
    }
    println!();
}
