use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;
use yatra_agents::{AssistantConfig, BookingAssistant};
use yatra_core::KnowledgeBase;
use yatra_observability::{init_tracing, AppMetrics};
use yatra_storage::Store;

#[derive(Debug, Parser)]
#[command(name = "yatra")]
#[command(about = "Train and bus booking assistant CLI")]
struct Cli {
    /// SQLite url; contexts live in memory for this process when unset.
    #[arg(long, env = "YATRA_DATABASE_URL")]
    database_url: Option<String>,

    /// JSON document replacing the built-in route and fare tables.
    #[arg(long, env = "YATRA_KNOWLEDGE_PATH")]
    knowledge: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive conversation.
    Chat {
        #[arg(long)]
        user: Option<String>,
    },
    /// Send a single message and print the reply.
    Say { user: String, text: String },
    Stats { user: String },
    Reset { user: String },
    /// Delete contexts idle for longer than the context TTL.
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("yatra_cli");
    let cli = Cli::parse();

    let assistant = build_assistant(&cli).await?;

    match cli.command {
        Command::Chat { user } => {
            let user = user.unwrap_or_else(|| format!("cli-{}", Uuid::new_v4()));
            run_chat(assistant, &user).await?;
        }
        Command::Say { user, text } => {
            println!("{}", assistant.handle_turn(&user, &text).await);
        }
        Command::Stats { user } => match assistant.get_stats(&user).await? {
            Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
            None => println!("no active conversation for {user}"),
        },
        Command::Reset { user } => {
            let removed = assistant.reset(&user).await?;
            println!("{}", serde_json::json!({ "user_id": user, "removed": removed }));
        }
        Command::Purge => {
            let removed = assistant.purge_inactive().await?;
            println!("{}", serde_json::json!({ "purged": removed }));
        }
    }

    Ok(())
}

async fn run_chat(assistant: BookingAssistant<Store>, user: &str) -> Result<()> {
    println!("Yatra booking assistant ({user}). type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let reply = assistant.handle_turn(user, message).await;
        println!("\n{reply}\n");
    }

    Ok(())
}

async fn build_assistant(cli: &Cli) -> Result<BookingAssistant<Store>> {
    let metrics = AppMetrics::shared();

    let knowledge = match &cli.knowledge {
        Some(path) => KnowledgeBase::from_path(path)
            .with_context(|| format!("failed loading knowledge from {}", path.display()))?,
        None => KnowledgeBase::builtin(),
    };

    let store = Store::from_database_url(cli.database_url.as_deref()).await?;

    Ok(BookingAssistant::new(
        Arc::new(store),
        Arc::new(knowledge),
        AssistantConfig::from_env(),
        metrics,
    ))
}
