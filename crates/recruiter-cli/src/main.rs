//! Terminal front end for the recruiting assistant.

mod commands;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use recruiter_core::config::{default_config_dir, load_config};
use recruiter_core::persistence::MemoryStore;
use recruiter_core::{ClientBuilder, RecruiterClient};

use commands::{parse_command, Command, HELP};
use render::{render_event, render_history, render_sequence};

#[derive(Parser)]
#[command(name = "recruiter")]
#[command(about = "Chat with the recruiting assistant from the terminal")]
#[command(version)]
struct Args {
    /// Assistant service URL (overrides serverUrl in config.json)
    #[arg(short, long)]
    server: Option<String>,

    /// Directory holding config.json [default: ~/.config/recruiter]
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Directory for the persisted session and user ids [default: config dir]
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Write a wire trace of every frame into this directory
    #[arg(long)]
    log_dir: Option<String>,

    /// Delay before revealing assistant results, in milliseconds
    #[arg(long)]
    reveal_delay_ms: Option<u64>,

    /// Keep identity in memory only (start a fresh session every run)
    #[arg(long)]
    ephemeral: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "recruiter_core=debug,recruiter=debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => default_config_dir().map_err(|e| e.to_string())?,
    };

    let mut config = load_config(&config_dir).map_err(|e| e.to_string())?;
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(log_dir) = args.log_dir {
        config.log_dir = Some(log_dir);
    }
    if let Some(delay) = args.reveal_delay_ms {
        config.reveal_delay_ms = delay;
    }
    log::debug!("Using server {}", config.server_url);

    let builder = ClientBuilder::new(config);
    let builder = if args.ephemeral {
        builder.identity_medium(Arc::new(MemoryStore::new()))
    } else {
        builder.data_dir(args.data_dir.unwrap_or_else(|| config_dir.clone()))
    };
    let client = builder.build().map_err(|e| e.to_string())?;

    let mut events = client.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Display fell behind, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    client.start().map_err(|e| e.to_string())?;
    if client.needs_onboarding() {
        println!("Tip: introduce yourself with /profile <name> [company] [context]. /help lists commands.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::debug!("Interrupted");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&client, &line).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Failed to read stdin: {}", e);
                    break;
                }
            },
        }
    }

    client.shutdown().await;
    printer.abort();
    Ok(())
}

/// Run one command. Returns false when the user asked to quit.
async fn handle_line(client: &RecruiterClient, line: &str) -> bool {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            return true;
        }
    };

    match command {
        Command::Empty => {}
        Command::Say(text) => {
            if let Err(e) = client.send_message(&text) {
                eprintln!("Not sent: {e}");
            }
        }
        Command::Edit { id, content } => match client.edit_sequence_item(&id, &content) {
            Ok(_) => {}
            Err(e) => eprintln!("Edit not sent: {e}"),
        },
        Command::Sequence => println!("{}", render_sequence(&client.store().sequence())),
        Command::History => println!("{}", render_history(&client.store().conversation())),
        Command::Profile(profile) => match client.register_user(profile).await {
            Ok(user_id) => println!("Registered as {user_id}"),
            Err(e) => eprintln!("Registration failed: {e}"),
        },
        Command::Status => {
            let identity = client.identity().snapshot();
            println!(
                "{} | session: {} | user: {}",
                client.status(),
                identity
                    .session_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                identity.user_id.unwrap_or_else(|| "none".to_string()),
            );
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
    }
    true
}
