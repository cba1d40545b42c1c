//! AIBI CLI - terminal front end for the analytics agent

mod profile;
mod render;
mod text;

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use aibi_core::{AgentTransport, Credentials, HttpTransport, StateUpdate, StreamController};

#[derive(Parser)]
#[command(name = "aibi-cli", version, about = "Ask a conversational analytics agent from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream one question to the agent and print the answer
    Ask {
        /// The question, as remaining arguments
        question: Vec<String>,
        /// Print the reasoning trace while it streams
        #[arg(long)]
        show_thinking: bool,
    },
    /// Interactive session; each line is a follow-up question
    Chat {
        /// Print the reasoning trace while it streams
        #[arg(long)]
        show_thinking: bool,
    },
    /// Probe the agent endpoint
    Ping,
    /// Manage stored connection settings
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Save connection settings
    Set {
        /// Programmatic access token
        #[arg(long)]
        token: String,
        /// Account host, without scheme
        #[arg(long)]
        account_url: String,
        #[arg(long)]
        database: String,
        #[arg(long)]
        schema: String,
        #[arg(long)]
        agent: String,
    },
    /// Show the stored profile, token masked
    Show,
    /// Delete the stored profile
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ask {
            question,
            show_thinking,
        } => ask(question.join(" "), show_thinking).await,
        Command::Chat { show_thinking } => chat(show_thinking).await,
        Command::Ping => ping().await,
        Command::Profile { action } => run_profile(action),
    }
}

fn load_profile() -> Result<Credentials> {
    profile::load()?.context("no profile configured; run `aibi-cli profile set` first")
}

fn connect() -> Result<(StreamController, tokio::sync::mpsc::UnboundedReceiver<StateUpdate>)> {
    let credentials = load_profile()?;
    let transport = Arc::new(HttpTransport::new());
    Ok(StreamController::new(transport, Arc::new(credentials)))
}

/// Stream one turn to completion, printing state as it arrives.
async fn run_turn(
    controller: &StreamController,
    updates: &mut tokio::sync::mpsc::UnboundedReceiver<StateUpdate>,
    question: &str,
    show_thinking: bool,
) -> Result<()> {
    controller.start_turn(question)?;

    let mut final_answer = None;
    let mut chart = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                controller.cancel();
                eprintln!("\ncancelled");
                break;
            }
            update = updates.recv() => {
                let Some(update) = update else { break };
                match update {
                    StateUpdate::Status(status) => eprintln!("[{status}]"),
                    StateUpdate::ThinkingDelta(delta) if show_thinking => {
                        eprint!("{delta}");
                        std::io::stderr().flush()?;
                    }
                    StateUpdate::FinalAnswer(text) => final_answer = Some(text),
                    StateUpdate::Chart(spec) => chart = Some(spec),
                    StateUpdate::Connected(connected) => debug!("stream connected: {connected}"),
                    StateUpdate::TurnEnded => break,
                    _ => {}
                }
            }
        }
    }
    if show_thinking {
        eprintln!();
    }

    if let Some(answer) = final_answer {
        println!("{answer}");
    }
    if let Some(chart) = chart {
        println!();
        print!("{}", render::render_chart(&chart));
    }
    Ok(())
}

async fn ask(question: String, show_thinking: bool) -> Result<()> {
    let question = question.trim().to_string();
    if question.is_empty() {
        bail!("empty question");
    }
    let (controller, mut updates) = connect()?;
    run_turn(&controller, &mut updates, &question, show_thinking).await
}

async fn chat(show_thinking: bool) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let (controller, mut updates) = connect()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        std::io::stderr().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }
        run_turn(&controller, &mut updates, question, show_thinking).await?;
        println!();
    }
    Ok(())
}

async fn ping() -> Result<()> {
    let credentials = load_profile()?;
    let transport = HttpTransport::new();
    println!("{}", transport.check_connection(&credentials).await);
    Ok(())
}

fn run_profile(action: ProfileCommand) -> Result<()> {
    match action {
        ProfileCommand::Set {
            token,
            account_url,
            database,
            schema,
            agent,
        } => {
            let credentials = Credentials {
                token,
                account_url,
                database,
                schema,
                agent,
            };
            profile::save(&credentials)?;
            println!("Profile saved to {}", profile::path()?.display());
        }
        ProfileCommand::Show => match profile::load()? {
            Some(credentials) => {
                println!("account_url: {}", credentials.account_url);
                println!("database:    {}", credentials.database);
                println!("schema:      {}", credentials.schema);
                println!("agent:       {}", credentials.agent);
                println!("token:       {}", text::masked_text(&credentials.token));
            }
            None => println!("No profile configured"),
        },
        ProfileCommand::Clear => {
            profile::clear()?;
            println!("Profile cleared");
        }
    }
    Ok(())
}
