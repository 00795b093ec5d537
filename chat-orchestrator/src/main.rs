//! Command line front end for the orchestration core.
//!
//! Wires the in-memory store and the deterministic template model into the
//! supervisor and exposes the main entry points as subcommands. Useful for
//! exercising the routing, report, and streaming paths without any service
//! in front of the crate.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use chat_orchestrator::model::TemplateModel;
use chat_orchestrator::sdk::{ResponseMode, StreamPayload};
use chat_orchestrator::store::InMemoryThreadStore;
use chat_orchestrator::stream::stream_message;
use chat_orchestrator::tasks::{ChosenDelivery, SubmitOutcome, TaskManager};
use chat_orchestrator::{OrchestratorConfig, Supervisor};

#[derive(Parser, Debug)]
#[command(name = "chat-orchestrator", about = "Chat orchestration core CLI")]
struct Cli {
    /// Conversation thread to operate on
    #[arg(long, default_value = "cli")]
    thread: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handle a message synchronously and print the response
    Send {
        /// The message text
        text: String,
    },
    /// Handle a message and print the event stream
    Stream {
        /// The message text
        text: String,
    },
    /// Run a report request through the task manager
    Report {
        /// The message text
        text: String,
        /// Delivery mode once the task asks for one
        #[arg(long, default_value = "async")]
        mode: ResponseMode,
    },
    /// Print the routing decision for a message without executing it
    Classify {
        /// The message text
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let supervisor = Arc::new(Supervisor::new(
        Arc::new(InMemoryThreadStore::new()),
        Arc::new(TemplateModel::new()),
        OrchestratorConfig::default(),
    ));

    match cli.command {
        Command::Send { text } => {
            let output = supervisor.handle(&cli.thread, &text).await?;
            println!("[{}] {}", output.workflow_used, output.text);
        }
        Command::Stream { text } => {
            let mut stream = stream_message(supervisor, &cli.thread, &text);
            while let Some(event) = stream.next().await {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Command::Report { text, mode } => {
            let manager = TaskManager::new(supervisor);
            match manager.submit(&cli.thread, &text).await? {
                SubmitOutcome::Completed(output) => {
                    println!("[{}] {}", output.workflow_used, output.text);
                }
                SubmitOutcome::NeedsChoice(interruption) => {
                    println!("{}\n", interruption.prompt);
                    println!("Choosing mode: {mode:?}");
                    match manager.choose_mode(interruption.task_id, mode)? {
                        ChosenDelivery::Stream(mut stream) => {
                            while let Some(event) = stream.next().await {
                                if let StreamPayload::Content { text, .. } = &event.payload {
                                    print!("{text}");
                                }
                            }
                            println!();
                        }
                        ChosenDelivery::Async(task_id) => loop {
                            let snapshot = manager.get_status(task_id)?;
                            println!(
                                "[{}%] {} ({})",
                                snapshot.progress, snapshot.message, snapshot.status
                            );
                            if snapshot.status.is_terminal() {
                                if let Some(result) = snapshot.result_text {
                                    println!("\n{result}");
                                }
                                if let Some(error) = snapshot.error_text {
                                    println!("\nTask failed: {error}");
                                }
                                break;
                            }
                            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                        },
                    }
                }
            }
        }
        Command::Classify { text } => {
            let decision = supervisor.classify(&text);
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
    }

    Ok(())
}
