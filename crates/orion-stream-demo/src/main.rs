//! Drive the stream coordinator from the command line: canned scenarios or a
//! recorded JSONL event script.

mod render;
mod replay;
mod scenarios;
mod scripted;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use orion_stream::{CoordinatorConfig, SessionId, SubmitOutcome, init_observability};

use crate::replay::ReplayOptions;

#[derive(Parser)]
#[command(name = "orion-stream-demo", about = "Streaming response coordinator demo")]
struct Cli {
    /// Publish every chunk immediately instead of once per frame.
    #[arg(long, global = true)]
    no_coalesce: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the built-in scenarios and print their final views.
    Scenarios,
    /// Feed a newline-delimited JSON event script through the coordinator.
    Replay {
        /// Event script, one JSON event per line.
        file: PathBuf,
        #[arg(long, default_value = "replayed prompt")]
        prompt: String,
        #[arg(long)]
        session: Option<String>,
        /// Request id the scripted backend acknowledges with. Defaults to the
        /// id of the first event in the script.
        #[arg(long)]
        request_id: Option<String>,
        /// Make the submission fail instead of acknowledging.
        #[arg(long)]
        fail_submit: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_observability();

    let cli = Cli::parse();
    let mut config = CoordinatorConfig::from_env()?;
    if cli.no_coalesce {
        config = config.coalesce_text(false);
    }

    match cli.command {
        Command::Scenarios => scenarios::run_all(&config).await,
        Command::Replay {
            file,
            prompt,
            session,
            request_id,
            fail_submit,
        } => {
            let options = ReplayOptions {
                prompt,
                session_id: session.map(SessionId::new),
                request_id,
                fail_submit,
                settle_timeout: None,
            };
            let report = replay::replay_file(&file, config, options).await?;
            match &report.outcome {
                SubmitOutcome::Accepted(id) => println!("=== Submission ===\naccepted as {id}\n"),
                SubmitOutcome::Ignored => println!("=== Submission ===\nignored\n"),
                SubmitOutcome::Failed(info) => {
                    println!("=== Submission ===\nfailed: {}: {}\n", info.code, info.message)
                }
            }
            for line in &report.published {
                println!("{line}");
            }
            println!("\n=== Final view ===\n{}", render::render(&report.view));
            Ok(())
        }
    }
}
