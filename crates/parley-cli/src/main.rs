//! CLI entry point - the composition root.
//!
//! The only place where collaborators are chosen and wired into the
//! orchestrator.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parley_cli::console::{self, ConsoleRecognizer, ConsoleSynthesizer};
use parley_cli::responder::{ChatCompletionsResponder, ScriptedTutor};
use parley_cli::{Cli, config};
use parley_voice::{Collaborators, ResponseService, SynthesisReadiness, TurnOrchestrator};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok(); // Ignore error if already initialized
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads PARLEY_* defaults
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config::resolve(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("parley: {err}");
            std::process::exit(err.exit_code());
        }
    };

    let responder: Arc<dyn ResponseService> = if cli.offline {
        tracing::info!("Using the offline scripted tutor");
        Arc::new(ScriptedTutor::new())
    } else {
        tracing::info!(endpoint = %cli.endpoint, model = %cli.model, "Using chat endpoint");
        Arc::new(
            ChatCompletionsResponder::new(
                cli.endpoint.clone(),
                cli.model.clone(),
                cli.api_key.clone(),
                cli.system_prompt.clone(),
            )
            .context("Failed to create chat client")?,
        )
    };

    let recognizer = ConsoleRecognizer::new();
    let listening = recognizer.listening_flag();
    let synthesizer = Arc::new(ConsoleSynthesizer::new(config.echo.assistant_name.clone()));
    let readiness = Arc::new(SynthesisReadiness::new(synthesizer.clone()));

    // Warm up in the background so the first reply is not delayed.
    {
        let readiness = Arc::clone(&readiness);
        tokio::spawn(async move { readiness.initialize().await });
    }

    let (orchestrator, events) = TurnOrchestrator::new(
        config,
        Collaborators {
            recognizer: Box::new(recognizer),
            synthesizer,
            responder,
            readiness,
        },
    )
    .context("Invalid orchestrator configuration")?;
    let (handle, task) = orchestrator.spawn();
    tokio::spawn(console::print_events(events));

    println!("parley: type /help for commands, /start to speak");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = console::run(&handle, &listening, stdin).await;

    handle.shutdown().ok();
    task.await.context("Turn orchestrator panicked")?;
    result.context("Console session failed")?;
    Ok(())
}
