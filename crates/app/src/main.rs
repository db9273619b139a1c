//! deepsearch: run an automated research question from the terminal.

mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use research::ResearchPipeline;
use services::config::{default_config_path, load_settings};
use services::{HistoryStore, JsonHistoryStore};
use shared::events::PipelineEvent;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "deepsearch", about = "Plan, search, read and synthesize a cited research report")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Research a question and stream the report to stdout
    Ask {
        question: Vec<String>,
        /// Do not print the numbered source list after the report
        #[arg(long)]
        no_sources: bool,
    },
    /// List recent research questions, newest first
    History,
    /// Print the settings file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Ask {
            question,
            no_sources,
        } => ask(cli.config, question.join(" "), !no_sources).await,
        Cmd::History => {
            let store = JsonHistoryStore::open_default();
            let entries = store.entries().context("reading history")?;
            println!("{}", render::history(&entries));
            Ok(())
        }
        Cmd::ConfigPath => {
            println!(
                "{}",
                cli.config.unwrap_or_else(default_config_path).display()
            );
            Ok(())
        }
    }
}

async fn ask(config: Option<PathBuf>, question: String, show_sources: bool) -> Result<()> {
    let settings = load_settings(config.as_deref())?;
    let history = Arc::new(JsonHistoryStore::open_default());
    tracing::debug!(path = %history.path().display(), "history store");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = Arc::new(
        ResearchPipeline::from_settings(settings, history)
            .context("settings are incomplete")?
            .with_events(tx),
    );

    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::StageChanged { record, .. } => {
                    eprintln!("{}", render::stage_line(&record));
                }
                PipelineEvent::Delta { text, .. } => {
                    let _ = write!(stdout, "{}", text);
                    let _ = stdout.flush();
                }
            }
        }
    });

    let run = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.run(&question).await })
    };
    let interrupt = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, cancelling run");
                pipeline.cancel_current();
            }
        })
    };

    let outcome = run.await.context("research task panicked")?;
    interrupt.abort();
    let _ = interrupt.await;
    // Last sender goes away with the pipeline; the printer then drains and stops.
    drop(pipeline);
    printer.await.context("output task panicked")?;

    let report = outcome?;
    println!();
    if show_sources && !report.sources.is_empty() {
        println!("\n{}", render::sources(&report.sources));
    }
    Ok(())
}
