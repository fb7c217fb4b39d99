//! `ascent-replay`: feed recorded inbound events through the progression
//! pipeline and print where each project ended up.

use anyhow::Context;
use ascent_core::{EngineConfig, EventNormalizer, TracingNotifier};
use ascent_metrics::{InMemoryMetricsStore, MetricsStore};
use clap::{value_parser, Arg, ArgAction, Command};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("ascent-replay")
        .version(ascent_core::VERSION)
        .about("Replay newline-delimited inbound events through the progression engine")
        .subcommand_required(true)
        .subcommand(
            Command::new("replay")
                .about("Ingest events and print each project's status")
                .arg(
                    Arg::new("events")
                        .value_parser(value_parser!(PathBuf))
                        .help("NDJSON event file; reads stdin when omitted"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML engine configuration"),
                )
                .arg(
                    Arg::new("stop-on-error")
                        .long("stop-on-error")
                        .action(ArgAction::SetTrue)
                        .help("Abort on the first rejected event"),
                )
                .arg(
                    Arg::new("history")
                        .long("history")
                        .action(ArgAction::SetTrue)
                        .help("Include applied transitions in the output"),
                ),
        )
        .subcommand(Command::new("defaults").about("Print the default configuration as TOML"));

    let matches = cli.get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match matches.subcommand() {
        Some(("replay", args)) => {
            let config = match args.get_one::<PathBuf>("config") {
                Some(path) => EngineConfig::from_file(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => EngineConfig::default(),
            };
            let reader: Box<dyn BufRead> = match args.get_one::<PathBuf>("events") {
                Some(path) => Box::new(BufReader::new(
                    File::open(path).with_context(|| format!("opening {}", path.display()))?,
                )),
                None => Box::new(std::io::stdin().lock()),
            };
            let options = ReplayOptions {
                stop_on_error: args.get_flag("stop-on-error"),
                history: args.get_flag("history"),
            };
            replay(&config, reader, &mut std::io::stdout().lock(), options).await?;
            Ok(())
        }
        Some(("defaults", _)) => {
            let rendered = toml::to_string_pretty(&EngineConfig::default())
                .context("rendering default configuration")?;
            print!("{rendered}");
            Ok(())
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ReplayOptions {
    stop_on_error: bool,
    history: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ReplaySummary {
    ingested: usize,
    rejected: usize,
}

/// Ingest every line of `events`, then write one JSON status line per project
async fn replay(
    config: &EngineConfig,
    events: impl BufRead,
    out: &mut impl Write,
    options: ReplayOptions,
) -> anyhow::Result<ReplaySummary> {
    let store: Arc<dyn MetricsStore> = Arc::new(InMemoryMetricsStore::new());
    let normalizer =
        EventNormalizer::from_config(config, Arc::clone(&store), Arc::new(TracingNotifier));

    let mut summary = ReplaySummary::default();
    for (index, line) in events.lines().enumerate() {
        let line = line.context("reading events")?;
        if line.trim().is_empty() {
            continue;
        }

        match normalizer.ingest_json(&line).await {
            Ok(_) => summary.ingested += 1,
            Err(e) if options.stop_on_error => {
                return Err(e).with_context(|| format!("event on line {}", index + 1));
            }
            Err(_) => summary.rejected += 1,
        }
    }
    tracing::info!(
        ingested = summary.ingested,
        rejected = summary.rejected,
        "replay finished"
    );

    let mut projects = store.projects().await?;
    projects.sort();
    for project in projects {
        let status = normalizer.engine().status(&project).await?;
        let mut line = serde_json::to_value(&status)?;
        if options.history {
            line["transitions"] = serde_json::to_value(store.transitions(&project).await?)?;
        }
        writeln!(out, "{line}")?;
    }
    Ok(summary)
}
