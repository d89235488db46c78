mod config;
mod shell;

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console_core::Console;
use engine_client::{
    Dispatcher, HeartbeatProbe, HttpEngineWriter, LinkState, StatusReport, WriteSubmitter,
};
use shared::protocol::Endpoint;
use tokio::{runtime::Runtime, sync::watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{load_settings, Settings},
    shell::{Outcome, Shell, ShellCommand, HELP},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(about = "Operator colour console for a video engine")]
struct Cli {
    /// Settings file; defaults to ./console.toml, then the user config dir.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive console (default).
    Run,
    /// One heartbeat against the configured engine.
    Probe,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&runtime, &settings),
        Command::Probe => probe(&runtime, &settings),
    }
}

fn run(runtime: &Runtime, settings: &Settings) -> Result<()> {
    let endpoint = Endpoint::new(&settings.webserver_ip, settings.webserver_port)?;
    let writer = Arc::new(HttpEngineWriter::new(settings.writer_timeouts())?);
    let (dispatcher, workers) = Dispatcher::spawn(
        runtime.handle(),
        writer,
        settings.wire_format()?,
        endpoint.clone(),
        settings.dispatch_config(),
    );
    info!(
        endpoint = %endpoint,
        workers = workers.len(),
        contract = ?settings.wire_contract,
        "dispatcher started"
    );

    let (status_tx, status_rx) = watch::channel(None);
    let heartbeat = HeartbeatProbe::new(dispatcher.endpoint_watch(), settings.heartbeat_timeout())?
        .spawn(runtime.handle(), settings.heartbeat_interval(), {
            let mut last: Option<LinkState> = None;
            move |report: StatusReport| {
                if last.as_ref() != Some(&report.state) {
                    match report.state {
                        LinkState::Connected | LinkState::Slow => {
                            info!(status = %report.label(), latency = %report.latency_label(), "engine link")
                        }
                        _ => warn!(status = %report.label(), "engine link"),
                    }
                    last = Some(report.state.clone());
                }
                status_tx.send_replace(Some(report));
            }
        });

    let store = settings.seed_store();
    let console = Console::attach(&store, dispatcher)?;
    let session = repl(Shell::new(&console, &store, status_rx));

    heartbeat.abort();
    drop(console);
    let drained = runtime.block_on(tokio::time::timeout(SHUTDOWN_GRACE, workers.join()));
    if drained.is_err() {
        warn!("dispatch workers still busy at shutdown; abandoning queued writes");
    }
    session
}

fn repl<W: WriteSubmitter>(shell: Shell<'_, W>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("{HELP}");

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("failed to read command")? == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ShellCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        match shell.execute(command) {
            Ok(Outcome::Reply(text)) => println!("{text}"),
            Ok(Outcome::Quit) => return Ok(()),
            Err(err) => {
                warn!(code = ?err.code(), error = %err, "command rejected");
                println!("error: {err}");
            }
        }
    }
}

fn probe(runtime: &Runtime, settings: &Settings) -> Result<()> {
    let endpoint = Endpoint::new(&settings.webserver_ip, settings.webserver_port)?;
    let (_endpoint_tx, endpoint_rx) = watch::channel(endpoint);
    let probe = HeartbeatProbe::new(endpoint_rx, settings.heartbeat_timeout())?;
    let report = runtime.block_on(probe.check());
    println!("{} ({})", report.label(), report.latency_label());
    Ok(())
}
