use std::{future::Future, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    ActionError, ClientEvent, ConfirmedDelete, DeleteProposal, HttpAuthority, RefreshOutcome,
    StoreSession,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(about = "Operator console for remotely provisioned stores")]
struct Args {
    /// Overrides `api_base` from console.toml and the environment.
    #[arg(long)]
    api_base: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep the store list refreshed and accept commands on stdin.
    Watch,
    /// Fetch and print the current store list once.
    List,
    /// Request a new store.
    Create,
    /// Tear down a store after confirmation.
    Delete {
        name: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

type StdinLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(api_base) = args.api_base {
        settings.api_base = api_base;
    }
    debug!(api_base = %settings.api_base, "console settings loaded");

    let authority = HttpAuthority::new(&settings.api_base, settings.request_timeout())
        .context("failed to set up authority client")?;
    let session = StoreSession::new(Arc::new(authority));
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(&session, &mut stdin).await?,
        Command::List => {
            if session.refresh().await == RefreshOutcome::Failed {
                anyhow::bail!("could not fetch stores from {}", settings.api_base);
            }
            println!("{}", render::store_table(&session.stores().await));
        }
        Command::Create => {
            print_events_while(&session, session.create()).await?;
        }
        Command::Delete { name, yes } => {
            let proposal = session.propose_delete(name)?;
            if let Some(confirmed) = confirm(proposal, yes, &mut stdin).await? {
                print_events_while(&session, session.delete(confirmed)).await?;
            }
        }
    }

    Ok(())
}

/// Runs a one-shot action and echoes the log entries and alerts it produced.
async fn print_events_while(
    session: &StoreSession,
    action: impl Future<Output = Result<(), ActionError>>,
) -> Result<()> {
    let mut events = session.subscribe_events();
    let result = action.await;
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
    result.map_err(Into::into)
}

async fn confirm(
    proposal: DeleteProposal,
    assume_yes: bool,
    stdin: &mut StdinLines,
) -> Result<Option<ConfirmedDelete>> {
    if assume_yes {
        return Ok(Some(proposal.confirm()));
    }

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("{} [y/N] ", proposal.prompt()).as_bytes())
        .await?;
    stdout.flush().await?;

    let answer = stdin.next_line().await?.unwrap_or_default();
    if matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
        Ok(Some(proposal.confirm()))
    } else {
        proposal.decline();
        Ok(None)
    }
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::StoresReplaced(stores) => {
            println!("--- stores ({}) ---", stores.len());
            println!("{}", render::store_table(stores));
        }
        ClientEvent::Logged(entry) => println!("{entry}"),
        ClientEvent::Alert(message) => eprintln!("!! {message}"),
    }
}

const WATCH_HELP: &str = "commands: create | delete <name> | list | logs | help | quit";

async fn watch(session: &Arc<StoreSession>, stdin: &mut StdinLines) -> Result<()> {
    let mut events = session.subscribe_events();
    let printer = tokio::spawn(async move {
        let mut shown = render::SnapshotTracker::default();
        loop {
            match events.recv().await {
                Ok(ClientEvent::StoresReplaced(stores)) if !shown.observe(&stores) => {}
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "console fell behind session events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    session.start_polling().await;
    println!("{WATCH_HELP}");

    loop {
        let line = tokio::select! {
            line = stdin.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let mut words = line.split_whitespace();

        match (words.next(), words.next()) {
            (None, _) => {}
            (Some("quit" | "exit"), _) => break,
            (Some("help"), _) => println!("{WATCH_HELP}"),
            (Some("list"), _) => println!("{}", render::store_table(&session.stores().await)),
            (Some("logs"), _) => {
                let logs = session.logs().await;
                if logs.is_empty() {
                    println!("Awaiting system events...");
                }
                for entry in logs {
                    println!("{entry}");
                }
            }
            (Some("create"), _) => {
                let session = Arc::clone(session);
                tokio::spawn(async move {
                    if let Err(ActionError::Busy) = session.create().await {
                        println!("Orchestrating... a provisioning request is already in flight");
                    }
                });
            }
            (Some("delete"), name) => {
                let proposal = match session.propose_delete(name.unwrap_or_default()) {
                    Ok(proposal) => proposal,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                if let Some(confirmed) = confirm(proposal, false, stdin).await? {
                    let session = Arc::clone(session);
                    tokio::spawn(async move {
                        let _ = session.delete(confirmed).await;
                    });
                }
            }
            (Some(other), _) => println!("unknown command `{other}`; {WATCH_HELP}"),
        }
    }

    session.dispose().await;
    printer.abort();
    Ok(())
}
