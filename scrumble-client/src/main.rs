//! scrumble - vote on community matchups from the terminal

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrumble_client::render::{render_listing, render_matchups};
use scrumble_client::{HttpMatchupApi, RetryPolicy, Session, VoteOutcome};
use scrumble_common::config::{default_api_base, load_client_config, resolve_data_folder, TomlConfig};
use scrumble_common::overrides::OverrideGroup;
use scrumble_common::state::FetchOutcome;
use scrumble_common::storage::{FileStore, SharedStore, UnavailableStore};
use scrumble_common::time;

const STORAGE_FILE: &str = "storage.json";

/// Command-line arguments for scrumble
#[derive(Parser, Debug)]
#[command(name = "scrumble")]
#[command(about = "Vote on Scrumble matchups")]
#[command(version)]
struct Args {
    /// Client config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Matchup API base URL
    #[arg(long, env = "SCRUMBLE_API")]
    api: Option<String>,

    /// Folder holding per-browser state
    #[arg(long)]
    data_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show active matchups
    List,
    /// Vote on a matchup
    Vote {
        matchup_id: String,
        /// left or right
        side: String,
    },
    /// Show finished matchups
    History,
    /// Show upcoming matchups
    Future,
    /// Manage local display overrides
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },
    /// Print this browser's fingerprint
    Fingerprint,
    /// Keep the matchup list on screen with live countdowns
    Watch {
        /// Seconds between redraws
        #[arg(long, default_value = "30")]
        interval: u64,
        /// Redraws between refetches
        #[arg(long, default_value = "10")]
        refresh_every: u32,
    },
}

#[derive(Subcommand, Debug)]
enum OverrideAction {
    /// Set one field for the matchup at INDEX (empty VALUE removes it)
    Set {
        index: usize,
        /// matchup, left, right or votes
        group: String,
        key: String,
        #[arg(default_value = "")]
        value: String,
    },
    /// Remove every override for the matchup at INDEX
    Clear { index: usize },
    /// Remove every local override
    ClearAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_client_config(args.config.as_deref()).context("Failed to load config")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting scrumble v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(args.data_folder.as_deref(), &config);
    let api_base = args
        .api
        .clone()
        .or_else(|| config.api_url())
        .unwrap_or_else(default_api_base);
    info!("Matchup API: {}", api_base);

    let api = HttpMatchupApi::new(&api_base, RetryPolicy::from_config(&config.retry))
        .context("Failed to create HTTP client")?;
    let mut session = Session::new(api, store, &config);

    match args.command {
        Command::List => {
            refresh(&mut session).await;
            print!("{}", render_matchups(&session.views(), time::now()));
        }
        Command::Vote { matchup_id, side } => {
            refresh(&mut session).await;
            match session.vote(&matchup_id, &side).await? {
                VoteOutcome::Accepted(side) => println!("Voted {} on {}", side, matchup_id),
                VoteOutcome::AlreadyVoted => println!("Already voted on {}", matchup_id),
                VoteOutcome::InFlight => println!("A vote on {} is still being sent", matchup_id),
                VoteOutcome::Resolved(reason) => println!("Voting closed on {}: {}", matchup_id, reason),
                VoteOutcome::Failed(e) => bail!("Vote not sent: {}", e),
            }
            print!("{}", render_matchups(&session.views(), time::now()));
        }
        Command::History => {
            let items = session.history().await.context("Failed to load history")?;
            print!("{}", render_listing("Past matchups", &items, true));
        }
        Command::Future => {
            let items = session.future().await.context("Failed to load upcoming matchups")?;
            print!("{}", render_listing("Coming up", &items, false));
        }
        Command::Override { action } => match action {
            OverrideAction::Set { index, group, key, value } => {
                let group: OverrideGroup = group.parse()?;
                session.overrides_mut().set(index, group, &key, &value)?;
                println!("Override saved for matchup {}", index);
            }
            OverrideAction::Clear { index } => {
                session.overrides_mut().clear(index);
                println!("Overrides cleared for matchup {}", index);
            }
            OverrideAction::ClearAll => {
                session.overrides_mut().clear_all();
                println!("All overrides cleared");
            }
        },
        Command::Fingerprint => println!("{}", session.fingerprint()),
        Command::Watch { interval, refresh_every } => {
            watch(&mut session, Duration::from_secs(interval.max(1)), refresh_every.max(1)).await;
        }
    }

    Ok(())
}

/// File-backed store in the data folder, or an unavailable store when the
/// folder cannot be created
fn open_store(cli_folder: Option<&std::path::Path>, config: &TomlConfig) -> SharedStore {
    let folder = resolve_data_folder(cli_folder, config);
    match std::fs::create_dir_all(&folder) {
        Ok(()) => {
            info!("Data folder: {}", folder.display());
            Arc::new(FileStore::new(folder.join(STORAGE_FILE)))
        }
        Err(e) => {
            warn!("Cannot create data folder {}: {}, state will not persist", folder.display(), e);
            UnavailableStore::shared(e.to_string())
        }
    }
}

async fn refresh(session: &mut Session<HttpMatchupApi>) {
    if session.refresh().await == FetchOutcome::Failed {
        if let Some(error) = session.state().last_error() {
            eprintln!("Could not load matchups: {}", error);
        }
    }
}

/// Redraw until Ctrl-C, refetching every `refresh_every` redraws
async fn watch(session: &mut Session<HttpMatchupApi>, interval: Duration, refresh_every: u32) {
    let mut ticker = tokio::time::interval(interval);
    let mut ticks: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if ticks % refresh_every == 0 {
                    refresh(session).await;
                }
                ticks = ticks.wrapping_add(1);
                print!("\x1b[2J\x1b[H{}", render_matchups(&session.views(), time::now()));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, leaving watch");
                break;
            }
        }
    }
}
