pub mod summary;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::Local;
use chrono_english::{parse_date_string, Dialect};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;

use crate::{
    core::machine::EventError,
    storage::day_store::FileDayStore,
    sync::{
        client::{HttpRemoteStore, RemoteStore},
        SyncEngine,
    },
    tracker::{
        watch::{detect_shutdown, WatchLoop},
        Tracker, UndoOutcome,
    },
    utils::{
        clock::DefaultClock,
        config::RemoteConfig,
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
        time::{format_duration_clock, format_duration_short},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Onto", version)]
#[command(about = "Single-user activity tracker with offline-first sync", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable console logging")]
    log: bool,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start tracking an activity")]
    Start { name: String },
    #[command(about = "Close the running lap and start the next activity")]
    Next { name: String },
    #[command(about = "Close the running lap and stop tracking")]
    Stop,
    #[command(about = "Delete a completed lap by id (recoverable with undo for 5 seconds)")]
    Delete { id: String },
    #[command(about = "Restore the most recently deleted lap")]
    Undo,
    #[command(about = "Show the running lap and today's laps")]
    Status,
    #[command(about = "Per-activity totals for a day, plus recent days")]
    Summary {
        #[arg(
            long,
            help = "Day to summarize. Examples are \"yesterday\", \"15/03/2025\", \"monday\""
        )]
        date: Option<String>,
        #[arg(long, default_value_t = 7, help = "How many past days to list")]
        days: usize,
    },
    #[command(about = "List activity name suggestions")]
    Presets,
    #[command(about = "Pull from and push to the remote store now")]
    Sync,
    #[command(about = "Run in the foreground, handling day rollover and periodic sync")]
    Watch,
    #[command(about = "Show or change the remote store endpoint")]
    Config {
        #[arg(long, help = "Remote store url, e. g. https://onto-api.example.workers.dev")]
        url: Option<String>,
        #[arg(long, help = "Shared bearer token")]
        token: Option<String>,
        #[arg(long, help = "Forget the remote store and go local-only")]
        clear: bool,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match &args.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Config { url, token, clear } => run_config(&app_dir, url, token, clear),
        commands => {
            let mut tracker = open_tracker(&app_dir).await?;
            match commands {
                Commands::Start { name } => run_start(&mut tracker, &name).await,
                Commands::Next { name } => run_next(&mut tracker, &name).await,
                Commands::Stop => run_stop(&mut tracker).await,
                Commands::Delete { id } => run_delete(&mut tracker, &id).await,
                Commands::Undo => run_undo(&mut tracker).await,
                Commands::Status => run_status(&tracker),
                Commands::Summary { date, days } => run_summary(&tracker, date, days).await,
                Commands::Presets => {
                    for name in tracker.presets().names() {
                        println!("{name}");
                    }
                    Ok(())
                }
                Commands::Sync => {
                    if tracker.refresh().await? {
                        println!("Synced {}", tracker.state().date_key);
                    } else {
                        println!("No remote store configured. Set one with `onto config`.");
                    }
                    Ok(())
                }
                Commands::Watch => run_watch(tracker).await,
                Commands::Config { .. } => unreachable!("handled above"),
            }
        }
    }
}

async fn open_tracker(app_dir: &std::path::Path) -> Result<Tracker<FileDayStore>> {
    let store = FileDayStore::new(app_dir.to_owned())?;
    let config = RemoteConfig::load(app_dir);
    let remote: Option<Arc<dyn RemoteStore>> = match config.credentials() {
        Some((url, token)) => Some(Arc::new(HttpRemoteStore::new(url, token)?)),
        None => None,
    };
    Tracker::open(store, SyncEngine::new(remote), Box::new(DefaultClock)).await
}

async fn run_start(tracker: &mut Tracker<FileDayStore>, name: &str) -> Result<()> {
    match tracker.start(name).await {
        Ok(()) => {
            println!("Started \"{name}\"");
            Ok(())
        }
        Err(e)
            if e.downcast_ref::<EventError>() == Some(&EventError::AlreadyTracking) =>
        {
            let current = tracker
                .state()
                .active
                .as_ref()
                .map(|v| v.name.clone())
                .unwrap_or_default();
            println!(
                "Already tracking \"{current}\". Use `onto next {name}` to switch or `onto stop` first."
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn run_next(tracker: &mut Tracker<FileDayStore>, name: &str) -> Result<()> {
    match tracker.record_lap(name).await? {
        Some(closed) => println!(
            "Closed \"{}\" after {}, started \"{name}\"",
            closed.name,
            format_duration_short(closed.duration)
        ),
        None => println!("Started \"{name}\""),
    }
    Ok(())
}

async fn run_stop(tracker: &mut Tracker<FileDayStore>) -> Result<()> {
    match tracker.stop().await? {
        Some(closed) => println!(
            "Stopped \"{}\" after {}",
            closed.name,
            format_duration_short(closed.duration)
        ),
        None => println!("Nothing is being tracked"),
    }
    Ok(())
}

async fn run_delete(tracker: &mut Tracker<FileDayStore>, id: &str) -> Result<()> {
    if tracker.delete(id).await? {
        println!("Deleted lap {id}. `onto undo` restores it within 5 seconds.");
    } else {
        println!("No lap with id {id}");
    }
    Ok(())
}

async fn run_undo(tracker: &mut Tracker<FileDayStore>) -> Result<()> {
    match tracker.undo().await? {
        UndoOutcome::Restored(lap) => println!("Restored \"{}\"", lap.name),
        UndoOutcome::Expired => println!("Too late, the undo window has passed"),
        UndoOutcome::Nothing => println!("Nothing to undo"),
    }
    Ok(())
}

fn run_status(tracker: &Tracker<FileDayStore>) -> Result<()> {
    let state = tracker.state();
    match &state.active {
        Some(active) => println!(
            "Tracking \"{}\" for {}",
            active.name,
            format_duration_clock(active.elapsed(tracker.now()))
        ),
        None => println!("Idle"),
    }

    if !state.laps.is_empty() {
        println!();
        for lap in &state.laps {
            println!(
                "  {:>8}  {}  ({})",
                format_duration_short(lap.duration),
                lap.name,
                lap.id
            );
        }
    }
    Ok(())
}

async fn run_summary(
    tracker: &Tracker<FileDayStore>,
    date: Option<String>,
    days: usize,
) -> Result<()> {
    let today = tracker.state().date_key;
    let date = match date {
        Some(raw) => parse_date_string(&raw, Local::now(), Dialect::Uk)
            .map_err(|e| anyhow::anyhow!("could not parse date \"{raw}\": {e}"))?
            .date_naive(),
        None => today,
    };

    let (usages, total) = if date == today {
        summary::analyze_day(&tracker.state().snapshot(), Some(tracker.now()))
    } else {
        let snapshot = tracker.stored_day(date).await?.unwrap_or_default();
        summary::analyze_day(&snapshot, None)
    };
    summary::print_day(date, &usages, total);

    let past = tracker
        .stored_days()
        .await?
        .into_iter()
        .filter(|v| *v != date)
        .take(days)
        .collect::<Vec<_>>();
    if !past.is_empty() {
        println!();
        println!("Past days");
        for day in past {
            let snapshot = tracker.stored_day(day).await?.unwrap_or_default();
            if snapshot.laps.is_empty() {
                continue;
            }
            let (usages, total) = summary::analyze_day(&snapshot, None);
            summary::print_past_day(day, &usages, total);
        }
    }
    Ok(())
}

async fn run_watch(tracker: Tracker<FileDayStore>) -> Result<()> {
    println!("Watching. Ctrl-C to stop.");
    let shutdown = CancellationToken::new();
    let watch = WatchLoop::new(tracker, shutdown.clone(), Box::new(DefaultClock));
    let (_, result) = tokio::join!(detect_shutdown(shutdown), watch.run());
    result
}

fn run_config(
    app_dir: &std::path::Path,
    url: Option<String>,
    token: Option<String>,
    clear: bool,
) -> Result<()> {
    let mut config = RemoteConfig::load(app_dir);

    if clear {
        config = RemoteConfig::default();
    }
    if url.is_some() {
        config.api_url = url;
    }
    if token.is_some() {
        config.api_token = token;
    }
    config.save(app_dir)?;

    match config.credentials() {
        Some((url, _)) => println!("Sync configured against {url}"),
        None => println!("Local-only: set both --url and --token to enable sync"),
    }
    Ok(())
}
