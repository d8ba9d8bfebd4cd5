use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use slotline_core::logging::init_tracing;
use slotline_core::{FileStore, SharedStore, SlotlineConfig, SyncEndpoint};
use slotline_engine::archive::{export_backup_json, export_calendar, load_history};
use slotline_engine::input::parse_amount;
use slotline_engine::{TickRuntime, Tracker};
use slotline_protocol::prelude::{DayKey, Theme};
use slotline_sync::rest::DEFAULT_TABLE;
use slotline_sync::{build_coordinator, resolve_endpoint, RealtimeListener, SyncDriver, SyncTrigger};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

mod render;

#[derive(Parser)]
#[command(name = "slotline")]
#[command(about = "Slotline - slot-anchored daily revenue tracker", long_about = None)]
struct Cli {
    /// Directory holding the local store
    #[arg(long, global = true, env = "SLOTLINE_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Evaluate at a fixed instant (RFC 3339) instead of now
    #[arg(long, global = true)]
    at: Option<DateTime<Utc>>,
    /// Manual time of day for slot computation, e.g. "3:20 PM" or "15:20"
    #[arg(long, global = true)]
    time: Option<String>,
    /// Print machine-readable JSON where supported
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current slot, totals and projections
    Status,
    /// Record the day's cumulative revenue
    Record {
        /// Amount, e.g. 42.50 or $1,200
        revenue: String,
    },
    /// Set the daily goal; omit the value to restore the default
    Goal { value: Option<String> },
    /// Toggle whether a slot has been posted
    Toggle { slot: u8 },
    /// Confirm the final total of the day awaiting reconciliation
    Reconcile { total: String },
    /// Inspect or correct history
    #[command(subcommand)]
    History(HistoryCommands),
    /// Export or import a history backup
    #[command(subcommand)]
    Backup(BackupCommands),
    /// Export history as an iCalendar file
    #[command(subcommand)]
    Calendar(CalendarCommands),
    /// Mirror local state to the remote row
    #[command(subcommand)]
    Sync(SyncCommands),
    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommands),
    /// Run the tick loop and sync driver until interrupted
    Watch,
    /// Wipe all local state
    Reset {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List recorded days, newest first
    List,
    /// Overwrite revenue and goal of one day
    Edit(EditArgs),
    /// Remove one day
    Delete { date: DayKey },
}

#[derive(Args)]
struct EditArgs {
    date: DayKey,
    #[arg(long)]
    revenue: String,
    #[arg(long)]
    goal: String,
}

#[derive(Subcommand)]
enum BackupCommands {
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Import { path: PathBuf },
}

#[derive(Subcommand)]
enum CalendarCommands {
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    Push,
    Pull,
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
enum SettingsCommands {
    Show,
    /// Replace the set of alarmed slots
    Alarms { slots: Vec<u8> },
    Notifications {
        #[arg(value_enum)]
        state: Toggle,
    },
    Theme {
        #[arg(value_enum)]
        theme: ThemeArg,
    },
    /// Store mirror credentials on this device, or clear them
    Bridge(BridgeArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
}

#[derive(Args)]
struct BridgeArgs {
    #[arg(long, requires = "key")]
    url: Option<String>,
    #[arg(long, requires = "url")]
    key: Option<String>,
    #[arg(long, conflicts_with_all = ["url", "key"], default_value_t = false)]
    clear: bool,
}

struct Session {
    config: SlotlineConfig,
    store: SharedStore,
    tracker: Tracker,
    now: DateTime<Utc>,
}

fn load_config(cli: &Cli) -> Result<SlotlineConfig> {
    let mut config = SlotlineConfig::from_env().context("failed to load configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

impl Session {
    fn open(cli: &Cli, config: SlotlineConfig) -> Result<Self> {
        let now = cli.at.unwrap_or_else(Utc::now);
        let store: SharedStore = Arc::new(
            FileStore::open(config.store_path())
                .with_context(|| format!("failed to open store in {}", config.data_dir.display()))?,
        );
        let mut tracker = Tracker::open(store.clone(), config.default_goal, now)?;
        tracker.set_time_override(cli.time.clone());
        Ok(Self {
            config,
            store,
            tracker,
            now,
        })
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_or_print(output: Option<&PathBuf>, contents: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{contents}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("Slotline v{}", env!("CARGO_PKG_VERSION"));
        println!("18 slots per business day, anchored at 09:00 UTC+01:00");
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_tracing(Some(&config.log_level))?;
    let mut session = Session::open(&cli, config)?;
    let now = session.now;

    match cli.command {
        Commands::Status => {
            let view = session.tracker.view(now);
            if cli.json {
                print_json(&view)?;
            } else {
                render::print_status(&view);
            }
        }
        Commands::Record { revenue } => {
            let amount = parse_amount(&revenue)?;
            let update = session.tracker.observe_revenue(amount, now)?;
            render::print_update(&update);
        }
        Commands::Goal { value } => {
            let goal = value.as_deref().map(parse_amount).transpose()?;
            let goal = session.tracker.set_goal(goal, now)?;
            println!("Daily goal set to ${goal:.2}");
        }
        Commands::Toggle { slot } => {
            let posted = session.tracker.toggle_slot(slot, now)?;
            let state = if posted { "posted" } else { "not posted" };
            println!("Slot {slot} marked {state}");
        }
        Commands::Reconcile { total } => {
            let total = parse_amount(&total)?;
            let record = session.tracker.reconcile(total, now)?;
            render::print_record("✔ Day reconciled:", &record);
        }
        Commands::History(command) => match command {
            HistoryCommands::List => {
                let history = load_history(session.store.as_ref());
                if cli.json {
                    print_json(&history)?;
                } else {
                    render::print_history(&history);
                }
            }
            HistoryCommands::Edit(args) => {
                let record = session.tracker.edit_record(
                    args.date,
                    parse_amount(&args.revenue)?,
                    parse_amount(&args.goal)?,
                    now,
                )?;
                render::print_record("✔ Record updated:", &record);
            }
            HistoryCommands::Delete { date } => {
                session.tracker.delete_record(date, now)?;
                println!("Deleted {date}");
            }
        },
        Commands::Backup(command) => match command {
            BackupCommands::Export { output } => {
                let text = export_backup_json(session.store.as_ref(), now)?;
                write_or_print(output.as_ref(), &text)?;
            }
            BackupCommands::Import { path } => {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let days = session.tracker.import_backup(&text, now)?;
                println!("Imported {days} days from {}", path.display());
            }
        },
        Commands::Calendar(CalendarCommands::Export { output }) => {
            let ics = export_calendar(&load_history(session.store.as_ref()));
            write_or_print(output.as_ref(), &ics)?;
        }
        Commands::Sync(command) => {
            let settings = session.tracker.settings().clone();
            let coordinator = build_coordinator(session.store.clone(), &session.config, &settings)?;
            match command {
                SyncCommands::Push => {
                    let snapshot = coordinator.push(now).await?;
                    println!("Pushed {} keys to row {}", snapshot.payload.len(), coordinator.row_id());
                }
                SyncCommands::Pull => {
                    let outcome = coordinator.pull(now).await?;
                    render::print_pull(&outcome);
                }
                SyncCommands::Status => {}
            }
            render::print_sync_status(&coordinator.status(), coordinator.last_sync(), now);
        }
        Commands::Settings(command) => {
            let mut settings = session.tracker.settings().clone();
            match command {
                SettingsCommands::Show => {}
                SettingsCommands::Alarms { slots } => {
                    settings.enabled_alarms = slots.into_iter().collect::<BTreeSet<u8>>();
                }
                SettingsCommands::Notifications { state } => {
                    settings.notifications = matches!(state, Toggle::On);
                }
                SettingsCommands::Theme { theme } => {
                    settings.theme = match theme {
                        ThemeArg::Light => Theme::Light,
                        ThemeArg::Dark => Theme::Dark,
                    };
                }
                SettingsCommands::Bridge(args) => {
                    if args.clear {
                        settings.bridge_url = None;
                        settings.bridge_key = None;
                    } else if let (Some(url), Some(key)) = (args.url, args.key) {
                        settings.bridge_url = Some(url);
                        settings.bridge_key = Some(key);
                    } else {
                        bail!("pass --url and --key, or --clear");
                    }
                }
            }
            if settings != *session.tracker.settings() {
                session.tracker.update_settings(settings, now)?;
            }
            render::print_settings(session.tracker.settings());
        }
        Commands::Watch => watch_loop(session).await?,
        Commands::Reset { yes } => {
            if !yes {
                bail!("refusing to wipe local state without --yes");
            }
            session.tracker.factory_reset(now)?;
            println!("Local state wiped");
        }
        Commands::Version => {}
    }

    Ok(())
}

async fn watch_loop(session: Session) -> Result<()> {
    let Session {
        config,
        store,
        tracker,
        ..
    } = session;
    let settings = tracker.settings().clone();
    let endpoint = resolve_endpoint(&config, &settings);
    let coordinator = Arc::new(build_coordinator(store, &config, &settings)?);
    let modifications = tracker.subscribe_modifications();
    let tracker = tracker.shared();

    render::print_status(&tracker.lock().view(Utc::now()));

    let (events_tx, mut events_rx) = mpsc::channel(32);
    let runtime = TickRuntime::start(tracker.clone(), &config, events_tx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (triggers_tx, triggers_rx) = mpsc::channel(16);
    let mut workers = Vec::new();

    if coordinator.is_enabled() {
        let driver = SyncDriver::new(coordinator.clone(), tracker.clone(), config.sync_debounce);
        workers.push(tokio::spawn(driver.run(
            triggers_rx,
            modifications,
            shutdown_rx.clone(),
        )));

        if let Some(SyncEndpoint {
            key,
            realtime_url: Some(realtime_url),
            ..
        }) = endpoint
        {
            match RealtimeListener::new(&realtime_url, DEFAULT_TABLE) {
                Ok(listener) => workers.push(
                    listener
                        .with_access_token(key)
                        .spawn(triggers_tx.clone(), shutdown_rx.clone()),
                ),
                Err(err) => warn!(%err, "realtime listener disabled"),
            }
        }
        if triggers_tx.send(SyncTrigger::Foreground).await.is_err() {
            warn!("sync driver exited before the initial pull");
        }
    } else {
        info!("sync is off; running locally");
    }

    println!("Watching; press Ctrl-C to stop.");
    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(event) => render::print_tick_event(&event),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    shutdown_tx.send_replace(true);
    drop(triggers_tx);
    runtime
        .shutdown()
        .await
        .map_err(|err| anyhow!("tick loop did not stop cleanly: {err}"))?;
    for worker in workers {
        if let Err(err) = worker.await {
            warn!(?err, "background task crashed");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "slotline",
            "record",
            "$42.50",
            "--at",
            "2024-05-01T10:00:00Z",
            "--time",
            "3:20 PM",
        ])
        .unwrap();
        assert!(cli.at.is_some());
        assert_eq!(cli.time.as_deref(), Some("3:20 PM"));
        assert!(matches!(cli.command, Commands::Record { .. }));
    }

    #[test]
    fn bridge_requires_both_halves() {
        assert!(Cli::try_parse_from(["slotline", "settings", "bridge", "--url", "https://x"]).is_err());
        assert!(Cli::try_parse_from(["slotline", "settings", "bridge", "--clear"]).is_ok());
    }

    #[test]
    fn history_dates_are_validated() {
        assert!(Cli::try_parse_from(["slotline", "history", "delete", "2024-05-01"]).is_ok());
        assert!(Cli::try_parse_from(["slotline", "history", "delete", "yesterday"]).is_err());
    }

    #[test]
    fn one_shot_commands_share_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "slotline",
            "status",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--at",
            "2024-05-01T08:50:00Z",
        ])
        .unwrap();

        let mut first = Session::open(&cli, load_config(&cli).unwrap()).unwrap();
        first.tracker.observe_revenue(21.0, first.now).unwrap();

        let second = Session::open(&cli, load_config(&cli).unwrap()).unwrap();
        assert_eq!(second.tracker.view(second.now).revenue, 21.0);
    }
}
