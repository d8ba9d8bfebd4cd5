use chrono::{DateTime, Utc};
use colored::*;
use slotline_engine::{AlertKind, DashboardView, RevenueUpdate, TickEvent};
use slotline_protocol::prelude::{Benchmark, DailyRecord, HistoryMap, PriorityTier, Settings};
use slotline_sync::{PullOutcome, SyncStatus};

fn tier(priority: PriorityTier) -> ColoredString {
    let label = priority.to_string();
    let label = label.as_str();
    match priority {
        PriorityTier::Red => label.red().bold(),
        PriorityTier::Blue => label.blue(),
        PriorityTier::Yellow => label.yellow(),
        PriorityTier::Green => label.green(),
    }
}

fn benchmark(value: Benchmark) -> ColoredString {
    let label = value.label();
    match value {
        Benchmark::BadDay => label.red(),
        Benchmark::Standard => label.normal(),
        Benchmark::GoodDay => label.green(),
        Benchmark::StrongDay => label.green().bold(),
        Benchmark::Exceptional => label.magenta().bold(),
    }
}

pub fn print_status(view: &DashboardView) {
    println!("{} {}", "Business day".bold(), view.day.to_string().bold());
    match &view.slot_info {
        Some(slot) => println!(
            "  Slot {}/18 {} {} [{}] next in {}",
            view.slot,
            slot.start_label,
            slot.geo_tag,
            tier(slot.priority),
            view.next_slot_in
        ),
        None => println!("  Slot {}/18, next in {}", view.slot, view.next_slot_in),
    }
    if let Some(text) = &view.time_override {
        println!("  {} {}", "time override:".yellow(), text);
    }
    println!(
        "  Revenue ${:.2} of ${:.2} goal ({:.0}%), updated {}",
        view.revenue, view.goal, view.projection.goal_progress, view.last_updated
    );
    println!(
        "  Projection: linear ${:.2}, weighted ${:.2} ({}, {:?} confidence)",
        view.projection.linear,
        view.projection.weighted,
        benchmark(view.projection.benchmark),
        view.projection.confidence
    );
    println!(
        "  Posted slots: {:?}, RED slots remaining: {}",
        view.posted_slots, view.projection.red_slots_remaining
    );
    if view.prime_banner {
        println!("  {}", "US prime time is live".red().bold());
    }
    if let Some(notice) = &view.notice {
        println!("  {}", notice.yellow());
    }
    if let Some(pending) = &view.pending {
        println!(
            "{} {} closed at ${:.2} (goal ${:.2}); confirm with `slotline reconcile <final>`",
            "⚠ Awaiting reconciliation:".yellow().bold(),
            pending.date,
            pending.last_revenue,
            pending.goal
        );
    }
}

pub fn print_update(update: &RevenueUpdate) {
    println!("{} ${:.2}", "✔ Revenue recorded:".green().bold(), update.value);
    if update.adjusted {
        println!("  {}", slotline_engine::input::CLAMP_MESSAGE.yellow());
    }
    if let Some(checkpoint) = &update.checkpoint {
        println!(
            "  Checkpoint slot {} delta {:+.2}",
            checkpoint.slot, checkpoint.delta
        );
    }
    println!(
        "  Weighted projection ${:.2} ({})",
        update.projection.weighted,
        benchmark(update.projection.benchmark)
    );
}

pub fn print_record(title: &str, record: &DailyRecord) {
    println!(
        "{} {} ${:.2} of ${:.2} ({})",
        title.green().bold(),
        record.date,
        record.revenue,
        record.goal,
        benchmark(record.benchmark)
    );
    println!(
        "  Slots {}, projection ${:.2}, {} checkpoints",
        record.slots_reached,
        record.weighted_projection,
        record.checkpoint_log.len()
    );
}

pub fn print_history(history: &HistoryMap) {
    if history.is_empty() {
        println!("No history yet.");
        return;
    }
    for record in history.values().rev() {
        let mark = if record.met_goal() { "✔".green() } else { "·".normal() };
        println!(
            "{} {}  ${:>9.2} / ${:<8.2} {:<12} {:?}",
            mark,
            record.date,
            record.revenue,
            record.goal,
            benchmark(record.benchmark),
            record.kind
        );
    }
}

pub fn print_settings(settings: &Settings) {
    println!("{}", "Settings".bold());
    println!("  Theme: {:?}", settings.theme);
    println!("  Alarm slots: {:?}", settings.enabled_alarms);
    println!("  Notifications: {}", settings.notifications);
    let bridge = if settings.has_bridge() {
        settings.bridge_url.as_deref().unwrap_or_default().green()
    } else {
        "not configured".normal()
    };
    println!("  Sync bridge: {}", bridge);
}

pub fn print_sync_status(status: &SyncStatus, last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) {
    let label = match status {
        SyncStatus::Off => "off".normal(),
        SyncStatus::Idle => "configured, not contacted yet".normal(),
        SyncStatus::Connected => "connected".green(),
        SyncStatus::Syncing => "syncing".yellow(),
        SyncStatus::Error(message) => format!("error: {message}").as_str().red(),
    };
    println!(
        "Sync {} (last sync {})",
        label,
        slotline_engine::time_ago(last_sync, now)
    );
}

pub fn print_pull(outcome: &PullOutcome) {
    match outcome {
        PullOutcome::Applied { remote } => {
            println!("{} {}", "✔ Adopted remote snapshot from".green().bold(), remote)
        }
        PullOutcome::Stale { remote, .. } => {
            println!("Remote snapshot from {remote} is not newer; local state kept")
        }
        PullOutcome::Empty => println!("Remote mirror is empty"),
    }
}

pub fn print_tick_event(event: &TickEvent) {
    match event {
        TickEvent::DayRolledOver(transition) => {
            println!(
                "{} {} → {}",
                "Business day rolled over:".bold(),
                transition.from,
                transition.to
            );
            if let Some(pending) = &transition.pending {
                println!(
                    "  {} closed at ${:.2}; awaiting reconciliation",
                    pending.date, pending.last_revenue
                );
            }
        }
        TickEvent::SlotChanged { slot } => println!("Slot {slot} started"),
        TickEvent::Alert(alert) => match alert.kind {
            AlertKind::PreStart => println!(
                "{} slot {} starts in 20 minutes",
                "⏰".yellow(),
                alert.slot
            ),
            AlertKind::Start => println!("{} slot {} is live", "🔔".red(), alert.slot),
        },
    }
}
