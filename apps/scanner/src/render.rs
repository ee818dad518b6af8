//! Console rendering of session events.

use chrono::{Local, NaiveDate};
use client_core::SessionEvent;
use futures::StreamExt;
use shared::{domain::Mode, protocol::InventoryEntry};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

pub const NO_BACKEND_HINT: &str =
    "No backend configured. Use :url <address> (e.g. :url http://192.168.1.40:8080).";

pub fn format_countdown(remaining_secs: u64) -> String {
    format!("{}:{:02}", remaining_secs / 60, remaining_secs % 60)
}

pub fn mode_banner(mode: Mode) -> String {
    match mode {
        Mode::Add => "Mode: ADD - scans add one unit".to_string(),
        Mode::Remove => "Mode: REMOVE - scans remove one unit".to_string(),
    }
}

pub fn describe_entry(entry: &InventoryEntry, today: NaiveDate) -> String {
    let mut title = entry.display_name().to_string();
    if let Some(category) = entry.display_category() {
        title.push_str(&format!(" ({category})"));
    }

    let mut details = vec![format!("qty {}", entry.quantity)];
    if entry.is_low_stock() {
        details.push(format!("low stock (threshold {})", entry.low_stock_threshold));
    }
    match (entry.expiry(), entry.expiry_date.as_deref()) {
        (Some(date), _) => details.push(describe_expiry(date, today)),
        (None, Some(raw)) if !raw.trim().is_empty() => details.push(format!("expires {raw}")),
        _ => {}
    }

    format!("{title}\n  {}", details.join(" | "))
}

fn describe_expiry(date: NaiveDate, today: NaiveDate) -> String {
    let days = (date - today).num_days();
    match days {
        d if d < 0 => format!("expired {date}"),
        0 => format!("expires {date} (today)"),
        1 => format!("expires {date} (tomorrow)"),
        d => format!("expires {date} (in {d} days)"),
    }
}

/// Text for one event, or `None` when the event is not worth a console line.
pub fn describe_event(event: &SessionEvent, today: NaiveDate) -> Option<String> {
    match event {
        SessionEvent::ModeChanged(mode) => Some(mode_banner(*mode)),
        // Whole minutes and the final ten seconds; every tick would flood the console.
        SessionEvent::CountdownTick { remaining_secs }
            if remaining_secs % 60 == 0 || *remaining_secs <= 10 =>
        {
            Some(format!("ADD  {} left", format_countdown(*remaining_secs)))
        }
        SessionEvent::CountdownTick { .. } | SessionEvent::CountdownCleared => None,
        SessionEvent::LoadingChanged(_) | SessionEvent::EntryCleared => None,
        SessionEvent::EntryUpdated(entry) => Some(describe_entry(entry, today)),
        SessionEvent::EntryDeleted(ean) => Some(format!("Removed the last unit of {ean}.")),
        SessionEvent::Error(message) => Some(format!("Error: {message}")),
    }
}

pub fn describe_inventory(entries: &[InventoryEntry], today: NaiveDate) -> String {
    if entries.is_empty() {
        return "Inventory is empty.".to_string();
    }
    entries
        .iter()
        .map(|entry| describe_entry(entry, today))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn run(mut events: BroadcastStream<SessionEvent>) {
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                if let SessionEvent::LoadingChanged(loading) = &event {
                    debug!(loading, "loading state changed");
                }
                if let Some(line) = describe_event(&event, Local::now().date_naive()) {
                    println!("{line}");
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "console renderer fell behind session events");
            }
        }
    }
}
