//! Notification channels the scan session publishes to. Presentation layers
//! subscribe; nothing here waits for a reader.

use shared::{domain::Mode, protocol::InventoryEntry};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

use crate::outcome::OperationOutcome;

const EVENT_CAPACITY: usize = 256;

/// Remaining ADD-mode time for the timer identified by `timer_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub timer_id: u64,
    pub remaining_secs: u64,
}

/// Merged view of every channel, for front ends that prefer a single stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ModeChanged(Mode),
    CountdownTick { remaining_secs: u64 },
    /// The ADD-mode countdown stopped, by cancellation or expiry.
    CountdownCleared,
    LoadingChanged(bool),
    EntryUpdated(InventoryEntry),
    EntryCleared,
    EntryDeleted(String),
    Error(String),
}

pub struct ObservableState {
    current_entry: watch::Sender<Option<InventoryEntry>>,
    loading: watch::Sender<bool>,
    mode: watch::Sender<Mode>,
    countdown: watch::Sender<Option<Countdown>>,
    entry_deleted: broadcast::Sender<String>,
    error_message: broadcast::Sender<String>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for ObservableState {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl ObservableState {
    pub fn new(initial_mode: Mode) -> Self {
        let (entry_deleted, _) = broadcast::channel(EVENT_CAPACITY);
        let (error_message, _) = broadcast::channel(EVENT_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            current_entry: watch::Sender::new(None),
            loading: watch::Sender::new(false),
            mode: watch::Sender::new(initial_mode),
            countdown: watch::Sender::new(None),
            entry_deleted,
            error_message,
            events,
        }
    }

    pub fn current_entry(&self) -> Option<InventoryEntry> {
        self.current_entry.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn mode(&self) -> Mode {
        *self.mode.borrow()
    }

    pub fn countdown(&self) -> Option<Countdown> {
        *self.countdown.borrow()
    }

    pub fn subscribe_current_entry(&self) -> watch::Receiver<Option<InventoryEntry>> {
        self.current_entry.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<Mode> {
        self.mode.subscribe()
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<Option<Countdown>> {
        self.countdown.subscribe()
    }

    pub fn subscribe_entry_deleted(&self) -> broadcast::Receiver<String> {
        self.entry_deleted.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.error_message.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.loading.send_replace(loading);
        self.emit(SessionEvent::LoadingChanged(loading));
    }

    pub(crate) fn set_mode(&self, mode: Mode) {
        self.mode.send_replace(mode);
        self.emit(SessionEvent::ModeChanged(mode));
    }

    pub(crate) fn clear_entry(&self) {
        self.current_entry.send_replace(None);
        self.emit(SessionEvent::EntryCleared);
    }

    pub(crate) fn start_countdown(&self, timer_id: u64, remaining_secs: u64) {
        self.countdown.send_replace(Some(Countdown {
            timer_id,
            remaining_secs,
        }));
        self.emit(SessionEvent::CountdownTick { remaining_secs });
    }

    /// Ignored unless `timer_id` owns the countdown, so a tick racing with a
    /// cancellation cannot resurrect it.
    pub(crate) fn tick_countdown(&self, timer_id: u64, remaining_secs: u64) {
        let updated = self.countdown.send_if_modified(|current| match current {
            Some(countdown) if countdown.timer_id == timer_id => {
                countdown.remaining_secs = remaining_secs;
                true
            }
            _ => false,
        });
        if updated {
            self.emit(SessionEvent::CountdownTick { remaining_secs });
        }
    }

    pub(crate) fn clear_countdown(&self) {
        let cleared = self.countdown.send_if_modified(|current| current.take().is_some());
        if cleared {
            self.emit(SessionEvent::CountdownCleared);
        }
    }

    pub(crate) fn publish_error(&self, message: String) {
        let _ = self.error_message.send(message.clone());
        self.emit(SessionEvent::Error(message));
    }

    pub(crate) fn publish_outcome(&self, outcome: &OperationOutcome) {
        match outcome {
            OperationOutcome::EntryUpdated(entry) => {
                self.current_entry.send_replace(Some(entry.clone()));
                self.emit(SessionEvent::EntryUpdated(entry.clone()));
            }
            OperationOutcome::EntryDeleted(ean) => {
                self.current_entry.send_replace(None);
                let _ = self.entry_deleted.send(ean.clone());
                self.emit(SessionEvent::EntryDeleted(ean.clone()));
            }
            OperationOutcome::Failed(message) => self.publish_error(message.clone()),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
