use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use shared::domain::{Ean, Mode};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    gateway::{HttpInventoryGateway, InventoryGateway, DEFAULT_REQUEST_TIMEOUT},
    outcome::{failure_message, OperationOutcome},
    state::ObservableState,
    timer::SessionTimer,
};

pub const ADD_MODE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
pub const CONFIGURATION_REQUIRED_MESSAGE: &str =
    "Backend URL not configured. Set one with :url <address>.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub add_mode_timeout: Duration,
    pub countdown_tick: Duration,
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            add_mode_timeout: ADD_MODE_TIMEOUT,
            countdown_tick: COUNTDOWN_TICK,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// What `handle_scan` did with one piece of scanner input.
#[derive(Debug)]
pub enum ScanDispatch {
    /// Blank input; nothing was published.
    Ignored,
    /// Finished without reaching the backend (no endpoint configured).
    Completed(OperationOutcome),
    /// Request in flight. The outcome is published to the observable state
    /// when it lands, whether or not anyone awaits this handle.
    Pending(JoinHandle<OperationOutcome>),
}

impl ScanDispatch {
    pub async fn outcome(self) -> Option<OperationOutcome> {
        match self {
            Self::Ignored => None,
            Self::Completed(outcome) => Some(outcome),
            Self::Pending(handle) => match handle.await {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    warn!(error = %err, "scan dispatch task did not complete");
                    None
                }
            },
        }
    }
}

struct SessionInner {
    mode: Mode,
    timer: Option<SessionTimer>,
    next_timer_id: u64,
    gateway: Option<Arc<dyn InventoryGateway>>,
}

/// Scan session controller: owns the ADD/REMOVE mode, the ADD-mode countdown
/// and the gateway, and turns each scan into exactly one published outcome.
///
/// Overlapping dispatches are not sequenced. Outcomes publish in the order the
/// backend answers, and a mode switch does not cancel requests in flight.
pub struct ScanSession {
    config: SessionConfig,
    inner: Mutex<SessionInner>,
    state: ObservableState,
}

impl ScanSession {
    pub fn new(config: SessionConfig) -> Arc<Self> {
        Self::new_with_gateway(config, None)
    }

    pub fn new_with_gateway(
        config: SessionConfig,
        gateway: Option<Arc<dyn InventoryGateway>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            inner: Mutex::new(SessionInner {
                mode: Mode::Remove,
                timer: None,
                next_timer_id: 1,
                gateway,
            }),
            state: ObservableState::new(Mode::Remove),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &ObservableState {
        &self.state
    }

    pub async fn mode(&self) -> Mode {
        self.inner.lock().await.mode
    }

    pub async fn is_configured(&self) -> bool {
        self.inner.lock().await.gateway.is_some()
    }

    pub async fn gateway(&self) -> Option<Arc<dyn InventoryGateway>> {
        self.inner.lock().await.gateway.clone()
    }

    /// Points the session at a new backend. A blank URL unconfigures it.
    /// Requests already in flight keep the gateway they started with.
    pub async fn configure(&self, base_url: &str) -> Result<()> {
        let gateway: Option<Arc<dyn InventoryGateway>> = if base_url.trim().is_empty() {
            None
        } else {
            let gateway = HttpInventoryGateway::with_timeout(base_url, self.config.request_timeout)
                .with_context(|| format!("failed to configure backend '{}'", base_url.trim()))?;
            info!(base_url = %gateway.base_url(), "backend configured");
            Some(Arc::new(gateway) as Arc<dyn InventoryGateway>)
        };
        if gateway.is_none() {
            info!("backend unconfigured");
        }
        self.set_gateway(gateway).await;
        Ok(())
    }

    pub async fn set_gateway(&self, gateway: Option<Arc<dyn InventoryGateway>>) {
        self.inner.lock().await.gateway = gateway;
    }

    pub async fn select_mode(self: &Arc<Self>, mode: Mode) {
        let mut guard = self.inner.lock().await;
        self.enter_mode(&mut guard, mode);
    }

    fn enter_mode(self: &Arc<Self>, inner: &mut SessionInner, mode: Mode) {
        if let Some(timer) = inner.timer.take() {
            debug!(timer_id = timer.id(), "cancelling add-mode countdown");
            timer.cancel();
        }
        self.state.clear_countdown();

        inner.mode = mode;
        if mode == Mode::Add {
            let timer_id = inner.next_timer_id;
            inner.next_timer_id += 1;
            self.state
                .start_countdown(timer_id, self.config.add_mode_timeout.as_secs());
            inner.timer = Some(self.start_add_mode_timer(timer_id));
        }

        info!(%mode, "scan mode selected");
        self.state.set_mode(mode);
        self.state.clear_entry();
    }

    fn start_add_mode_timer(self: &Arc<Self>, timer_id: u64) -> SessionTimer {
        let ticking = Arc::downgrade(self);
        let expiring = Arc::downgrade(self);
        SessionTimer::start(
            timer_id,
            self.config.add_mode_timeout,
            self.config.countdown_tick,
            move |remaining_secs| {
                if let Some(session) = ticking.upgrade() {
                    session.state.tick_countdown(timer_id, remaining_secs);
                }
            },
            move |timer_id| async move {
                if let Some(session) = expiring.upgrade() {
                    session.expire_add_mode(timer_id).await;
                }
            },
        )
    }

    async fn expire_add_mode(self: &Arc<Self>, timer_id: u64) {
        let mut guard = self.inner.lock().await;
        let is_current = guard
            .timer
            .as_ref()
            .is_some_and(|timer| timer.id() == timer_id);
        if !is_current || guard.mode != Mode::Add {
            debug!(timer_id, "ignoring expiry of superseded countdown");
            return;
        }

        // The timer task is the caller here; drop the handle instead of
        // aborting it.
        drop(guard.timer.take());
        info!(timer_id, "add mode timed out");
        self.enter_mode(&mut guard, Mode::Remove);
    }

    /// Dispatches one scan against the backend using the current mode.
    pub async fn handle_scan(self: &Arc<Self>, raw_input: &str) -> ScanDispatch {
        let Some(ean) = Ean::from_scan(raw_input) else {
            return ScanDispatch::Ignored;
        };

        let (mode, gateway) = {
            let guard = self.inner.lock().await;
            (guard.mode, guard.gateway.clone())
        };

        let Some(gateway) = gateway else {
            warn!(%ean, "scan rejected: backend not configured");
            let outcome = OperationOutcome::Failed(CONFIGURATION_REQUIRED_MESSAGE.to_string());
            self.state.publish_outcome(&outcome);
            return ScanDispatch::Completed(outcome);
        };

        self.state.set_loading(true);
        let session = Arc::clone(self);
        ScanDispatch::Pending(tokio::spawn(async move {
            let outcome = dispatch(gateway.as_ref(), mode, &ean).await;
            session.state.publish_outcome(&outcome);
            session.state.set_loading(false);
            outcome
        }))
    }

    /// Stops the countdown. Mode is left as is.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(timer) = guard.timer.take() {
            timer.cancel();
        }
        self.state.clear_countdown();
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.get_mut().timer.take() {
            timer.cancel();
        }
    }
}

async fn dispatch(gateway: &dyn InventoryGateway, mode: Mode, ean: &Ean) -> OperationOutcome {
    let result = match mode {
        Mode::Add => gateway
            .add_unit(ean)
            .await
            .map(OperationOutcome::EntryUpdated),
        Mode::Remove => gateway.remove_unit(ean).await.map(|entry| match entry {
            Some(entry) => OperationOutcome::EntryUpdated(entry),
            None => OperationOutcome::EntryDeleted(ean.to_string()),
        }),
    };

    match result {
        Ok(outcome) => {
            match &outcome {
                OperationOutcome::EntryUpdated(entry) => {
                    info!(%ean, %mode, quantity = entry.quantity, "inventory entry updated")
                }
                OperationOutcome::EntryDeleted(_) => info!(%ean, "inventory entry deleted"),
                OperationOutcome::Failed(_) => {}
            }
            outcome
        }
        Err(err) => {
            warn!(%ean, %mode, error = %err, "scan dispatch failed");
            OperationOutcome::Failed(failure_message(&err))
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
