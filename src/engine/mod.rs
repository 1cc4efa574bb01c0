//! Session and polling engine.
//!
//! The engine owns the session material, the health state and the latest snapshot. Every
//! operation runs on `&mut self`, so the login flow, the session keeper and the poller are
//! sequenced by construction and never race on the session. Consumers observe the engine
//! through [`Engine::watch`] and [`Engine::subscribe`].

mod driver;
mod keeper;
mod login;
mod poller;

pub use driver::{delay_until_poll_second, INITIAL_BACKOFF};
pub use poller::{average_power, AVERAGING_WINDOW};

use crate::api::{Error, Portal, Transport};
use crate::model::{EngineSettings, EngineState, SessionMaterial, Snapshot, SystemInfo};
use crate::session_store::SessionFile;
use serde::Serialize;
use tokio::sync::{broadcast, watch};

/// Consecutive stale cycles before a warning is logged.
pub const STALE_WARNING_CYCLES: u32 = 5;
/// Minutes the portal keeps an idle session alive.
pub const SESSION_LIFETIME_MINUTES: u32 = 59;

const EVENT_CAPACITY: usize = 16;

/// Whether the staleness counter has reached the point where the operator is warned.
pub fn stale_warning_due(stale_cycles: u32) -> bool {
    stale_cycles >= STALE_WARNING_CYCLES
}

/* the keeper has to run at least once inside every session lifetime */
fn clamp_refresh_minutes(settings: &mut EngineSettings) {
    let clamped = settings
        .refresh_minutes
        .clamp(1, SESSION_LIFETIME_MINUTES - 1);
    if clamped != settings.refresh_minutes {
        log::warn!(
            "Refresh interval of {} minutes is out of range, using {} minutes",
            settings.refresh_minutes,
            clamped
        );
        settings.refresh_minutes = clamped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Fired once, the first time the engine becomes active.
    FirstLogin,
    /// A new, non-stale snapshot was accepted.
    DataUpdated,
}

/// Everything a consumer may read about the engine.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub state: EngineState,
    pub snapshot: Option<Snapshot>,
    pub system_info: Option<SystemInfo>,
    pub stale_cycles: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acceptance {
    Updated,
    Stale(u32),
}

pub struct Engine<T> {
    settings: EngineSettings,
    portal: Portal<T>,
    store: Option<SessionFile>,
    session: SessionMaterial,
    state: EngineState,
    snapshot: Option<Snapshot>,
    system_info: Option<SystemInfo>,
    cycles_since_refresh: u32,
    stale_cycles: u32,
    last_error: Option<Error>,
    first_login_sent: bool,
    events: broadcast::Sender<Event>,
    status: watch::Sender<Status>,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: T, mut settings: EngineSettings) -> Self {
        clamp_refresh_minutes(&mut settings);
        let portal = Portal::new(
            transport,
            settings.language.clone(),
            settings.user_agent.clone(),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status, _) = watch::channel(Status {
            state: EngineState::Starting,
            snapshot: None,
            system_info: None,
            stale_cycles: 0,
            last_error: None,
        });

        Engine {
            settings,
            portal,
            store: None,
            session: SessionMaterial::default(),
            state: EngineState::Starting,
            snapshot: None,
            system_info: None,
            cycles_since_refresh: 0,
            stale_cycles: 0,
            last_error: None,
            first_login_sent: false,
            events,
            status,
        }
    }

    /// Persist the session after every login and restore it on start.
    pub fn with_session_file(mut self, store: SessionFile) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn system_info(&self) -> Option<&SystemInfo> {
        self.system_info.as_ref()
    }

    pub fn session(&self) -> &SessionMaterial {
        &self.session
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn stale_cycles(&self) -> u32 {
        self.stale_cycles
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    pub fn status(&self) -> Status {
        Status {
            state: self.state,
            snapshot: self.snapshot.clone(),
            system_info: self.system_info.clone(),
            stale_cycles: self.stale_cycles,
            last_error: self.last_error.as_ref().map(Error::to_string),
        }
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            log::debug!("Engine state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        if state == EngineState::Active {
            self.last_error = None;
        }
        self.publish();
    }

    /// Reduce a failed operation to a state transition.
    fn fail(&mut self, error: Error) {
        let state = if error.is_recoverable() {
            EngineState::Error
        } else {
            EngineState::BadLogin
        };
        self.last_error = Some(error);
        self.set_state(state);
    }

    fn publish(&self) {
        self.status.send_replace(self.status());
    }

    fn emit(&self, event: Event) {
        /* nobody listening is fine */
        let _ = self.events.send(event);
    }

    /// Announce the first successful login, once per engine.
    fn announce_first_login(&mut self) {
        if self.state == EngineState::Active && !self.first_login_sent {
            self.first_login_sent = true;
            log::info!("Login successful");
            self.emit(Event::FirstLogin);
        }
    }

    /// Apply the freshness rules to a batch and keep its newest sample.
    pub(crate) fn accept(&mut self, mut batch: Vec<Snapshot>) -> Result<Acceptance, Error> {
        let newest = batch
            .first()
            .ok_or_else(|| Error::protocol("Received an empty energyflow-info batch"))?;

        if let Some(current) = &self.snapshot {
            if current.target_date == newest.target_date {
                self.stale_cycles += 1;
                log::debug!("Did not update data: Received existing data again.");
                if stale_warning_due(self.stale_cycles) {
                    log::warn!(
                        "No data updates from the ESS for {} cycles. You might want to check its connection.",
                        self.stale_cycles
                    );
                }
                self.publish();
                return Ok(Acceptance::Stale(self.stale_cycles));
            }
        }

        if !self.settings.latest_data_for_power {
            average_power(&mut batch)?;
        }
        let snapshot = batch.swap_remove(0);
        log::debug!("Updated data: {}", snapshot.target_date);

        self.snapshot = Some(snapshot);
        self.stale_cycles = 0;
        self.publish();
        self.emit(Event::DataUpdated);
        Ok(Acceptance::Updated)
    }
}
