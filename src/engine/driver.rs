use super::Engine;
use crate::api::Transport;
use crate::model::EngineState;
use crate::session_store::SessionFile;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

pub const INITIAL_BACKOFF: Duration = Duration::from_secs(10);

/* second 25 of the minute has been the most reliable moment to ask for new data */
const POLL_PHASE_MILLIS: i64 = 85_000;
const MINUTE_MILLIS: i64 = 60_000;

/// Time until second 25 of the next minute. Always between 25 and 85 seconds.
pub fn delay_until_poll_second(now: DateTime<Utc>) -> Duration {
    let millis = POLL_PHASE_MILLIS - now.timestamp_millis().rem_euclid(MINUTE_MILLIS);
    Duration::from_millis(millis as u64)
}

impl<T: Transport> Engine<T> {
    /// Bring the engine up: reuse a stored session when there is one, otherwise log in, and
    /// keep retrying with a doubling delay until the engine is active or the credentials are
    /// rejected.
    pub async fn start(&mut self) -> EngineState {
        match self.store.as_ref().and_then(SessionFile::load) {
            Some(session) => {
                self.session = session;
                /* time since the last refresh is unknown */
                if self.keep_alive().await == EngineState::Active && self.system_info.is_none() {
                    self.fetch_system_info().await;
                }
            }
            None => {
                self.authenticate().await;
            }
        }

        let mut backoff = INITIAL_BACKOFF;
        loop {
            match self.state {
                EngineState::Active => break,
                EngineState::BadLogin => {
                    log::error!("Halting engine to avoid locking the account");
                    return self.state;
                }
                EngineState::Error | EngineState::Starting => {
                    log::debug!("Login failed. Trying again in {} seconds", backoff.as_secs());
                    time::sleep(backoff).await;
                    self.authenticate().await;
                    backoff = backoff.saturating_mul(2);
                }
            }
        }

        self.announce_first_login();
        self.state
    }

    /// Start the engine and keep it polling for the lifetime of the process.
    pub async fn run(mut self) {
        if self.start().await == EngineState::Active {
            self.schedule().await;
        }
    }

    async fn schedule(&mut self) {
        let delay = delay_until_poll_second(Utc::now());
        log::debug!("First scheduled update in {} ms", delay.as_millis());
        time::sleep(delay).await;

        let period = Duration::from_secs(u64::from(self.settings.refresh_minutes) * 60);
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match self.state {
                EngineState::BadLogin => {
                    log::info!("Stopping scheduled updates");
                    break;
                }
                EngineState::Error => {
                    self.authenticate().await;
                }
                EngineState::Active => {
                    self.poll().await;
                }
                EngineState::Starting => {}
            }
        }
    }
}
