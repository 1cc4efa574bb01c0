use super::{Engine, SESSION_LIFETIME_MINUTES};
use crate::api::{Error, Transport};
use crate::model::{EngineState, Snapshot};

/// The portal always serves this many samples; the mean divides by it unconditionally.
pub const AVERAGING_WINDOW: usize = 6;

/// Overwrite the power fields of the newest sample with the mean over the whole window.
///
/// Duplicated samples are not filtered out, so a slow upstream weighs stale values more.
pub fn average_power(batch: &mut [Snapshot]) -> Result<(), Error> {
    if batch.len() < AVERAGING_WINDOW {
        return Err(Error::protocol(format!(
            "Expected {} samples for averaging, got {}",
            AVERAGING_WINDOW,
            batch.len()
        )));
    }

    let window = &batch[..AVERAGING_WINDOW];
    let mean = |field: fn(&Snapshot) -> f64| {
        window.iter().map(field).sum::<f64>() / AVERAGING_WINDOW as f64
    };
    let grid_power = mean(|s| s.grid_power);
    let load_power = mean(|s| s.load_power);
    let battery_power = mean(|s| s.battery.power);
    let pv_power = mean(|s| s.pv_power);

    let newest = &mut batch[0];
    newest.grid_power = grid_power;
    newest.load_power = load_power;
    newest.battery.power = battery_power;
    newest.pv_power = pv_power;
    Ok(())
}

impl<T: Transport> Engine<T> {
    /// One scheduled cycle. Hands over to the session keeper when the session would otherwise
    /// expire before the next cycle.
    pub async fn poll(&mut self) -> EngineState {
        self.cycles_since_refresh = self.cycles_since_refresh.saturating_add(1);
        let refresh_minutes = self.settings.refresh_minutes;
        log::debug!(
            "Minutes since last refresh: {}",
            self.cycles_since_refresh.saturating_mul(refresh_minutes)
        );

        let next_cycle = self.cycles_since_refresh.saturating_add(1);
        if next_cycle.saturating_mul(refresh_minutes) >= SESSION_LIFETIME_MINUTES {
            log::debug!("Refreshing site to extend session");
            return self.keep_alive().await;
        }

        match self.fetch_update().await {
            Ok(_) => self.set_state(EngineState::Active),
            Err(e) => {
                log::error!("Error during update process: {}", e);
                self.fail(e);
            }
        }
        self.state
    }

    async fn fetch_update(&mut self) -> Result<super::Acceptance, Error> {
        if !self.session.is_usable() {
            return Err(Error::protocol("No usable session material"));
        }

        let batch = self
            .portal
            .energy_flow(&self.session, false)
            .await?
            .into_batch("Failed to read energyflow-info data")?;
        self.accept(batch)
    }
}
