use super::Engine;
use crate::api::{Error, Transport};
use crate::model::EngineState;

impl<T: Transport> Engine<T> {
    /// Re-validate the session and open a fresh polling window without logging in again.
    pub async fn keep_alive(&mut self) -> EngineState {
        match self.extend_session().await {
            Ok(()) => {
                self.cycles_since_refresh = 0;
                self.set_state(EngineState::Active);
            }
            Err(e) => {
                log::error!("Error during refresh process: {}", e);
                self.fail(e);
            }
        }
        self.state
    }

    async fn extend_session(&mut self) -> Result<(), Error> {
        if !self.session.is_usable() {
            return Err(Error::protocol("No usable session material"));
        }

        /* the account e-mail only shows up on the dashboard of an authenticated session */
        let dashboard = self.portal.dashboard(&self.session.cookie).await?;
        if !dashboard.contains(&self.settings.email) {
            return Err(Error::protocol("Unexpected data when loading dashboard"));
        }
        log::debug!("Extended session");

        let batch = self
            .portal
            .energy_flow(&self.session, true)
            .await?
            .into_batch("Failed to open energyflow-info session")?;
        self.accept(batch)?;
        Ok(())
    }
}
