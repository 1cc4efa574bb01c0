mod account_session;
mod energy_flow;

pub use account_session::AccountSession;
pub use energy_flow::EnergyFlow;

use crate::api::Error;
use crate::model::Snapshot;
use serde_json::Value;

const DEFAULT_RESULT_MESSAGE: &str = "Failed to read result message";
const DEFAULT_REJECTION_MESSAGE: &str = "(no error message received)";

/// Result of submitting the credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Granted(String),
    Rejected(String),
}

impl AccountSession {
    /// Tell a credential rejection apart from a granted session; anything else is a protocol error.
    pub fn outcome(self) -> Result<SessionOutcome, Error> {
        if let Some(error) = self.error {
            return Ok(SessionOutcome::Rejected(rejection_message(&error)));
        }

        self.account
            .and_then(|account| account.login_session_id)
            .filter(|id| !id.is_empty())
            .map(SessionOutcome::Granted)
            .ok_or_else(|| Error::protocol("Failed to generate Login Session ID"))
    }
}

fn rejection_message(error: &Value) -> String {
    let text = |value: &Value| match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    };

    match error {
        Value::Object(_) => ["message", "code"]
            .iter()
            .find_map(|key| error.get(*key).and_then(text)),
        other => text(other),
    }
    .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string())
}

impl EnergyFlow {
    /// Unwrap the sample batch, newest first. `context` prefixes the failure message.
    pub fn into_batch(self, context: &str) -> Result<Vec<Snapshot>, Error> {
        match self.energy_flow_list {
            Some(batch) if batch.is_empty() => Err(Error::protocol(format!(
                "{}. Message: Received an empty energyFlowList",
                context
            ))),
            /* staleness is judged by the timestamp, a sample without one cannot be placed */
            Some(batch) if batch[0].target_date.is_empty() => Err(Error::protocol(format!(
                "{}. Message: Received a sample without targetDate",
                context
            ))),
            Some(batch) => Ok(batch),
            None => Err(Error::protocol(format!(
                "{}. Message: {}",
                context,
                self.result_message
                    .as_deref()
                    .unwrap_or(DEFAULT_RESULT_MESSAGE)
            ))),
        }
    }
}
