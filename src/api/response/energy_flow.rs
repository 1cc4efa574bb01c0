use crate::model::Snapshot;
use serde::Deserialize;

/* Only `resultCode`/`resultMessage` are sent once the session has expired; the code is not used */
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyFlow {
    pub energy_flow_list: Option<Vec<Snapshot>>,
    pub result_message: Option<String>,
}
