use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

type Watts = f64;
type Percent = f64;

/// Everything the engine needs from the configuration layer.
#[derive(Clone)]
pub struct EngineSettings {
    pub email: String,
    pub password: String,
    pub refresh_minutes: u32,
    pub language: String,
    pub user_agent: String,
    /// Report the newest sample as-is instead of the mean of the batch.
    pub latest_data_for_power: bool,
}

impl fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSettings")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("refresh_minutes", &self.refresh_minutes)
            .field("language", &self.language)
            .field("user_agent", &self.user_agent)
            .field("latest_data_for_power", &self.latest_data_for_power)
            .finish()
    }
}

/// Cookie plus the two resource ids that together authorize telemetry requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMaterial {
    #[serde(rename = "Cookie", default)]
    pub cookie: String,
    #[serde(default)]
    pub system_id: String,
    #[serde(default)]
    pub ess_id: String,
}

impl SessionMaterial {
    pub fn new(cookie: String, system_id: String, ess_id: String) -> Self {
        SessionMaterial {
            cookie,
            system_id,
            ess_id,
        }
    }

    /// A partially populated session is never usable.
    pub fn is_usable(&self) -> bool {
        !self.cookie.is_empty() && !self.system_id.is_empty() && !self.ess_id.is_empty()
    }
}

/// Engine health. The numeric order is part of the contract: anything below `Active` is "not ready".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive, ToPrimitive, Serialize,
)]
pub enum EngineState {
    /// Credentials were rejected. No further connection attempts are made.
    BadLogin = -1,
    Starting = 0,
    /// Recoverable by re-authentication.
    Error = 1,
    /// The last data exchange succeeded.
    Active = 2,
}

impl EngineState {
    pub fn is_ready(self) -> bool {
        self >= EngineState::Active
    }

    pub fn code(self) -> i64 {
        num::ToPrimitive::to_i64(&self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize)]
pub enum BatteryStatus {
    Standby = 0,
    Charging = 1,
    Discharging = 2,
    Unknown = 255,
}

impl Default for BatteryStatus {
    fn default() -> Self {
        BatteryStatus::Standby
    }
}

impl<'de> Deserialize<'de> for BatteryStatus {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;

        Ok(match value.as_u64() {
            Some(v) => num::FromPrimitive::from_u64(v).unwrap_or(BatteryStatus::Unknown),
            /* the portal sends null while the battery is offline */
            None => BatteryStatus::Unknown,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Battery {
    pub soc: Percent,
    pub n_status: BatteryStatus,
    pub power: Watts,
    pub status: Option<String>,
    pub str_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Flow {
    pub direct_consumption: bool,
    pub battery_charging: bool,
    pub grid_sell_pv: bool,
    pub battery_discharging: bool,
    pub grid_sell_discharging: bool,
    pub grid_buy: bool,
    pub charging_from_grid: bool,
}

impl Flow {
    pub fn flags(&self) -> [(&'static str, bool); 7] {
        [
            ("direct_consumption", self.direct_consumption),
            ("battery_charging", self.battery_charging),
            ("grid_sell_pv", self.grid_sell_pv),
            ("battery_discharging", self.battery_discharging),
            ("grid_sell_discharging", self.grid_sell_discharging),
            ("grid_buy", self.grid_buy),
            ("charging_from_grid", self.charging_from_grid),
        ]
    }
}

/// One record of the energy flow batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub system_id: Option<i64>,
    pub ess_id: Option<i64>,
    pub target_date: String,
    pub time_min: Option<String>,
    pub pv_power: Watts,
    pub load_power: Watts,
    pub grid_power: Watts,
    pub battery: Battery,
    pub flow: Flow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub system_name: String,
    pub system_serial: String,
    pub pms_sw: String,
    pub pms_hw: String,
    pub pcs_sw: String,
    pub pcs_hw: String,
}
