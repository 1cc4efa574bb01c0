use chrono::NaiveDate;

pub type Endpoint = str;

pub const SIGN_IN: &Endpoint = "https://de.lgaccount.com/login/sign_in";
pub const ACCOUNT_SESSION: &Endpoint =
    "https://de.emp.lgsmartplatform.com/emp/v2.0/account/session/";
pub const ACCOUNT_REFERRER: &Endpoint = "https://de.lgaccount.com/";

pub const PORTAL: &Endpoint = "https://enervu.lg-ess.com";
pub const LOGIN: &Endpoint = "https://enervu.lg-ess.com/v2/homeowner/account/login?sid=";
pub const DASHBOARD: &Endpoint = "https://enervu.lg-ess.com/v2/homeowner/main.do?page=dashboard";
pub const SYSTEM_INFO_PAGE: &Endpoint =
    "https://enervu.lg-ess.com/v2/homeowner/main.do?page=systemInfo";
pub const ENERGY_FLOW: &Endpoint =
    "https://enervu.lg-ess.com/v2/homeowner/systems/ess/energyflow-info";

const SYSTEMS: &Endpoint = "https://enervu.lg-ess.com/v2/homeowner/systems/";

/// Per-system dashboard fragment for the given local calendar day.
pub fn system_dashboard(system_id: &str, day: NaiveDate) -> String {
    format!("{}{}/dashboard.do?today={}", SYSTEMS, system_id, day.format("%Y%m%d"))
}

pub fn system_info(system_id: &str) -> String {
    format!("{}{}/system-info.do", SYSTEMS, system_id)
}
