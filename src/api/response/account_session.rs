use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
pub struct Account {
    #[serde(rename = "loginSessionID")]
    pub login_session_id: Option<String>,
}

#[derive(Deserialize)]
pub struct AccountSession {
    pub account: Option<Account>,
    /* Any shape counts as a rejection: an object with `code`/`message`, or a bare string */
    pub error: Option<Value>,
}
