#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use enervu_rs::model::{Snapshot, SystemInfo};
use enervu_rs::{Engine, Error, Event, HttpTransport, SessionFile, Status};
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

mod metrics;
mod settings;

/// Structure containing state for API handlers.
pub struct StateData {
    status: watch::Receiver<Status>,
}

impl StateData {
    fn status(&self) -> Status {
        self.status.borrow().clone()
    }
}

#[get("/status")]
fn status_route(state: &State<StateData>) -> Json<Status> {
    Json(state.status())
}

#[get("/snapshot")]
fn snapshot_route(state: &State<StateData>) -> Result<Json<Snapshot>, Error> {
    let status = state.status();
    if !status.state.is_ready() {
        return Err(Error::Unavailable(format!(
            "Engine is not active ({:?})",
            status.state
        )));
    }
    status
        .snapshot
        .map(Json)
        .ok_or_else(|| Error::Unavailable("No data received yet".into()))
}

#[get("/system-info")]
fn system_info_route(state: &State<StateData>) -> Result<Json<SystemInfo>, Error> {
    state
        .status()
        .system_info
        .map(Json)
        .ok_or_else(|| Error::Unavailable("System info is not known yet".into()))
}

#[get("/metrics")]
fn metrics_route(state: &State<StateData>) -> Result<String, Error> {
    metrics::record(&state.status());
    metrics::read()
}

/// Log engine events and count accepted snapshots until the engine goes away.
async fn listen(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(Event::FirstLogin) => log::info!("Engine is active, serving portal data"),
            Ok(Event::DataUpdated) => metrics::count_update(),
            Err(RecvError::Lagged(missed)) => log::warn!("Missed {} engine events", missed),
            Err(RecvError::Closed) => break,
        }
    }
}

fn build(status: watch::Receiver<Status>) -> Rocket<Build> {
    rocket::build().manage(StateData { status }).mount(
        "/",
        routes![status_route, snapshot_route, system_info_route, metrics_route],
    )
}

#[launch]
async fn rocket() -> Rocket<Build> {
    env_logger::init();

    let settings = match settings::read_settings() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    let transport = match HttpTransport::new() {
        Ok(transport) => transport,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let engine = Engine::new(transport, settings.engine_settings())
        .with_session_file(SessionFile::new(&settings.session_file));
    let status = engine.watch();
    tokio::spawn(listen(engine.subscribe()));
    tokio::spawn(engine.run());

    build(status)
}
