pub mod api;
pub mod engine;
pub mod extract;
pub mod model;
pub mod session_store;

pub use api::{Error, HttpTransport, Transport};
pub use engine::{Engine, Event, Status};
pub use model::{EngineSettings, EngineState, SessionMaterial, Snapshot, SystemInfo};
pub use session_store::SessionFile;
