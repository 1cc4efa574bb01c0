//! Scripted in-memory transport for exercising the engine without a network.

use super::{Error, PortalRequest, PortalResponse, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<PortalResponse, Error>>>>,
    requests: Arc<Mutex<Vec<PortalRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        ScriptedTransport::default()
    }

    pub fn respond(&self, response: Result<PortalResponse, Error>) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn body(&self, body: &str) -> &Self {
        self.respond(Ok(PortalResponse {
            set_cookie: None,
            body: body.to_owned(),
        }))
    }

    pub fn redirect(&self, set_cookie: Option<&str>) -> &Self {
        self.respond(Ok(PortalResponse {
            set_cookie: set_cookie.map(str::to_owned),
            body: String::new(),
        }))
    }

    pub fn requests(&self) -> Vec<PortalRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn header(&self, call: usize, name: &str) -> Option<String> {
        self.requests()
            .get(call)?
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: PortalRequest) -> Result<PortalResponse, Error> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("no scripted response left".into())))
    }
}
