pub mod endpoint;
pub mod error;
pub mod response;
#[cfg(test)]
pub(crate) mod mock;

use crate::extract::LoginToken;
use crate::model::SessionMaterial;
pub use error::Error;
use http::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use http::Method;
use response::{AccountSession, EnergyFlow};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha512};
use std::time::Duration;

const APPLICATION_KEY: &str = "6V1V8H2BN5P9ZQGOI5DAQ92YZBDO3EK9";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ACCEPT_DOCUMENT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_FRAGMENT: &str = "text/html, */*; q=0.01";
const ACCEPT_XHR_JSON: &str = "application/json, text/javascript, */*; q=0.01";

#[derive(Debug, Clone)]
pub struct PortalRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone)]
pub struct PortalResponse {
    /// All `Set-Cookie` values, joined with ", ".
    pub set_cookie: Option<String>,
    pub body: String,
}

/// One HTTP exchange with the portal.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PortalRequest) -> Result<PortalResponse, Error>;
}

/// reqwest-backed transport. Redirects are followed unless a request opts out.
pub struct HttpTransport {
    follow: reqwest::Client,
    manual: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, Error> {
        let build = |policy: reqwest::redirect::Policy| {
            reqwest::ClientBuilder::new()
                .redirect(policy)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| Error::Transport(format!("Unable to build HTTP client: {}", e)))
        };

        Ok(HttpTransport {
            follow: build(reqwest::redirect::Policy::default())?,
            manual: build(reqwest::redirect::Policy::none())?,
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: PortalRequest) -> Result<PortalResponse, Error> {
        let client = if request.follow_redirects {
            &self.follow
        } else {
            &self.manual
        };

        let builder = client
            .request(request.method, request.url.as_str())
            .headers(request.headers);
        let builder = match request.body {
            Some(body) => builder.body(body),
            None => builder,
        };

        let response = builder.send().await.map_err(error::map_transport_err)?;
        let status = response.status();
        let set_cookie = join_set_cookie(response.headers());
        let body = response.text().await.map_err(|e| {
            Error::Transport(format!("Error reading portal response: {}", e))
        })?;

        log::trace!("url: {}, status: {}, body: {}", request.url, status, body);

        Ok(PortalResponse {
            set_cookie,
            body,
        })
    }
}

fn join_set_cookie(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// Percent-encode everything but unreserved characters.
pub fn encode_uri_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// The session id delimiters end up encoded twice in the login URL.
pub fn encode_session_id(session_id: &str) -> String {
    encode_uri_component(&encode_uri_component(session_id))
}

pub fn password_hash(password: &str) -> String {
    hex::encode(Sha512::digest(password.as_bytes()))
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), Error> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| Error::protocol(format!("Invalid value for header {}", name)))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str::<T>(body)
        .map_err(|e| Error::protocol(format!("Invalid JSON from portal: {}", e)))
}

/// Request builders for every portal exchange the engine needs.
pub struct Portal<T> {
    transport: T,
    language: String,
    user_agent: String,
}

impl<T: Transport> Portal<T> {
    pub fn new(transport: T, language: String, user_agent: String) -> Self {
        Portal {
            transport,
            language,
            user_agent,
        }
    }

    fn accept_language(&self) -> String {
        let primary = self.language.get(..2).unwrap_or(&self.language);
        format!("{},{};q=0.9", self.language, primary)
    }

    fn country(&self) -> &str {
        let start = self.language.len().saturating_sub(2);
        self.language.get(start..).unwrap_or(&self.language)
    }

    fn headers(&self, accept: &'static str, cookie: Option<&str>) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "accept", accept)?;
        insert(&mut headers, "accept-language", &self.accept_language())?;
        insert(&mut headers, "user-agent", &self.user_agent)?;
        if let Some(cookie) = cookie {
            insert(&mut headers, "cookie", cookie)?;
        }
        Ok(headers)
    }

    async fn get(&self, url: String, headers: HeaderMap) -> Result<PortalResponse, Error> {
        log::debug!("GET {}", url);
        self.transport
            .send(PortalRequest {
                method: Method::GET,
                url,
                headers,
                body: None,
                follow_redirects: true,
            })
            .await
    }

    async fn post_form(
        &self,
        url: String,
        headers: HeaderMap,
        body: String,
    ) -> Result<PortalResponse, Error> {
        log::debug!("POST {}", url);
        self.transport
            .send(PortalRequest {
                method: Method::POST,
                url,
                headers,
                body: Some(body),
                follow_redirects: true,
            })
            .await
    }

    pub async fn sign_in_page(&self) -> Result<String, Error> {
        let headers = self.headers(ACCEPT_DOCUMENT, None)?;
        Ok(self.get(endpoint::SIGN_IN.to_owned(), headers).await?.body)
    }

    pub async fn create_session(
        &self,
        email: &str,
        password: &str,
        token: &LoginToken,
    ) -> Result<AccountSession, Error> {
        let mut headers = self.headers("application/json", None)?;
        insert(&mut headers, "content-type", "application/x-www-form-urlencoded;charset=UTF-8")?;
        insert(&mut headers, "referer", endpoint::ACCOUNT_REFERRER)?;
        insert(&mut headers, "x-application-key", APPLICATION_KEY)?;
        insert(&mut headers, "x-device-country", self.country())?;
        insert(&mut headers, "x-device-language", &self.language)?;
        insert(&mut headers, "x-device-language-type", "IETF")?;
        insert(&mut headers, "x-device-platform", "PC")?;
        insert(&mut headers, "x-device-publish-flag", "Y")?;
        insert(&mut headers, "x-device-type", "P01")?;
        insert(&mut headers, "x-lge-svccode", "SVC709")?;
        insert(&mut headers, "x-signature", &token.signature)?;
        insert(&mut headers, "x-timestamp", &token.timestamp)?;
        insert(&mut headers, "x-user-agent", &self.user_agent)?;

        let url = format!("{}{}", endpoint::ACCOUNT_SESSION, encode_uri_component(email));
        let body = format!(
            "user_auth2={}&svc_list=SVC951&itg_user_type=A&inactive_policy=Y&cnct_regn=",
            password_hash(password)
        );

        parse_json(&self.post_form(url, headers, body).await?.body)
    }

    /// Trade the login session id for portal cookies. The cookie only exists on the redirect
    /// response itself, so redirects must not be followed here.
    pub async fn exchange_session(&self, session_id: &str) -> Result<Option<String>, Error> {
        let mut headers = self.headers(ACCEPT_DOCUMENT, None)?;
        insert(&mut headers, "referer", endpoint::ACCOUNT_REFERRER)?;
        insert(&mut headers, "sec-fetch-dest", "document")?;
        insert(&mut headers, "sec-fetch-mode", "navigate")?;
        insert(&mut headers, "sec-fetch-site", "cross-site")?;

        let url = format!("{}{}", endpoint::LOGIN, encode_session_id(session_id));
        log::debug!("GET {} (no redirects)", url);
        let response = self
            .transport
            .send(PortalRequest {
                method: Method::GET,
                url,
                headers,
                body: None,
                follow_redirects: false,
            })
            .await?;

        Ok(response.set_cookie)
    }

    pub async fn dashboard(&self, cookie: &str) -> Result<String, Error> {
        let mut headers = self.headers(ACCEPT_DOCUMENT, Some(cookie))?;
        insert(&mut headers, "referer", endpoint::ACCOUNT_REFERRER)?;
        Ok(self.get(endpoint::DASHBOARD.to_owned(), headers).await?.body)
    }

    pub async fn system_dashboard(
        &self,
        cookie: &str,
        system_id: &str,
        day: chrono::NaiveDate,
    ) -> Result<String, Error> {
        let mut headers = self.headers(ACCEPT_FRAGMENT, Some(cookie))?;
        insert(&mut headers, "referer", endpoint::DASHBOARD)?;
        insert(&mut headers, "x-requested-with", "XMLHttpRequest")?;
        let url = endpoint::system_dashboard(system_id, day);
        Ok(self.get(url, headers).await?.body)
    }

    pub async fn system_info_page(&self, cookie: &str, system_id: &str) -> Result<String, Error> {
        let mut headers = self.headers(ACCEPT_FRAGMENT, Some(cookie))?;
        insert(&mut headers, "referer", endpoint::SYSTEM_INFO_PAGE)?;
        insert(&mut headers, "x-requested-with", "XMLHttpRequest")?;
        Ok(self.get(endpoint::system_info(system_id), headers).await?.body)
    }

    /// Fetch the latest batch of telemetry. `start_poll` opens a fresh polling window.
    pub async fn energy_flow(
        &self,
        session: &SessionMaterial,
        start_poll: bool,
    ) -> Result<EnergyFlow, Error> {
        let mut headers = self.headers(ACCEPT_XHR_JSON, Some(&session.cookie))?;
        insert(&mut headers, "content-type", "application/x-www-form-urlencoded; charset=UTF-8")?;
        insert(&mut headers, "origin", endpoint::PORTAL)?;
        insert(&mut headers, "referer", endpoint::DASHBOARD)?;
        insert(&mut headers, "sec-fetch-site", "same-origin")?;
        insert(&mut headers, "sec-fetch-mode", "cors")?;
        insert(&mut headers, "sec-fetch-dest", "empty")?;
        if start_poll {
            insert(&mut headers, "start_poll", "Y")?;
        }

        let body = format!(
            "system_id={}&ess_id={}",
            encode_uri_component(&session.system_id),
            encode_uri_component(&session.ess_id)
        );

        parse_json(&self.post_form(endpoint::ENERGY_FLOW.to_owned(), headers, body).await?.body)
    }
}
