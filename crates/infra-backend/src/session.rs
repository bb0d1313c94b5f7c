// Screen-API session over HTTP
// Login yields a cookie-carrying client; every call reuses that cookie.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use devicehub_core::port::{
    BackendError, RemoteSession, ScreenCommand, SessionConnector, SubmitResult,
};

use crate::endpoint::{check_status, session_client, transport_error, Endpoint, REQUEST_TIMEOUT};

const LOGIN_PATH: &str = "entity/auth/login";
const LOGOUT_PATH: &str = "entity/auth/logout";
const FILES_PATH: &str = "entity/Default/6.00.001/files";

#[derive(Serialize)]
struct LoginRequest<'a> {
    name: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<&'a str>,
}

#[derive(Serialize)]
struct ScreenRequest<'a> {
    commands: &'a [ScreenCommand],
}

#[derive(Deserialize)]
struct ExportResponse {
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    results: Vec<SubmitResult>,
}

/// Logs in against the backend's screen API
pub struct ScreenConnector {
    endpoint: Endpoint,
}

impl ScreenConnector {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl SessionConnector for ScreenConnector {
    fn endpoint(&self) -> &str {
        self.endpoint.base_url()
    }

    async fn login(&self) -> Result<Box<dyn RemoteSession>, BackendError> {
        let http = session_client()?;
        let body = LoginRequest {
            name: self.endpoint.user(),
            password: self.endpoint.password(),
            company: self.endpoint.company(),
        };
        let response = http
            .post(self.endpoint.url(LOGIN_PATH))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;

        info!(backend = %self.endpoint.base_url(), user = %self.endpoint.user(), "Logged in");
        Ok(Box::new(HttpSession {
            endpoint: self.endpoint.clone(),
            http,
        }))
    }
}

/// Authenticated session; dropping it without `logout` leaves the server
/// session to expire on its own
pub struct HttpSession {
    endpoint: Endpoint,
    http: Client,
}

impl HttpSession {
    async fn post_screen(
        &self,
        screen: &str,
        operation: &str,
        commands: &[ScreenCommand],
    ) -> Result<reqwest::Response, BackendError> {
        debug!(screen, operation, commands = commands.len(), "Screen call");
        let response = self
            .http
            .post(self.endpoint.url(&format!("screen/{}/{}", screen, operation)))
            .timeout(REQUEST_TIMEOUT)
            .json(&ScreenRequest { commands })
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await
    }
}

#[async_trait]
impl RemoteSession for HttpSession {
    async fn export(
        &self,
        screen: &str,
        commands: &[ScreenCommand],
    ) -> Result<Vec<Vec<String>>, BackendError> {
        let response = self.post_screen(screen, "export", commands).await?;
        let parsed: ExportResponse = response.json().await.map_err(transport_error)?;
        Ok(parsed.rows)
    }

    async fn submit(
        &self,
        screen: &str,
        commands: &[ScreenCommand],
    ) -> Result<Vec<SubmitResult>, BackendError> {
        let response = self.post_screen(screen, "submit", commands).await?;
        let parsed: SubmitResponse = response.json().await.map_err(transport_error)?;
        Ok(parsed.results)
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .http
            .get(self.endpoint.url(&format!("{}/{}", FILES_PATH, file_id)))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;
        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(transport_error)?;
        debug!(file_id, bytes = bytes.len(), "Fetched file");
        Ok(bytes.to_vec())
    }

    async fn logout(&self) -> Result<(), BackendError> {
        let response = self
            .http
            .post(self.endpoint.url(LOGOUT_PATH))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}
