// Backend endpoint: address, credentials and shared HTTP plumbing

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

use devicehub_core::config::BackendConfig;
use devicehub_core::port::BackendError;

/// Deadline for ordinary request/response calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// TCP connect deadline, also applied to the long-lived push stream
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct Endpoint {
    base_url: String,
    login: String,
    password: String,
    company: Option<String>,
}

impl Endpoint {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            login: config.login.clone(),
            password: config.password.clone(),
            company: config.company().map(str::to_string),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    /// User name without the company suffix
    pub fn user(&self) -> &str {
        match self.login.rsplit_once('@') {
            Some((user, _)) => user,
            None => &self.login,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// HTTP Basic credentials (full login, company included)
    pub fn basic_auth(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.login, Some(&self.password))
    }
}

/// Client for one session; the cookie store carries the session cookie
pub fn session_client() -> Result<Client, BackendError> {
    Client::builder()
        .cookie_store(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| BackendError::Unreachable(format!("HTTP client: {}", e)))
}

/// Client without a total deadline, for streamed responses
pub fn streaming_client() -> Result<Client, BackendError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| BackendError::Unreachable(format!("HTTP client: {}", e)))
}

pub fn transport_error(error: reqwest::Error) -> BackendError {
    if error.is_decode() {
        BackendError::Protocol(error.to_string())
    } else {
        BackendError::Unreachable(error.to_string())
    }
}

/// Map non-success responses to errors, keeping the body for diagnostics
pub async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

pub fn status_error(status: StatusCode, body: String) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Authentication(
            if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        ),
        _ => BackendError::Http {
            status: status.as_u16(),
            body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(login: &str) -> Endpoint {
        Endpoint::new(&BackendConfig {
            url: "https://erp.example.com/".to_string(),
            login: login.to_string(),
            password: "pw".to_string(),
        })
    }

    #[test]
    fn test_user_and_company_split() {
        let ep = endpoint("agent@Warehouse");
        assert_eq!(ep.user(), "agent");
        assert_eq!(ep.company(), Some("Warehouse"));

        let ep = endpoint("agent");
        assert_eq!(ep.user(), "agent");
        assert_eq!(ep.company(), None);
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        assert_eq!(
            endpoint("a").url("/entity/auth/login"),
            "https://erp.example.com/entity/auth/login"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            BackendError::Authentication(_)
        ));
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
            BackendError::Http {
                status: 500,
                body: "boom".to_string()
            }
        );
    }
}
