// Remote Session Port
// Authenticated handle to the backend's screen command interface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend errors (session, query and push transport)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("Push subscription closed")]
    SubscriptionClosed,
}

/// Structured command against a named remote screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScreenCommand {
    /// Export/read a field
    Field { object: String, field: String },
    /// Write a value; `commit` forces the screen to process the change immediately
    Value {
        object: String,
        field: String,
        value: String,
        #[serde(default)]
        commit: bool,
    },
    /// Key lookup expression
    Key {
        object: String,
        field: String,
        value: String,
    },
    /// Screen action (Save, Cancel, Delete, ...)
    Action { object: String, action: String },
}

impl ScreenCommand {
    pub fn field(object: &str, field: &str) -> Self {
        ScreenCommand::Field {
            object: object.to_string(),
            field: field.to_string(),
        }
    }

    pub fn value(object: &str, field: &str, value: impl Into<String>) -> Self {
        ScreenCommand::Value {
            object: object.to_string(),
            field: field.to_string(),
            value: value.into(),
            commit: false,
        }
    }

    pub fn committed_value(object: &str, field: &str, value: impl Into<String>) -> Self {
        ScreenCommand::Value {
            object: object.to_string(),
            field: field.to_string(),
            value: value.into(),
            commit: true,
        }
    }

    pub fn key(object: &str, field: &str, value: impl Into<String>) -> Self {
        ScreenCommand::Key {
            object: object.to_string(),
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn action(object: &str, action: &str) -> Self {
        ScreenCommand::Action {
            object: object.to_string(),
            action: action.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerValues {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

/// One result row of a submit call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    #[serde(default)]
    pub containers: Vec<ContainerValues>,
}

impl SubmitResult {
    pub fn field(&self, container: &str, field: &str) -> Option<&str> {
        self.containers
            .iter()
            .find(|c| c.name == container)?
            .fields
            .iter()
            .find(|f| f.field == field)?
            .value
            .as_deref()
    }
}

/// Authenticated backend session
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Export rows of field values from a screen
    async fn export(
        &self,
        screen: &str,
        commands: &[ScreenCommand],
    ) -> Result<Vec<Vec<String>>, BackendError>;

    /// Submit commands to a screen (or report) and return per-row results
    async fn submit(
        &self,
        screen: &str,
        commands: &[ScreenCommand],
    ) -> Result<Vec<SubmitResult>, BackendError>;

    /// Fetch raw bytes from the backend file store
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, BackendError>;

    /// End the session
    async fn logout(&self) -> Result<(), BackendError>;
}

/// Produces authenticated sessions from the configured credentials
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Backend address, for status messages
    fn endpoint(&self) -> &str;

    async fn login(&self) -> Result<Box<dyn RemoteSession>, BackendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// Call recorded by the mock backend
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SessionCall {
        Login,
        Logout,
        Export { screen: String },
        Submit {
            screen: String,
            commands: Vec<ScreenCommand>,
        },
        FetchFile(String),
    }

    #[derive(Default)]
    struct State {
        calls: Vec<SessionCall>,
        failing_logins: Option<usize>,
        exports: HashMap<String, Vec<Vec<String>>>,
        responses: HashMap<String, Vec<SubmitResult>>,
        failing_screens: HashSet<String>,
        files: HashMap<String, Vec<u8>>,
    }

    /// Scriptable in-memory backend session source
    #[derive(Clone, Default)]
    pub struct MockConnector {
        state: Arc<Mutex<State>>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `count` logins
        pub fn fail_logins(&self, count: usize) {
            self.state.lock().unwrap().failing_logins = Some(count);
        }

        /// Fail every login until `fail_logins(0)`
        pub fn fail_all_logins(&self) {
            self.state.lock().unwrap().failing_logins = Some(usize::MAX);
        }

        pub fn set_export(&self, screen: &str, rows: Vec<Vec<String>>) {
            self.state
                .lock()
                .unwrap()
                .exports
                .insert(screen.to_string(), rows);
        }

        pub fn set_response(&self, screen: &str, results: Vec<SubmitResult>) {
            self.state
                .lock()
                .unwrap()
                .responses
                .insert(screen.to_string(), results);
        }

        pub fn fail_screen(&self, screen: &str) {
            self.state
                .lock()
                .unwrap()
                .failing_screens
                .insert(screen.to_string());
        }

        pub fn heal_screen(&self, screen: &str) {
            self.state.lock().unwrap().failing_screens.remove(screen);
        }

        pub fn set_file(&self, file_id: &str, bytes: Vec<u8>) {
            self.state
                .lock()
                .unwrap()
                .files
                .insert(file_id.to_string(), bytes);
        }

        pub fn calls(&self) -> Vec<SessionCall> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn count(&self, predicate: impl Fn(&SessionCall) -> bool) -> usize {
            self.state
                .lock()
                .unwrap()
                .calls
                .iter()
                .filter(|c| predicate(c))
                .count()
        }

        /// Commands submitted to one screen, in call order
        pub fn submissions(&self, screen: &str) -> Vec<Vec<ScreenCommand>> {
            self.state
                .lock()
                .unwrap()
                .calls
                .iter()
                .filter_map(|c| match c {
                    SessionCall::Submit { screen: s, commands } if s == screen => {
                        Some(commands.clone())
                    }
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: SessionCall) {
            self.state.lock().unwrap().calls.push(call);
        }
    }

    #[async_trait]
    impl SessionConnector for MockConnector {
        fn endpoint(&self) -> &str {
            "mock://backend"
        }

        async fn login(&self) -> Result<Box<dyn RemoteSession>, BackendError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(SessionCall::Login);
            if let Some(remaining) = state.failing_logins {
                if remaining > 0 {
                    state.failing_logins = Some(remaining - 1);
                    return Err(BackendError::Unreachable("connection refused".to_string()));
                }
            }
            Ok(Box::new(MockSession {
                connector: self.clone(),
            }))
        }
    }

    pub struct MockSession {
        connector: MockConnector,
    }

    #[async_trait]
    impl RemoteSession for MockSession {
        async fn export(
            &self,
            screen: &str,
            _commands: &[ScreenCommand],
        ) -> Result<Vec<Vec<String>>, BackendError> {
            self.connector.record(SessionCall::Export {
                screen: screen.to_string(),
            });
            let state = self.connector.state.lock().unwrap();
            if state.failing_screens.contains(screen) {
                return Err(BackendError::Protocol(format!("{} failed", screen)));
            }
            Ok(state.exports.get(screen).cloned().unwrap_or_default())
        }

        async fn submit(
            &self,
            screen: &str,
            commands: &[ScreenCommand],
        ) -> Result<Vec<SubmitResult>, BackendError> {
            self.connector.record(SessionCall::Submit {
                screen: screen.to_string(),
                commands: commands.to_vec(),
            });
            let state = self.connector.state.lock().unwrap();
            if state.failing_screens.contains(screen) {
                return Err(BackendError::Protocol(format!("{} failed", screen)));
            }
            Ok(state
                .responses
                .get(screen)
                .cloned()
                .unwrap_or_else(|| vec![SubmitResult::default()]))
        }

        async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, BackendError> {
            self.connector
                .record(SessionCall::FetchFile(file_id.to_string()));
            self.connector
                .state
                .lock()
                .unwrap()
                .files
                .get(file_id)
                .cloned()
                .ok_or(BackendError::Http {
                    status: 404,
                    body: format!("file {} not found", file_id),
                })
        }

        async fn logout(&self) -> Result<(), BackendError> {
            self.connector.record(SessionCall::Logout);
            Ok(())
        }
    }
}
