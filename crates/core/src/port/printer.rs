// Printer Port
// Raw pass-through and rendered PDF output to local printers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Orientation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrintError {
    #[error("Printer not found: {0}")]
    PrinterNotFound(String),

    #[error("Spooler rejected job: {0}")]
    Spooler(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Paper size or paper source supported by a printer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaOption {
    /// Identifier passed back to the spooler
    pub id: String,
    pub name: String,
}

impl MediaOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterCapabilities {
    pub paper_sizes: Vec<MediaOption>,
    pub paper_sources: Vec<MediaOption>,
}

impl PrinterCapabilities {
    pub fn paper_size(&self, id: &str) -> Option<&MediaOption> {
        self.paper_sizes.iter().find(|m| m.id == id)
    }

    pub fn paper_source(&self, id: &str) -> Option<&MediaOption> {
        self.paper_sources.iter().find(|m| m.id == id)
    }
}

/// Rendering settings for one PDF job; `None` media means printer default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfPrintRequest {
    pub printer: String,
    pub document_name: String,
    pub paper_size: Option<String>,
    pub paper_source: Option<String>,
    pub orientation: Orientation,
}

impl PdfPrintRequest {
    pub fn new(printer: &str, document_name: &str, orientation: Orientation) -> Self {
        Self {
            printer: printer.to_string(),
            document_name: document_name.to_string(),
            paper_size: None,
            paper_source: None,
            orientation,
        }
    }
}

/// Byte-exact pass-through to a printer
#[async_trait]
pub trait RawPrinter: Send + Sync {
    async fn send_raw(
        &self,
        printer: &str,
        document_name: &str,
        data: &[u8],
    ) -> Result<(), PrintError>;
}

/// PDF rendering and printing
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn capabilities(&self, printer: &str) -> Result<PrinterCapabilities, PrintError>;

    async fn print_pdf(&self, request: &PdfPrintRequest, data: &[u8]) -> Result<(), PrintError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum PrintCall {
        Raw {
            printer: String,
            document_name: String,
            data: Vec<u8>,
        },
        Pdf {
            request: PdfPrintRequest,
            data: Vec<u8>,
        },
    }

    #[derive(Default)]
    struct State {
        calls: Vec<PrintCall>,
        capabilities: PrinterCapabilities,
        failing: bool,
        ack_delay: Option<Duration>,
    }

    /// Records every job instead of printing it
    #[derive(Clone, Default)]
    pub struct MockPrinter {
        state: Arc<Mutex<State>>,
    }

    impl MockPrinter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_capabilities(capabilities: PrinterCapabilities) -> Self {
            let printer = Self::default();
            printer.state.lock().unwrap().capabilities = capabilities;
            printer
        }

        pub fn set_failing(&self, failing: bool) {
            self.state.lock().unwrap().failing = failing;
        }

        /// Hold every job this long after it reaches the spooler
        pub fn set_ack_delay(&self, delay: Duration) {
            self.state.lock().unwrap().ack_delay = Some(delay);
        }

        pub fn calls(&self) -> Vec<PrintCall> {
            self.state.lock().unwrap().calls.clone()
        }

        async fn record(&self, call: PrintCall) -> Result<(), PrintError> {
            let ack_delay = {
                let mut state = self.state.lock().unwrap();
                if state.failing {
                    return Err(PrintError::Spooler("printer offline".to_string()));
                }
                state.calls.push(call);
                state.ack_delay
            };
            if let Some(delay) = ack_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RawPrinter for MockPrinter {
        async fn send_raw(
            &self,
            printer: &str,
            document_name: &str,
            data: &[u8],
        ) -> Result<(), PrintError> {
            self.record(PrintCall::Raw {
                printer: printer.to_string(),
                document_name: document_name.to_string(),
                data: data.to_vec(),
            })
            .await
        }
    }

    #[async_trait]
    impl PdfRenderer for MockPrinter {
        async fn capabilities(&self, _printer: &str) -> Result<PrinterCapabilities, PrintError> {
            Ok(self.state.lock().unwrap().capabilities.clone())
        }

        async fn print_pdf(
            &self,
            request: &PdfPrintRequest,
            data: &[u8],
        ) -> Result<(), PrintError> {
            self.record(PrintCall::Pdf {
                request: request.clone(),
                data: data.to_vec(),
            })
            .await
        }
    }
}
