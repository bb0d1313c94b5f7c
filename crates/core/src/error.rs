// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Backend error: {0}")]
    Backend(#[from] crate::port::BackendError),

    #[error("Print error: {0}")]
    Print(#[from] crate::port::PrintError),

    #[error("Device error: {0}")]
    Device(#[from] crate::port::DeviceError),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
