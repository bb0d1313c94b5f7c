// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Scale reports weight over its limit")]
    ScaleOverweight,

    #[error("Scale needs attention ({0}): check, calibrate and re-zero the device")]
    ScaleNeedsCalibration(String),

    #[error("Scale report truncated: {0} bytes")]
    TruncatedReport(usize),

    #[error("Scale factor 10^{0} cannot be represented")]
    ScaleFactorOutOfRange(i8),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
