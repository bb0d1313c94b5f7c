// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod queue;
pub mod scale;
pub mod status;

// Re-exports
pub use error::DomainError;
pub use job::{
    group_rows, JobId, JobKey, NotificationBatch, PrintJob, PrintJobParameter, FILE_ID_PARAMETER,
};
pub use queue::{Orientation, PrintQueue, QueueName, QueueTable};
pub use scale::{DeviceIdentity, ReportId, ScaleReading, ScaleStatus, WeightUnit};
pub use status::{Health, MonitorMessage, MonitorStatus};
