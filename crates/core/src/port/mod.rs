// Port Layer - Interfaces for external dependencies

pub mod hid_device;
pub mod job_feed;
pub mod printer;
pub mod remote_session;

// Re-exports
pub use hid_device::{DeviceError, HidDevice, HidDeviceInfo, HidEnumerator, HidReport, ReadStatus};
pub use job_feed::{JobFeed, JobSubscription};
pub use printer::{
    MediaOption, PdfPrintRequest, PdfRenderer, PrintError, PrinterCapabilities, RawPrinter,
};
pub use remote_session::{
    BackendError, ContainerValues, FieldValue, RemoteSession, ScreenCommand, SessionConnector,
    SubmitResult,
};
