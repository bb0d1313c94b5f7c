// DeviceHub Infrastructure - Local Device Adapters
// Implements: RawPrinter, PdfRenderer (CUPS), HidEnumerator (hidraw)

pub mod cups;
#[cfg(target_os = "linux")]
pub mod hidraw;
#[cfg(not(target_os = "linux"))]
pub mod unsupported;

pub use cups::CupsSpooler;
#[cfg(target_os = "linux")]
pub use hidraw::HidrawEnumerator as PlatformHidEnumerator;
#[cfg(not(target_os = "linux"))]
pub use unsupported::UnsupportedHid as PlatformHidEnumerator;
