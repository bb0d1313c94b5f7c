// Application Layer - Monitors and their supervision

pub mod monitor;
pub mod print_jobs;
pub mod scale;
pub mod screens;
pub mod supervisor;

// Re-exports
pub use monitor::{
    shutdown_channel, Monitor, MonitorEvent, ShutdownSender, ShutdownToken, StatusReporter,
};
pub use print_jobs::{JobRouter, PrintJobMonitor, PRINT_MONITOR_NAME};
pub use scale::{read_weight, ScaleMonitor, SCALE_MONITOR_NAME};
pub use supervisor::MonitorSupervisor;
