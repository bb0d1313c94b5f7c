// Monitor - long-running device/backend loop contract

pub mod constants;
mod shutdown;
mod status;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use status::{MonitorEvent, StatusReporter};

use async_trait::async_trait;

use crate::error::Result;

/// A supervised background loop.
///
/// `run` owns the monitor until shutdown is signalled. Implementations must
/// release every session and device handle before returning, whether they
/// return `Ok` or `Err`.
#[async_trait]
pub trait Monitor: Send {
    /// Stable name used to tag status messages
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, status: StatusReporter, shutdown: ShutdownToken) -> Result<()>;
}
