// DeviceHub Infrastructure - Backend Adapters
// Implements: SessionConnector, RemoteSession, JobFeed (HTTP)

pub mod endpoint;
pub mod feed;
pub mod push;
pub mod session;

pub use endpoint::Endpoint;
pub use feed::HttpJobFeed;
pub use session::{HttpSession, ScreenConnector};
