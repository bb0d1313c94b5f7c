// Monitor constants (no magic values)
use std::time::Duration;

/// Push topic carrying print job inserts/deletes
pub const PRINT_JOBS_TOPIC: &str = "PrintJobs";

/// Poll interval while waiting for an opened scale to report connected
pub const CONNECTION_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Connection polls before an opened scale is treated as failed (~5s)
pub const CONNECTION_RETRY_LIMIT: u32 = 20;

/// Timeout of a single scale report read
pub const REPORT_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Capacity of the supervisor's status fan-out
pub const STATUS_BROADCAST_CAPACITY: usize = 256;
