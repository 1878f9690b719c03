// Handler constants (no magic values)
use std::time::Duration;

/// Fixed wait between a failed validation and the next acquisition attempt (10s)
///
/// There is no attempt ceiling: a permanently broken resource source retries
/// at this spacing until the handler is destroyed.
pub const RESOURCE_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Serialization key for acquisition jobs; scoped to one handler's scheduler
pub const ACQUISITION_KEY: &str = ".";

/// Default handler label used in logs
pub const DEFAULT_HANDLER_LABEL: &str = "resource";
