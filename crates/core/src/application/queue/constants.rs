// Queue constants (no magic values)
use std::time::Duration;

/// Default job concurrency: strict single-flight for rate-limited backends
pub const DEFAULT_MAX_CONCURRENT: usize = 1;

/// Interval between status polls (2s)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Maximum poll attempts per job; effective timeout = interval * attempts
/// (150 * 2s = 5 minutes)
pub const DEFAULT_MAX_POLL_ATTEMPTS: usize = 150;

/// Ceiling for the time-based progress estimate when the backend reports
/// nothing; stays visibly below 100 until a terminal status
pub const PROGRESS_ESTIMATE_CAP: u8 = 95;

/// Ceiling for backend-reported progress while still running
pub const PROGRESS_RUNNING_CAP: u8 = 99;
