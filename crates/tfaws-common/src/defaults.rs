//! Default timing and retry values shared by the sweeper and token retryers

use std::time::Duration;

/// How long a sweeper keeps retrying a throttled delete (10 minutes)
pub const SWEEP_THROTTLING_RETRY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How long a change-token operation keeps retrying stale tokens (15 minutes)
pub const CHANGE_TOKEN_RETRY_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Default assume-role session length in seconds
pub const DEFAULT_ASSUME_ROLE_DURATION_SECS: u64 = 3600;

/// Default SDK-level retries for sweeper clients
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// First wait between polls when no poll interval is configured
pub const INITIAL_POLL_DELAY: Duration = Duration::from_millis(100);

/// Cap on the exponential wait between polls
pub const MAX_POLL_DELAY: Duration = Duration::from_secs(10);
