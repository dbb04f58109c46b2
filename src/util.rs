use std::time::{SystemTime, UNIX_EPOCH};

/// Gets the current Unix timestamp, in seconds.
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("current time should always be after the Unix epoch")
        .as_secs()
}
