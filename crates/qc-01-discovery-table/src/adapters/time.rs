use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::Timestamp;
use crate::ports::TimeSource;

/// Production time source using the system clock.
///
/// For testing, use `ControllableTimeSource` from the test utilities.
///
/// # Example
///
/// ```rust
/// use qc_01_discovery_table::adapters::SystemTimeSource;
/// use qc_01_discovery_table::ports::TimeSource;
///
/// let time_source = SystemTimeSource::new();
/// assert!(time_source.now().as_secs() > 0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        Timestamp::new(duration.as_secs())
    }
}
