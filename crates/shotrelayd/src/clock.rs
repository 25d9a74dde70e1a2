//! Time source shared by the registry, pending table, and sweeper.

use time::OffsetDateTime;

/// Supplies the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;

#[cfg(test)]
mod manual {
    use std::sync::Mutex;
    use std::time::Duration;

    use time::OffsetDateTime;

    use super::Clock;

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub(crate) struct ManualClock {
        now: Mutex<OffsetDateTime>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                now: Mutex::new(OffsetDateTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            }
        }

        pub(crate) fn advance(&self, step: Duration) {
            let mut now = self.now.lock().unwrap_or_else(|poison| poison.into_inner());
            *now += step;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.now.lock().unwrap_or_else(|poison| poison.into_inner())
        }
    }
}
