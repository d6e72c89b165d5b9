use std::{sync::Arc, time::Duration};

/// A deferred callback, fired once by a [`Scheduler`].
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// A monotonic clock. Time is expressed as the [`Duration`] elapsed since the clock's own
/// epoch (simulation start, runtime start, ...), never as wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current time.
    fn now(&self) -> Duration;
}

/// A clock that can also run callbacks at a later point in time.
///
/// Callbacks scheduled for the same instant must fire in the order they were scheduled.
/// Implementations must not hold any internal lock while a callback runs, so that a
/// callback is free to schedule further callbacks.
pub trait Scheduler: Clock {
    /// Schedules `callback` to run once `delay` has elapsed from [`Clock::now`].
    fn schedule_after(&self, delay: Duration, callback: Callback);
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now(&self) -> Duration {
        (**self).now()
    }
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    #[inline]
    fn schedule_after(&self, delay: Duration, callback: Callback) {
        (**self).schedule_after(delay, callback)
    }
}

/// Returns the given duration in whole microseconds, saturating at [`u64::MAX`].
#[inline]
pub fn as_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Divides `interval` by the square root of `count`. This is the back-off used by
/// CoDel-style control laws to space out successive congestion signals.
///
/// A `count` of zero is treated as one. Results too large for a [`Duration`] saturate.
#[inline]
pub fn inv_sqrt_scale(interval: Duration, count: u32) -> Duration {
    if count <= 1 {
        return interval;
    }

    let secs = interval.as_secs_f64() / f64::from(count).sqrt();
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Size and link constants.
#[allow(non_upper_case_globals)]
pub mod constants {
    /// One kibibyte.
    pub const KiB: u32 = 1024;
    /// One mebibyte.
    pub const MiB: u32 = 1024 * KiB;
    /// One gibibyte.
    pub const GiB: u32 = 1024 * MiB;

    /// Standard Ethernet MTU in bytes.
    pub const MTU_ETHERNET: u32 = 1_500;
}
