//! Wall-clock statistics of repeated operations.
//!
//! Detectors time every [`detect`] call and the training drivers time sample extraction. The
//! collected [`Laps`] are logged by the callers.
//!
//! [`detect`]: crate::detector::Detector::detect

use std::{
    fmt,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Summary of the durations recorded by a [`Timer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Laps {
    count: u32,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl Laps {
    fn record(&mut self, lap: Duration) {
        if self.count == 0 {
            self.min = lap;
            self.max = lap;
        } else {
            self.min = self.min.min(lap);
            self.max = self.max.max(lap);
        }
        self.count += 1;
        self.total += lap;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Returns the shortest lap, or zero if nothing was recorded.
    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Returns the average lap, or zero if nothing was recorded.
    pub fn mean(&self) -> Duration {
        match self.count {
            0 => Duration::ZERO,
            n => self.total / n,
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Collects the durations of a named, repeatedly executed operation.
///
/// A timer can be shared between threads. Displaying it with `{}` prints the lap count and the
/// mean and maximum duration without resetting anything; use [`Timer::take`] for that.
pub struct Timer {
    name: &'static str,
    laps: Mutex<Laps>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            laps: Mutex::new(Laps::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs `op` and records how long it took.
    pub fn time<T>(&self, op: impl FnOnce() -> T) -> T {
        let _lap = self.start();
        op()
    }

    /// Starts a lap that is recorded when the returned guard is dropped.
    pub fn start(&self) -> Lap<'_> {
        Lap {
            timer: self,
            start: Instant::now(),
        }
    }

    /// Records a lap measured elsewhere.
    pub fn record(&self, lap: Duration) {
        self.lock().record(lap);
    }

    /// Returns the laps recorded so far.
    pub fn laps(&self) -> Laps {
        *self.lock()
    }

    /// Returns the laps recorded so far and starts over.
    pub fn take(&self) -> Laps {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Laps> {
        // `Laps` is updated with plain assignments, so a poisoned lock still holds valid data.
        self.laps.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let laps = self.laps();
        write!(
            f,
            "{}: {}x, mean {:.2}ms, max {:.2}ms",
            self.name,
            laps.count,
            ms(laps.mean()),
            ms(laps.max),
        )
    }
}

/// Clones start without recorded laps.
impl Clone for Timer {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("laps", &self.laps())
            .finish()
    }
}

/// A running measurement, see [`Timer::start`].
pub struct Lap<'a> {
    timer: &'a Timer,
    start: Instant,
}

impl Drop for Lap<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}
