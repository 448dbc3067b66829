use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Drops frames that arrive sooner than `1 / max_fps` after the last
/// accepted one.
pub struct FrameThrottle {
    min_interval: Option<Duration>,
    last_accepted: Mutex<Option<Instant>>,
}

impl FrameThrottle {
    pub fn new(max_frames_per_second: Option<f64>) -> Self {
        Self {
            min_interval: max_frames_per_second.map(|fps| Duration::from_secs_f64(1.0 / fps)),
            last_accepted: Mutex::new(None),
        }
    }

    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> bool {
        let Some(interval) = self.min_interval else {
            return true;
        };
        let Ok(mut last) = self.last_accepted.lock() else {
            return true;
        };
        match *last {
            Some(previous) if now.saturating_duration_since(previous) < interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// Counts calls currently inside the pipeline and refuses entry past a limit.
pub struct InFlightLimit {
    max: usize,
    current: AtomicUsize,
}

/// Releases its slot in the [`InFlightLimit`] on drop.
pub struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl InFlightLimit {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            current: AtomicUsize::new(0),
        }
    }

    pub fn try_enter(&self) -> Option<InFlightGuard<'_>> {
        self.current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max).then_some(n + 1)
            })
            .ok()
            .map(|_| InFlightGuard {
                counter: &self.current,
            })
    }

    pub fn in_flight(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}
