//! ### English
//! Monotonic time source used for pacing deadlines and fps samples.
//!
//! ### 中文
//! 用于节奏 deadline 与 fps 采样的单调时间源。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// ### English
/// Wall-clock backed by `Instant::now()`.
///
/// ### 中文
/// 基于 `Instant::now()` 的系统时钟。
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// ### English
/// Clock that only moves when told to. Lets hosts and tests drive pacing deterministically.
///
/// ### 中文
/// 只在显式推进时前进的时钟，便于宿主和测试确定性地驱动节奏。
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::AcqRel);
    }

    /// ### English
    /// Time elapsed since the clock was created.
    ///
    /// ### 中文
    /// 自时钟创建以来经过的时间。
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::Acquire))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_on_advance() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_millis(33));
        assert_eq!(clock.now() - start, Duration::from_millis(33));
        assert_eq!(clock.elapsed(), Duration::from_millis(33));
    }
}
