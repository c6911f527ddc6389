//! ### English
//! Producer-side frame budget.
//!
//! The pool allocates up to `max_allocated` frames and afterwards only reuses them: first from
//! frames the producer handed back locally, then from the pump's recycled channel. Memory stays
//! bounded by the budget regardless of the channel capacity.
//!
//! ### 中文
//! 生产者侧的帧预算。
//!
//! 帧池最多分配 `max_allocated` 个帧，之后只复用：先复用生产者本地交还的帧，再从帧泵的回收通道取回。
//! 内存上限由预算决定，与通道容量无关。

use std::collections::VecDeque;

use crate::engine::config::PoolConfig;
use crate::engine::error::{Cancelled, ConfigError, FrameError};
use crate::engine::frame::{FrameSize, FrameSlot};
use crate::engine::pump::FramePump;

pub struct FramePool {
    pump: FramePump,
    config: PoolConfig,
    /// ### English
    /// Frames currently alive (held by the producer, the pump, or `returned`).
    ///
    /// ### 中文
    /// 当前存活的帧数量（由生产者、帧泵或 `returned` 持有）。
    allocated: usize,
    returned: VecDeque<FrameSlot>,
}

impl FramePool {
    pub fn new(pump: FramePump, config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            pump,
            config,
            allocated: 0,
            returned: VecDeque::new(),
        })
    }

    #[inline]
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    #[inline]
    pub fn pump(&self) -> &FramePump {
        &self.pump
    }

    /// ### English
    /// Returns a frame of `size`, allocating while under budget and reclaiming otherwise.
    ///
    /// Waits for the render path to recycle a frame when the budget is spent; returns
    /// `FrameError::Cancelled` once the pump is cancelled. A reclaimed frame of the wrong size is
    /// released and the request retried.
    ///
    /// ### 中文
    /// 返回一个 `size` 大小的帧：预算内直接分配，否则回收复用。
    ///
    /// 预算用尽时等待渲染路径回收帧；帧泵被取消后返回 `FrameError::Cancelled`。
    /// 回收到尺寸不符的帧会被释放并重试。
    pub fn request(&mut self, size: FrameSize) -> Result<FrameSlot, FrameError> {
        loop {
            if self.allocated < self.config.max_allocated {
                if self.pump.is_cancelled() {
                    return Err(Cancelled.into());
                }
                let frame = FrameSlot::allocate(size, self.config.format)?;
                self.allocated += 1;
                tracing::trace!(%size, allocated = self.allocated, "allocated frame");
                return Ok(frame);
            }

            let frame = self.reclaim()?;
            if frame.matches(size, self.config.format) {
                return Ok(frame);
            }
            tracing::debug!(have = %frame.size(), want = %size, "releasing frame of stale size");
            self.release(frame);
        }
    }

    fn reclaim(&mut self) -> Result<FrameSlot, FrameError> {
        if let Some(frame) = self.returned.pop_front() {
            return Ok(frame);
        }
        loop {
            if let Some(frame) = self.pump.pop(self.config.poll_interval())? {
                return Ok(frame);
            }
        }
    }

    /// ### English
    /// Pushes `frame` into the pump. On cancellation the frame is kept for reuse.
    ///
    /// ### 中文
    /// 将 `frame` 推入帧泵；被取消时保留该帧以便复用。
    pub fn publish(&mut self, frame: FrameSlot) -> Result<(), FrameError> {
        self.pump.push(frame).map_err(|err| {
            self.give_back(err.into_frame());
            FrameError::Cancelled(Cancelled)
        })
    }

    /// ### English
    /// Keeps a frame the producer decided not to publish.
    ///
    /// ### 中文
    /// 保存生产者决定不发布的帧。
    pub fn give_back(&mut self, frame: FrameSlot) {
        if self.returned.len() < self.config.max_allocated {
            self.returned.push_back(frame);
        } else {
            self.release(frame);
        }
    }

    fn release(&mut self, frame: FrameSlot) {
        drop(frame);
        self.allocated = self.allocated.saturating_sub(1);
    }

    /// ### English
    /// Frees every locally returned frame (used while paused).
    ///
    /// ### 中文
    /// 释放所有本地交还的帧（暂停期间使用）。
    pub fn trim(&mut self) {
        let released = self.returned.len();
        while let Some(frame) = self.returned.pop_front() {
            self.release(frame);
        }
        if released > 0 {
            tracing::info!(released, remaining = self.allocated, "cleared idle frames");
        }
    }

    /// ### English
    /// Frees every frame the pool owns, including those still held by the pump. Returns how many
    /// frames were freed.
    ///
    /// ### 中文
    /// 释放帧池拥有的所有帧（包括仍由帧泵持有的帧），返回释放数量。
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        while let Some(frame) = self.returned.pop_front() {
            self.release(frame);
            released += 1;
        }
        for frame in self.pump.reclaim_all() {
            self.release(frame);
            released += 1;
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::PumpConfig;
    use crate::engine::surface::VsyncSurface;
    use std::sync::Arc;

    const SIZE: FrameSize = FrameSize::new(4, 4);

    fn setup(max_allocated: usize) -> (FramePool, Arc<VsyncSurface>) {
        let pump = FramePump::new(PumpConfig {
            capacity: 4,
            ..PumpConfig::default()
        })
        .unwrap();
        let surface = Arc::new(VsyncSurface::with_system_clock());
        pump.attach(surface.clone());
        let pool = FramePool::new(
            pump,
            PoolConfig {
                max_allocated,
                poll_interval_ms: 5,
                ..PoolConfig::default()
            },
        )
        .unwrap();
        (pool, surface)
    }

    #[test]
    fn reuses_recycled_frames_once_budget_is_spent() {
        let (mut pool, surface) = setup(2);

        let mut a = pool.request(SIZE).unwrap();
        a.set_sequence(1);
        let mut b = pool.request(SIZE).unwrap();
        b.set_sequence(2);
        assert_eq!(pool.allocated(), 2);

        pool.publish(a).unwrap();
        pool.publish(b).unwrap();
        surface.tick_all();
        surface.tick_all();

        let reused = pool.request(SIZE).unwrap();
        assert_eq!(reused.sequence(), 1);
        assert_eq!(pool.allocated(), 2);
    }

    #[test]
    fn releases_frames_of_stale_size() {
        let (mut pool, _surface) = setup(1);

        let frame = pool.request(SIZE).unwrap();
        pool.give_back(frame);

        let bigger = pool.request(FrameSize::new(8, 8)).unwrap();
        assert_eq!(bigger.size(), FrameSize::new(8, 8));
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn cancellation_stops_requests_and_keeps_frames() {
        let (mut pool, _surface) = setup(1);
        let frame = pool.request(SIZE).unwrap();

        pool.pump().cancel();
        assert!(matches!(pool.publish(frame), Err(FrameError::Cancelled(_))));

        // The returned frame is reused without touching the cancelled pump.
        let again = pool.request(SIZE).unwrap();
        pool.give_back(again);
        pool.trim();
        assert_eq!(pool.allocated(), 0);
        assert!(matches!(pool.request(SIZE), Err(FrameError::Cancelled(_))));
    }

    #[test]
    fn release_all_reclaims_from_pump() {
        let (mut pool, surface) = setup(3);
        for _ in 0..3 {
            let frame = pool.request(SIZE).unwrap();
            pool.publish(frame).unwrap();
        }
        surface.tick_all();

        assert_eq!(pool.release_all(), 3);
        assert_eq!(pool.allocated(), 0);
        assert_eq!(pool.pump().current_sequence(), None);
    }
}
