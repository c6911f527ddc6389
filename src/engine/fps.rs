//! ### English
//! Running frame-rate estimate over a ring of inter-frame durations.
//!
//! Diagnostics only; pacing never reads it.
//!
//! ### 中文
//! 基于帧间隔 ring 的滚动帧率估计。
//!
//! 仅用于诊断；节奏控制从不读取它。

use std::time::{Duration, Instant};

/// ### English
/// Default ring length (samples).
///
/// ### 中文
/// 默认 ring 长度（样本数）。
pub const DEFAULT_FPS_WINDOW: usize = 50;

#[derive(Debug, Clone)]
pub struct FpsMeter {
    durations: Box<[Duration]>,
    /// ### English
    /// Next write index (monotonic; wrapped with `% len`).
    ///
    /// ### 中文
    /// 下一个写入位置（单调递增，使用 `% len` 回绕）。
    position: usize,
    filled: usize,
    previous: Option<Instant>,
}

impl FpsMeter {
    pub fn new(window: usize) -> Self {
        Self {
            durations: vec![Duration::ZERO; window.max(1)].into_boxed_slice(),
            position: 0,
            filled: 0,
            previous: None,
        }
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.durations.len()
    }

    /// ### English
    /// Records one frame at `now`. The first call only sets the baseline timestamp.
    ///
    /// ### 中文
    /// 记录一帧（时间为 `now`）。首次调用只记录基准时间戳。
    pub fn update(&mut self, now: Instant) {
        if let Some(previous) = self.previous {
            let len = self.durations.len();
            self.durations[self.position % len] = now.saturating_duration_since(previous);
            self.position = self.position.wrapping_add(1);
            self.filled = (self.filled + 1).min(len);
        }
        self.previous = Some(now);
    }

    /// ### English
    /// Frames per second over the recorded samples; `0.0` before two updates.
    ///
    /// Equals `1000 * N / sum_ms` once the ring is full.
    ///
    /// ### 中文
    /// 基于已记录样本的每秒帧数；不足两次 update 时为 `0.0`。
    ///
    /// ring 填满后等于 `1000 * N / sum_ms`。
    pub fn fps(&self) -> f64 {
        let total: Duration = self.durations[..self.filled].iter().sum();
        if total.is_zero() {
            return 0.0;
        }
        self.filled as f64 / total.as_secs_f64()
    }

    pub fn reset(&mut self) {
        self.durations.fill(Duration::ZERO);
        self.position = 0;
        self.filled = 0;
        self.previous = None;
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new(DEFAULT_FPS_WINDOW)
    }
}
