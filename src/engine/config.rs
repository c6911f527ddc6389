//! ### English
//! Tunables for the pump, the producer-side frame pool and the playback driver.
//!
//! All structs deserialize with defaults for missing fields so an embedder can keep them in its
//! own settings file.
//!
//! ### 中文
//! 帧泵、生产者侧帧池以及播放驱动的可调参数。
//!
//! 所有结构体在字段缺失时使用默认值反序列化，宿主可将其放入自己的配置文件。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::draw::Color;
use crate::engine::error::ConfigError;
use crate::engine::fps::DEFAULT_FPS_WINDOW;
use crate::engine::frame::PixelFormat;

/// ### English
/// Depth of both the pending and the recycled channel.
///
/// ### 中文
/// pending 与回收通道的深度。
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// ### English
/// Default pacing target: `1000 / 30` ms (about 30 fps).
///
/// ### 中文
/// 默认节奏目标：`1000 / 30` 毫秒（约 30 fps）。
pub const DEFAULT_FRAME_DELAY_MS: u64 = 1000 / 30;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    pub capacity: usize,
    pub frame_delay_ms: u64,
    pub fps_window: usize,
    /// ### English
    /// Draw the fps text over each frame.
    ///
    /// ### 中文
    /// 在每帧上绘制 fps 文本。
    pub debug_overlay: bool,
    /// ### English
    /// Fill painted when no frame has been displayed yet (`None` paints nothing).
    ///
    /// ### 中文
    /// 尚无帧可显示时的填充色（`None` 表示不绘制）。
    pub idle_fill: Option<Color>,
}

impl PumpConfig {
    #[inline]
    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.fps_window == 0 {
            return Err(ConfigError::ZeroFpsWindow);
        }
        Ok(())
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            frame_delay_ms: DEFAULT_FRAME_DELAY_MS,
            fps_window: DEFAULT_FPS_WINDOW,
            debug_overlay: cfg!(debug_assertions),
            idle_fill: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// ### English
    /// Frames the pool may have alive at once before it starts reclaiming from the pump.
    ///
    /// ### 中文
    /// 开始从帧泵回收之前，帧池允许同时存活的帧数量。
    pub max_allocated: usize,
    pub poll_interval_ms: u64,
    pub format: PixelFormat,
}

impl PoolConfig {
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_allocated == 0 {
            return Err(ConfigError::ZeroAllocationBudget);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_allocated: 3,
            poll_interval_ms: 100,
            format: PixelFormat::Rgb565,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub pause_poll_ms: u64,
    pub thread_name: String,
    pub pool: PoolConfig,
}

impl PlaybackConfig {
    #[inline]
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            pause_poll_ms: 100,
            thread_name: "FramePumpProducer".to_string(),
            pool: PoolConfig::default(),
        }
    }
}
