/// ### English
/// `frame_pump` crate root.
/// Bounded double-queue frame pump for software video playback; implementation lives under
/// `engine`.
///
/// ### 中文
/// `frame_pump` 的 crate 根。
/// 面向软件视频播放的有界双队列帧泵；实现位于 `engine` 模块。
mod engine;

pub use engine::clock::{Clock, ManualClock, SystemClock};
pub use engine::config::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_FRAME_DELAY_MS, PlaybackConfig, PoolConfig, PumpConfig,
};
pub use engine::draw::{Canvas, Color, DrawOutcome, Rect};
pub use engine::error::{
    Cancelled, ConfigError, DrawError, FrameError, PlaybackError, PushCancelled,
};
pub use engine::fps::{DEFAULT_FPS_WINDOW, FpsMeter};
pub use engine::frame::{FrameSize, FrameSlot, PixelFormat};
pub use engine::playback::{FrameSource, Playback, PlaybackContext};
pub use engine::pool::FramePool;
pub use engine::pump::{FramePump, PumpStats};
pub use engine::surface::{FrameCallback, RenderLoop, RenderSurface, VsyncSurface};
