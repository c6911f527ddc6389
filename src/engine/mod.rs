/// ### English
/// Frame pump internals (channels, pacing, draw path, producer driver).
///
/// ### 中文
/// 帧泵内部模块（通道、节奏控制、绘制路径、生产者驱动）。
pub(crate) mod cancel;
pub(crate) mod channel;
pub mod clock;
pub mod config;
pub mod draw;
pub mod error;
pub mod fps;
pub mod frame;
pub mod playback;
pub mod pool;
pub mod pump;
pub mod surface;
