//! ### English
//! Error types crossing the frame pump API.
//!
//! Only cancellation and allocation failures are returned to callers. Recycled-channel overflow
//! panics inside the advance step and draw failures are logged and swallowed.
//!
//! ### 中文
//! 帧泵 API 对外暴露的错误类型。
//!
//! 只有取消与分配失败会返回给调用方；回收通道溢出在 advance 内部直接 panic，绘制失败仅记录日志。

use std::collections::TryReserveError;

use crate::engine::frame::{FrameSize, FrameSlot, PixelFormat};

/// ### English
/// A blocking producer call was interrupted by the pump's cancel token.
///
/// ### 中文
/// 生产者的阻塞调用被帧泵的取消令牌打断。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("frame pump cancelled")]
pub struct Cancelled;

/// ### English
/// `push` was cancelled; the frame is handed back so the producer keeps ownership.
///
/// ### 中文
/// `push` 被取消；帧会交还给生产者，所有权不丢失。
#[derive(Debug, thiserror::Error)]
#[error("frame pump cancelled before frame #{} was queued", .frame.sequence())]
pub struct PushCancelled {
    frame: FrameSlot,
}

impl PushCancelled {
    pub(crate) fn new(frame: FrameSlot) -> Self {
        Self { frame }
    }

    /// ### English
    /// Returns the frame that could not be queued.
    ///
    /// ### 中文
    /// 取回未能入队的帧。
    pub fn into_frame(self) -> FrameSlot {
        self.frame
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame size {size} in {format:?} overflows the address space")]
    SizeOverflow { size: FrameSize, format: PixelFormat },

    #[error("cannot allocate {bytes} bytes for a {size} frame")]
    Allocation {
        size: FrameSize,
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// ### English
/// Failure reported by a `Canvas` backend while blitting.
///
/// ### 中文
/// `Canvas` 后端在 blit 时报告的失败。
#[derive(Debug, Clone, thiserror::Error)]
#[error("draw failed: {message}")]
pub struct DrawError {
    message: String,
}

impl DrawError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("channel capacity must be at least 1")]
    ZeroCapacity,

    #[error("fps window must hold at least one sample")]
    ZeroFpsWindow,

    #[error("frame pool must be allowed to allocate at least one frame")]
    ZeroAllocationBudget,
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback stopped")]
    Stopped,

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl PlaybackError {
    /// ### English
    /// True for errors caused by stopping playback (not reported to `errors()`).
    ///
    /// ### 中文
    /// 由停止播放引起的错误（不会上报到 `errors()`）。
    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            PlaybackError::Stopped | PlaybackError::Frame(FrameError::Cancelled(_))
        )
    }
}
