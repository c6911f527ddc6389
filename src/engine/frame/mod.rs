/// ### English
/// Decoded frame buffers moved between the producer and the render path by ownership transfer.
///
/// ### 中文
/// 在生产者与渲染路径之间通过所有权转移传递的已解码帧缓冲。
mod slot;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use slot::FrameSlot;

/// ### English
/// Frame dimensions in pixels.
///
/// ### 中文
/// 帧尺寸（像素）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// ### English
    /// Number of pixels, or `None` if it does not fit in `usize`.
    ///
    /// ### 中文
    /// 像素数量；超出 `usize` 时返回 `None`。
    #[inline]
    pub fn pixel_count(self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }

    #[inline]
    pub fn aspect_ratio(self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// ### English
/// Pixel layout of a frame buffer.
///
/// ### 中文
/// 帧缓冲的像素布局。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// ### English
    /// 16-bit RGB (5/6/5). Default for software-decoded video.
    ///
    /// ### 中文
    /// 16 位 RGB（5/6/5），软件解码视频的默认格式。
    #[default]
    Rgb565,
    Rgba8888,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgba8888 => 4,
        }
    }
}
