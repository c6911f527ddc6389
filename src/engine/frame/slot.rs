use std::fmt;

use crate::engine::error::FrameError;

use super::{FrameSize, PixelFormat};

/// ### English
/// One decoded pixel buffer.
///
/// A slot has exactly one owner at any time: the producer, the pending channel, the current
/// display slot, or the recycled channel. It is never cloned; ownership moves.
///
/// ### 中文
/// 单个已解码的像素缓冲。
///
/// 任一时刻只有一个所有者：生产者、pending 通道、当前显示槽或回收通道。不可 clone，只能移动所有权。
pub struct FrameSlot {
    size: FrameSize,
    format: PixelFormat,
    /// ### English
    /// Producer-assigned sequence number (presentation order).
    ///
    /// ### 中文
    /// 由生产者写入的序号（显示顺序）。
    sequence: u64,
    pixels: Box<[u8]>,
}

impl FrameSlot {
    /// ### English
    /// Allocates a zeroed frame buffer without aborting on allocator failure.
    ///
    /// #### Parameters
    /// - `size`: Frame dimensions.
    /// - `format`: Pixel layout used to compute the byte length.
    ///
    /// ### 中文
    /// 分配一个清零的帧缓冲；分配器失败时返回错误而不是中止进程。
    ///
    /// #### 参数
    /// - `size`：帧尺寸。
    /// - `format`：用于计算字节长度的像素布局。
    pub fn allocate(size: FrameSize, format: PixelFormat) -> Result<Self, FrameError> {
        let bytes = size
            .pixel_count()
            .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
            .ok_or(FrameError::SizeOverflow { size, format })?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(bytes)
            .map_err(|source| FrameError::Allocation {
                size,
                bytes,
                source,
            })?;
        pixels.resize(bytes, 0);

        Ok(Self {
            size,
            format,
            sequence: 0,
            pixels: pixels.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn size(&self) -> FrameSize {
        self.size
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// ### English
    /// True if this buffer can be reused for a frame of `size` in `format`.
    ///
    /// ### 中文
    /// 该缓冲能否复用于 `size`、`format` 的帧。
    #[inline]
    pub fn matches(&self, size: FrameSize, format: PixelFormat) -> bool {
        self.size == size && self.format == format
    }
}

impl fmt::Debug for FrameSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSlot")
            .field("size", &self.size)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
