//! ### English
//! Canvas abstraction the host hands to `FramePump::draw`, plus the geometry it needs.
//!
//! ### 中文
//! 宿主传给 `FramePump::draw` 的画布抽象及其所需的几何类型。

use serde::{Deserialize, Serialize};

use crate::engine::error::DrawError;
use crate::engine::frame::FrameSlot;

/// ### English
/// Visible bounds in surface pixels (`right`/`bottom` exclusive).
///
/// ### 中文
/// 表面像素坐标下的可见区域（`right`/`bottom` 为开区间）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    #[inline]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[inline]
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 0xff);
    pub const GREEN: Color = Color::rgba(0, 0xff, 0, 0xff);

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// ### English
/// Host drawing backend. Only `blit` is required; `fill` and `draw_text` default to no-ops.
///
/// Implementations may fail (or even panic); the pump contains both.
///
/// `blit` runs while the pump holds the current frame. It may read `current_sequence`, `stats`
/// and `fps`, but must not call `draw` or `reclaim_all` on the same pump.
///
/// ### 中文
/// 宿主绘制后端。只有 `blit` 必须实现；`fill` 与 `draw_text` 默认为空操作。
///
/// 实现可以失败（甚至 panic）；帧泵会把两者都拦截在本地。
///
/// `blit` 执行期间帧泵持有当前帧。其中可以读取 `current_sequence`、`stats` 与 `fps`，但不得对同一
/// 帧泵调用 `draw` 或 `reclaim_all`。
pub trait Canvas {
    fn blit(&mut self, frame: &FrameSlot, bounds: Rect) -> Result<(), DrawError>;

    fn fill(&mut self, _bounds: Rect, _color: Color) -> Result<(), DrawError> {
        Ok(())
    }

    /// ### English
    /// Draws `text` with its baseline starting at `(x, y)`.
    ///
    /// ### 中文
    /// 以 `(x, y)` 为基线起点绘制 `text`。
    fn draw_text(
        &mut self,
        _text: &str,
        _x: i32,
        _y: i32,
        _size: i32,
        _color: Color,
    ) -> Result<(), DrawError> {
        Ok(())
    }
}

/// ### English
/// What one `draw` call did.
///
/// ### 中文
/// 一次 `draw` 调用的结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    /// ### English
    /// No frame has been displayed yet.
    ///
    /// ### 中文
    /// 尚无帧被显示。
    Idle,
    /// ### English
    /// The frame with this sequence number was blitted.
    ///
    /// ### 中文
    /// 序号为该值的帧已完成 blit。
    Drawn(u64),
    /// ### English
    /// The backend failed on this frame; it was skipped.
    ///
    /// ### 中文
    /// 后端在该帧上失败，已跳过。
    Skipped(u64),
}
