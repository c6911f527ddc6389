//! ### English
//! Host render-surface binding.
//!
//! The pump never owns a timer. It asks the surface to run one callback at a future timestamp
//! (like a compositor vsync callback) and re-arms from inside that callback.
//!
//! - `VsyncSurface`: callbacks run on the caller's thread when the host calls `tick()`.
//! - `RenderLoop`: a dedicated render thread that runs callbacks at their deadlines.
//!
//! ### 中文
//! 宿主渲染表面的绑定。
//!
//! 帧泵自身不持有计时器；它请求表面在未来某个时间点执行一次回调（类似合成器的 vsync 回调），
//! 并在回调内部重新 arm。
//!
//! - `VsyncSurface`：宿主调用 `tick()` 时在调用线程执行回调。
//! - `RenderLoop`：专用渲染线程，在 deadline 到达时执行回调。
use std::time::Instant;

mod render_loop;
mod task;
mod vsync;

pub use render_loop::RenderLoop;
pub use vsync::VsyncSurface;

/// ### English
/// One armed callback. Runs on the render thread.
///
/// ### 中文
/// 一个已 arm 的回调，在渲染线程执行。
pub type FrameCallback = Box<dyn FnOnce() + Send + 'static>;

pub trait RenderSurface: Send + Sync {
    /// ### English
    /// Runs `callback` on the render thread no earlier than `at`.
    ///
    /// Returns `false` if the callback was rejected (and dropped); it will never run. An accepted
    /// callback must eventually run: a surface that goes off screen holds it until it is back.
    ///
    /// ### 中文
    /// 在不早于 `at` 的时间于渲染线程执行 `callback`。
    ///
    /// 返回 `false` 表示回调被拒绝（并已丢弃），永远不会执行。被接受的回调最终必须执行：
    /// 离屏的表面会保留它直到重新上屏。
    #[must_use]
    fn schedule(&self, callback: FrameCallback, at: Instant) -> bool;

    /// ### English
    /// Asks the host to redraw; the host then calls `FramePump::draw` on the render thread.
    ///
    /// ### 中文
    /// 请求宿主重绘；宿主随后在渲染线程调用 `FramePump::draw`。
    fn request_redraw(&self);

    /// ### English
    /// True while the surface is on screen. Off-screen surfaces defer armed callbacks.
    ///
    /// ### 中文
    /// 表面在屏幕上时为 true；离屏表面会推迟已 arm 的回调。
    fn is_attached(&self) -> bool;
}
