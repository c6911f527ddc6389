//! ### English
//! Draw path. Never propagates a failure: a backend error or panic on one frame is logged and the
//! frame is counted as skipped.
//!
//! ### 中文
//! 绘制路径，从不向外传播失败：单帧上的后端错误或 panic 只记录日志，并计为跳过的帧。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;

use crate::engine::draw::{Canvas, Color, DrawOutcome, Rect};
use crate::engine::error::DrawError;

use super::FramePump;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "canvas backend panicked".to_string()
    }
}

/// ### English
/// Runs one backend call, turning a panic into a `DrawError`.
///
/// ### 中文
/// 执行一次后端调用，把 panic 转为 `DrawError`。
fn contained<F>(call: F) -> Result<(), DrawError>
where
    F: FnOnce() -> Result<(), DrawError>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(DrawError::new(panic_message(payload.as_ref()))),
    }
}

impl FramePump {
    /// ### English
    /// Blits the current frame into `bounds`. Render thread only.
    ///
    /// Paints nothing (or the configured idle fill) before the first frame. Failures never escape.
    ///
    /// #### Parameters
    /// - `canvas`: Host drawing backend.
    /// - `bounds`: Visible bounds to scale the frame into.
    ///
    /// ### 中文
    /// 将当前帧 blit 到 `bounds`，仅在渲染线程调用。
    ///
    /// 首帧之前不绘制（或绘制配置的空闲填充色）；失败永远不会向外抛出。
    ///
    /// #### 参数
    /// - `canvas`：宿主绘制后端。
    /// - `bounds`：帧要缩放到的可见区域。
    pub fn draw<C>(&self, canvas: &mut C, bounds: Rect) -> DrawOutcome
    where
        C: Canvas + ?Sized,
    {
        let shared = &self.shared;
        let outcome = {
            let current = shared.current();
            if current.is_none() {
                drop(current);
                if let Some(color) = shared.idle_fill
                    && let Err(err) = contained(|| canvas.fill(bounds, color))
                {
                    tracing::debug!(%err, "idle fill failed");
                }
                return DrawOutcome::Idle;
            }
            let Some(frame) = current.as_ref() else {
                return DrawOutcome::Idle;
            };

            let sequence = frame.sequence();
            match contained(|| canvas.blit(frame, bounds)) {
                Ok(()) => {
                    shared.drawn.fetch_add(1, Ordering::AcqRel);
                    DrawOutcome::Drawn(sequence)
                }
                Err(err) => {
                    shared.skipped.fetch_add(1, Ordering::AcqRel);
                    tracing::warn!(sequence, %err, "draw failed, skipping frame");
                    DrawOutcome::Skipped(sequence)
                }
            }
        };

        if matches!(outcome, DrawOutcome::Drawn(_)) && shared.debug_overlay.load(Ordering::Relaxed)
        {
            self.draw_fps_overlay(canvas, bounds);
        }
        outcome
    }

    fn draw_fps_overlay<C>(&self, canvas: &mut C, bounds: Rect)
    where
        C: Canvas + ?Sized,
    {
        let text = format!("{:.2}fps", self.fps());
        let size = bounds.width() / 10;
        let x = bounds.left + size;
        let y = bounds.bottom - size;
        if let Err(err) = contained(|| canvas.draw_text(&text, x, y, size, Color::GREEN)) {
            tracing::debug!(%err, "fps overlay failed");
        }
    }
}
