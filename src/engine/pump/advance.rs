//! ### English
//! Advance step: promotes the next pending frame to current. Render thread only, invoked only by
//! an armed surface callback. Never blocks.
//!
//! ### 中文
//! advance 步骤：把下一个 pending 帧提升为当前帧。仅在渲染线程、仅由已 arm 的表面回调触发，从不阻塞。

use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::{PumpShared, lock};

impl PumpShared {
    pub(super) fn advance(self: &Arc<Self>, generation: u64) {
        {
            let attachment = lock(&self.attachment);
            if attachment.generation != generation {
                tracing::trace!(generation, "ignoring advance armed for a previous surface");
                return;
            }
            self.scheduled.store(false, Ordering::Release);
        }

        /*
        ### English
        Nothing pending: stay idle. The next `push`/`pop` re-arms, so an idle producer does not
        cause a callback spin.

        ### 中文
        没有 pending 帧：保持空闲。下一次 `push`/`pop` 会重新 arm，避免生产者空闲时回调空转。
        */
        let Some(next) = self.pending.try_take() else {
            return;
        };
        let sequence = next.sequence();

        {
            let mut current = self.current();
            if let Some(previous) = current.take()
                && let Err(previous) = self.recycled.try_put(previous)
            {
                let recycled = previous.sequence();
                *current = Some(previous);
                drop(current);
                tracing::error!(
                    recycled,
                    capacity = self.recycled.capacity(),
                    "recycled frame channel is full; producer stopped reclaiming frames"
                );
                panic!(
                    "recycled frame channel overflow (capacity {}): frame #{recycled} has no owner",
                    self.recycled.capacity()
                );
            }
            *current = Some(next);
            *lock(&self.current_sequence) = Some(sequence);
        }

        let surface = lock(&self.attachment).surface.clone();
        if let Some(surface) = surface {
            surface.request_redraw();
        }

        self.ensure_scheduled();
        self.notify_frame_available(sequence);
        self.advanced.fetch_add(1, Ordering::AcqRel);
        lock(&self.fps).update(self.clock.now());
        tracing::trace!(sequence, pending = self.pending.len(), "advanced to next frame");
    }
}
