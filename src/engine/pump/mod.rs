//! ### English
//! Bounded double-queue frame pump between a decode thread (producer) and a render thread driven
//! by host callbacks (consumer).
//!
//! Frames flow `producer -> pending -> current -> recycled -> producer`. Both channels are bounded;
//! a full pending channel blocks `push` (backpressure) and a full recycled channel during advance is
//! a fatal invariant violation.
//!
//! ### 中文
//! 位于解码线程（生产者）与由宿主回调驱动的渲染线程（消费者）之间的有界双队列帧泵。
//!
//! 帧的流向为 `生产者 -> pending -> current -> 回收 -> 生产者`。两个通道都是有界的：pending 满时
//! `push` 阻塞（背压）；advance 时回收通道已满属于致命的不变量破坏。
mod advance;
mod draw;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, Sender, TrySendError};

use crate::engine::cancel::CancelToken;
use crate::engine::channel::BoundedChannel;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::config::PumpConfig;
use crate::engine::draw::Color;
use crate::engine::error::{Cancelled, ConfigError, PushCancelled};
use crate::engine::fps::FpsMeter;
use crate::engine::frame::FrameSlot;
use crate::engine::surface::{FrameCallback, RenderSurface};

/// ### English
/// Snapshot of pump counters for diagnostics.
///
/// ### 中文
/// 用于诊断的帧泵计数快照。
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PumpStats {
    pub advanced: u64,
    pub drawn: u64,
    pub skipped: u64,
    pub pending: usize,
    pub recycled: usize,
    pub scheduled: bool,
    pub fps: f64,
}

struct Attachment {
    surface: Option<Arc<dyn RenderSurface>>,
    /// ### English
    /// Bumped on every attach/detach; callbacks armed for an older generation are ignored.
    ///
    /// ### 中文
    /// 每次 attach/detach 递增；为旧 generation arm 的回调会被忽略。
    generation: u64,
}

pub(crate) struct PumpShared {
    pending: BoundedChannel<FrameSlot>,
    recycled: BoundedChannel<FrameSlot>,
    /// ### English
    /// Frame on screen. Written only by advance (render thread); read by draw.
    ///
    /// ### 中文
    /// 正在显示的帧。仅由 advance（渲染线程）写入，由 draw 读取。
    current: Mutex<Option<FrameSlot>>,
    /// ### English
    /// Sequence of `current`, kept under its own lock so it can be read while a draw holds
    /// `current` (for example from inside `Canvas::blit`).
    ///
    /// ### 中文
    /// `current` 的序号，单独加锁，使 draw 持有 `current` 时（例如在 `Canvas::blit` 内部）也能读取。
    current_sequence: Mutex<Option<u64>>,
    /// ### English
    /// True exactly while one advance callback is armed. Only changed through CAS/store.
    ///
    /// ### 中文
    /// 恰好在有一个 advance 回调被 arm 时为 true；只通过 CAS/store 修改。
    scheduled: AtomicBool,
    frame_delay_micros: AtomicU64,
    attachment: Mutex<Attachment>,
    cancel: CancelToken,
    clock: Arc<dyn Clock>,
    fps: Mutex<FpsMeter>,
    debug_overlay: AtomicBool,
    idle_fill: Option<Color>,
    advanced: AtomicU64,
    drawn: AtomicU64,
    skipped: AtomicU64,
    subscribers: Mutex<Vec<Sender<u64>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PumpShared {
    #[inline]
    fn current(&self) -> MutexGuard<'_, Option<FrameSlot>> {
        lock(&self.current)
    }

    #[inline]
    fn frame_delay(&self) -> Duration {
        Duration::from_micros(self.frame_delay_micros.load(Ordering::Relaxed))
    }

    /// ### English
    /// Arms exactly one advance at `now + frame_delay` if a surface is attached and none is armed.
    /// Without an attached surface the scheduled flag is cleared so a later call re-arms.
    ///
    /// The CAS happens under the attachment lock, so an armed callback always carries the
    /// generation that was current when the flag was set. A surface that is merely off screen still
    /// accepts the callback and runs it once visible; a rejected callback clears the flag again.
    ///
    /// ### 中文
    /// 若已附着表面且当前没有已 arm 的 advance，则在 `now + frame_delay` 处 arm 恰好一个。
    /// 未附着表面时清除 scheduled 标记，以便之后的调用重新 arm。
    ///
    /// CAS 在 attachment 锁内完成，因此已 arm 的回调总是携带设置标记时的 generation。
    /// 仅仅离屏的表面仍会接受回调并在上屏后执行；回调被拒绝时标记会被重新清除。
    fn ensure_scheduled(self: &Arc<Self>) {
        let (surface, generation) = {
            let attachment = lock(&self.attachment);
            let Some(surface) = attachment.surface.as_ref() else {
                self.scheduled.store(false, Ordering::Release);
                return;
            };

            if self
                .scheduled
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            (surface.clone(), attachment.generation)
        };

        let weak = Arc::downgrade(self);
        let callback: FrameCallback = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.advance(generation);
            }
        });
        let at = self.clock.now() + self.frame_delay();
        if surface.schedule(callback, at) {
            tracing::trace!(generation, "advance armed");
            return;
        }

        let attachment = lock(&self.attachment);
        if attachment.generation == generation {
            self.scheduled.store(false, Ordering::Release);
        }
        tracing::debug!(generation, "render surface rejected the advance callback");
    }

    fn notify_frame_available(&self, sequence: u64) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| match tx.try_send(sequence) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

/// ### English
/// Cheap-to-clone handle to one frame pump.
///
/// `push`/`pop` belong to the producer thread; `draw` and the armed advance callbacks belong to
/// the render thread.
///
/// ### 中文
/// 帧泵的句柄，clone 开销很小。
///
/// `push`/`pop` 属于生产者线程；`draw` 与已 arm 的 advance 回调属于渲染线程。
#[derive(Clone)]
pub struct FramePump {
    shared: Arc<PumpShared>,
}

impl FramePump {
    /// ### English
    /// Creates a pump with the system clock.
    ///
    /// ### 中文
    /// 使用系统时钟创建帧泵。
    pub fn new(config: PumpConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// ### English
    /// Creates a pump whose pacing deadlines and fps samples come from `clock`.
    ///
    /// ### 中文
    /// 创建帧泵，节奏 deadline 与 fps 采样均取自 `clock`。
    pub fn with_clock(config: PumpConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let delay = u64::try_from(config.frame_delay().as_micros()).unwrap_or(u64::MAX);

        Ok(Self {
            shared: Arc::new(PumpShared {
                pending: BoundedChannel::with_capacity(config.capacity),
                recycled: BoundedChannel::with_capacity(config.capacity),
                current: Mutex::new(None),
                current_sequence: Mutex::new(None),
                scheduled: AtomicBool::new(false),
                frame_delay_micros: AtomicU64::new(delay),
                attachment: Mutex::new(Attachment {
                    surface: None,
                    generation: 0,
                }),
                cancel: CancelToken::new(),
                clock,
                fps: Mutex::new(FpsMeter::new(config.fps_window)),
                debug_overlay: AtomicBool::new(config.debug_overlay),
                idle_fill: config.idle_fill,
                advanced: AtomicU64::new(0),
                drawn: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
            }),
        })
    }

    /// ### English
    /// Queues a frame for display, blocking while the pending channel is full.
    ///
    /// Must not be called on the render thread. On cancellation the frame is returned inside the
    /// error and the caller should stop producing.
    ///
    /// ### 中文
    /// 将一帧排队等待显示；pending 通道满时阻塞。
    ///
    /// 不得在渲染线程调用。被取消时帧会随错误返回，调用方应停止生产。
    pub fn push(&self, frame: FrameSlot) -> Result<(), PushCancelled> {
        self.shared
            .pending
            .put(frame, &self.shared.cancel)
            .map_err(PushCancelled::new)?;
        self.shared.ensure_scheduled();
        Ok(())
    }

    /// ### English
    /// Reclaims a displayed frame, waiting up to `timeout`. `Ok(None)` when none became free.
    ///
    /// Arms an advance first so the pipeline keeps moving while the producer waits. Must not be
    /// called on the render thread.
    ///
    /// ### 中文
    /// 回收一个已显示的帧，最多等待 `timeout`；没有可用帧时返回 `Ok(None)`。
    ///
    /// 会先 arm 一个 advance，使生产者等待期间流水线仍能推进。不得在渲染线程调用。
    pub fn pop(&self, timeout: Duration) -> Result<Option<FrameSlot>, Cancelled> {
        self.shared.ensure_scheduled();
        self.shared.recycled.take_timeout(timeout, &self.shared.cancel)
    }

    pub fn ensure_scheduled(&self) {
        self.shared.ensure_scheduled();
    }

    pub fn set_frame_delay(&self, delay: Duration) {
        let micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        self.shared
            .frame_delay_micros
            .store(micros, Ordering::Relaxed);
    }

    pub fn frame_delay(&self) -> Duration {
        self.shared.frame_delay()
    }

    /// ### English
    /// Installs the render surface and arms an advance, so a producer already blocked in `push`
    /// makes progress once the surface appears.
    ///
    /// ### 中文
    /// 安装渲染表面并 arm 一个 advance，使已阻塞在 `push` 中的生产者在表面出现后能继续推进。
    pub fn attach(&self, surface: Arc<dyn RenderSurface>) {
        let generation = {
            let mut attachment = lock(&self.shared.attachment);
            attachment.surface = Some(surface);
            attachment.generation = attachment.generation.wrapping_add(1);
            self.shared.scheduled.store(false, Ordering::Release);
            attachment.generation
        };
        tracing::debug!(generation, "render surface attached");
        self.shared.ensure_scheduled();
    }

    /// ### English
    /// Removes the render surface. Callbacks it still holds become no-ops.
    ///
    /// ### 中文
    /// 移除渲染表面；其仍持有的回调变为空操作。
    pub fn detach(&self) {
        let generation = {
            let mut attachment = lock(&self.shared.attachment);
            attachment.surface = None;
            attachment.generation = attachment.generation.wrapping_add(1);
            self.shared.scheduled.store(false, Ordering::Release);
            attachment.generation
        };
        tracing::debug!(generation, "render surface detached");
    }

    /// ### English
    /// Releases every producer blocked in `push`/`pop`; later calls fail until `resume()`.
    ///
    /// ### 中文
    /// 释放所有阻塞在 `push`/`pop` 中的生产者；在 `resume()` 之前后续调用都会失败。
    pub fn cancel(&self) {
        tracing::debug!("frame pump cancelled");
        self.shared.cancel.cancel();
    }

    pub fn resume(&self) {
        self.shared.cancel.reset();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// ### English
    /// True while an advance callback is armed.
    ///
    /// ### 中文
    /// 当有 advance 回调已 arm 时为 true。
    pub fn is_scheduled(&self) -> bool {
        self.shared.scheduled.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.shared.pending.capacity()
    }

    /// ### English
    /// Measured display rate. Diagnostics only.
    ///
    /// ### 中文
    /// 实测显示帧率，仅用于诊断。
    pub fn fps(&self) -> f64 {
        lock(&self.shared.fps).fps()
    }

    pub fn set_debug_overlay(&self, enabled: bool) {
        self.shared.debug_overlay.store(enabled, Ordering::Relaxed);
    }

    /// ### English
    /// Sequence number of the frame on screen.
    ///
    /// ### 中文
    /// 当前显示帧的序号。
    pub fn current_sequence(&self) -> Option<u64> {
        *lock(&self.shared.current_sequence)
    }

    pub fn stats(&self) -> PumpStats {
        let shared = &self.shared;
        PumpStats {
            advanced: shared.advanced.load(Ordering::Acquire),
            drawn: shared.drawn.load(Ordering::Acquire),
            skipped: shared.skipped.load(Ordering::Acquire),
            pending: shared.pending.len(),
            recycled: shared.recycled.len(),
            scheduled: shared.scheduled.load(Ordering::Acquire),
            fps: self.fps(),
        }
    }

    /// ### English
    /// Subscribes to "new frame on screen" events carrying the frame's sequence number.
    ///
    /// Notifications coalesce: a subscriber that falls behind sees the oldest undelivered one.
    ///
    /// ### 中文
    /// 订阅“新帧上屏”事件，事件携带该帧的序号。
    ///
    /// 通知会合并：落后的订阅者只会看到最早未投递的那一条。
    pub fn frame_available(&self) -> Receiver<u64> {
        let (tx, rx) = channel::bounded(1);
        lock(&self.shared.subscribers).push(tx);
        rx
    }

    /// ### English
    /// Hands every frame still held by the pump back to the producer (teardown).
    ///
    /// Order: recycled, current, then pending (FIFO within each).
    ///
    /// ### 中文
    /// 将帧泵仍持有的所有帧交还给生产者（用于销毁阶段）。
    ///
    /// 顺序：回收、当前、pending（各自内部保持 FIFO）。
    pub fn reclaim_all(&self) -> Vec<FrameSlot> {
        let shared = &self.shared;
        let mut frames = shared.recycled.drain();
        {
            let mut current = shared.current();
            frames.extend(current.take());
            *lock(&shared.current_sequence) = None;
        }
        frames.extend(shared.pending.drain());
        frames
    }
}

impl std::fmt::Debug for FramePump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePump")
            .field("stats", &self.stats())
            .field("frame_delay", &self.frame_delay())
            .finish()
    }
}
