//! ### English
//! Host-driven surface: armed callbacks wait in a deadline heap until the embedder calls `tick()`
//! from its own vsync (or render) loop.
//!
//! ### 中文
//! 由宿主驱动的表面：已 arm 的回调在 deadline 堆中等待，直到宿主在自身的 vsync（或渲染）循环中
//! 调用 `tick()`。

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::engine::clock::{Clock, SystemClock};

use super::task::ScheduledTask;
use super::{FrameCallback, RenderSurface};

pub struct VsyncSurface {
    clock: Arc<dyn Clock>,
    attached: AtomicBool,
    queue: Mutex<BinaryHeap<ScheduledTask>>,
    next_seq: AtomicU64,
    /// ### English
    /// Highest number of callbacks ever waiting at once.
    ///
    /// ### 中文
    /// 同时等待的回调数量历史峰值。
    peak_pending: AtomicUsize,
    scheduled_total: AtomicU64,
    redraws: AtomicU64,
}

impl VsyncSurface {
    /// ### English
    /// Creates an attached surface whose deadlines are compared against `clock`.
    ///
    /// ### 中文
    /// 创建一个已附着的表面，deadline 以 `clock` 为准进行比较。
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            attached: AtomicBool::new(true),
            queue: Mutex::new(BinaryHeap::new()),
            next_seq: AtomicU64::new(1),
            peak_pending: AtomicUsize::new(0),
            scheduled_total: AtomicU64::new(0),
            redraws: AtomicU64::new(0),
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    fn queue(&self) -> MutexGuard<'_, BinaryHeap<ScheduledTask>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// ### English
    /// Marks the surface on/off screen. Waiting callbacks are kept; ticks run nothing while the
    /// surface is off screen.
    ///
    /// ### 中文
    /// 标记表面是否在屏幕上。等待中的回调会被保留；离屏期间 tick 不执行任何回调。
    pub fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
        tracing::debug!(attached, waiting = self.queue().len(), "vsync surface visibility changed");
    }

    /// ### English
    /// Runs every callback whose deadline has passed. Callbacks armed while ticking run on the
    /// next tick. Returns the number of callbacks executed (always 0 while off screen).
    ///
    /// ### 中文
    /// 执行所有 deadline 已到的回调；tick 期间新 arm 的回调留到下一次 tick。返回执行的回调数量
    /// （离屏期间恒为 0）。
    pub fn tick(&self) -> usize {
        if !self.is_attached() {
            return 0;
        }
        let now = self.clock.now();
        let due = {
            let mut queue = self.queue();
            let mut due = Vec::new();
            while queue.peek().is_some_and(|task| task.deadline <= now) {
                if let Some(task) = queue.pop() {
                    due.push(task);
                }
            }
            due
        };
        Self::run(due)
    }

    /// ### English
    /// Runs every waiting callback regardless of its deadline.
    ///
    /// ### 中文
    /// 不论 deadline，执行所有等待中的回调。
    pub fn tick_all(&self) -> usize {
        if !self.is_attached() {
            return 0;
        }
        let due = std::mem::take(&mut *self.queue()).into_sorted_vec();
        // `into_sorted_vec` is ascending by `Ord`, which is reversed deadline order.
        Self::run(due.into_iter().rev().collect())
    }

    fn run(due: Vec<ScheduledTask>) -> usize {
        let count = due.len();
        for task in due {
            (task.callback)();
        }
        count
    }

    /// ### English
    /// Earliest waiting deadline, if any.
    ///
    /// ### 中文
    /// 最早的等待 deadline（若有）。
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue().peek().map(|task| task.deadline)
    }

    pub fn pending_callbacks(&self) -> usize {
        self.queue().len()
    }

    pub fn peak_pending_callbacks(&self) -> usize {
        self.peak_pending.load(Ordering::Acquire)
    }

    pub fn scheduled_total(&self) -> u64 {
        self.scheduled_total.load(Ordering::Acquire)
    }

    pub fn redraw_requests(&self) -> u64 {
        self.redraws.load(Ordering::Acquire)
    }
}

impl RenderSurface for VsyncSurface {
    fn schedule(&self, callback: FrameCallback, at: Instant) -> bool {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let pending = {
            let mut queue = self.queue();
            queue.push(ScheduledTask {
                deadline: at,
                seq,
                callback,
            });
            queue.len()
        };
        self.scheduled_total.fetch_add(1, Ordering::AcqRel);
        self.peak_pending.fetch_max(pending, Ordering::AcqRel);
        true
    }

    fn request_redraw(&self) {
        self.redraws.fetch_add(1, Ordering::AcqRel);
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}
