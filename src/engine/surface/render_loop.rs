//! ### English
//! Threaded host surface: a single named render thread runs armed callbacks at their deadlines
//! and redraws on request.
//!
//! ### 中文
//! 线程化的宿主表面：单个命名渲染线程在 deadline 到达时执行已 arm 的回调，并按请求重绘。

use std::collections::BinaryHeap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender};

use super::task::ScheduledTask;
use super::{FrameCallback, RenderSurface};

enum LoopMsg {
    Schedule(ScheduledTask),
    Redraw,
    /// Visibility changed; re-check whether due callbacks may run.
    Wake,
    Shutdown,
}

pub struct RenderLoop {
    /// ### English
    /// Channel sender into the render thread.
    ///
    /// ### 中文
    /// 向渲染线程发送消息的 channel sender。
    tx: Sender<LoopMsg>,
    next_seq: AtomicU64,
    /// ### English
    /// On-screen flag shared with the render thread; due callbacks wait while it is false.
    ///
    /// ### 中文
    /// 与渲染线程共享的上屏标记；为 false 时到期回调会等待。
    attached: Arc<AtomicBool>,
    closed: AtomicBool,
    /// ### English
    /// Coalesced redraw flag: at most one `Redraw` message in flight.
    ///
    /// ### 中文
    /// 合并重绘标记：同一时刻最多只有一条 `Redraw` 消息在途。
    redraw_pending: Arc<AtomicBool>,
    thread: thread::Thread,
    /// ### English
    /// Join handle (taken on shutdown).
    ///
    /// ### 中文
    /// JoinHandle（shutdown 时取走）。
    join: Mutex<Option<thread::JoinHandle<()>>>,
}

impl RenderLoop {
    /// ### English
    /// Spawns the render thread.
    ///
    /// #### Parameters
    /// - `name`: Thread name.
    /// - `on_redraw`: Invoked on the render thread after `request_redraw()`; typically calls
    ///   `FramePump::draw` with the host canvas.
    ///
    /// ### 中文
    /// 启动渲染线程。
    ///
    /// #### 参数
    /// - `name`：线程名。
    /// - `on_redraw`：`request_redraw()` 之后在渲染线程调用；通常在其中用宿主画布调用
    ///   `FramePump::draw`。
    pub fn spawn<F>(name: impl Into<String>, on_redraw: F) -> io::Result<Arc<Self>>
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = channel::unbounded::<LoopMsg>();
        let redraw_pending = Arc::new(AtomicBool::new(false));
        let redraw_for_thread = redraw_pending.clone();
        let attached = Arc::new(AtomicBool::new(true));
        let attached_for_thread = attached.clone();
        let join = thread::Builder::new()
            .name(name.into())
            .spawn(move || run_loop(rx, redraw_for_thread, attached_for_thread, on_redraw))?;
        let thread = join.thread().clone();

        Ok(Arc::new(Self {
            tx,
            next_seq: AtomicU64::new(1),
            attached,
            closed: AtomicBool::new(false),
            redraw_pending,
            thread,
            join: Mutex::new(Some(join)),
        }))
    }

    /// ### English
    /// Marks the surface on/off screen. Off screen, due callbacks are held (not dropped) and run
    /// once the surface is visible again.
    ///
    /// ### 中文
    /// 标记表面是否在屏幕上。离屏时到期回调被保留（不会丢弃），重新上屏后执行。
    pub fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
        let _ = self.tx.send(LoopMsg::Wake);
    }

    /// ### English
    /// Stops the render thread; waiting callbacks are dropped and later `schedule` calls are
    /// rejected. Joins unless called from the render thread itself.
    ///
    /// ### 中文
    /// 停止渲染线程：丢弃等待中的回调，之后的 `schedule` 调用都会被拒绝。若不是在渲染线程自身
    /// 调用，则等待 join。
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.attached.store(false, Ordering::Release);
        let join = self
            .join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(join) = join {
            let _ = self.tx.send(LoopMsg::Shutdown);
            if thread::current().id() != self.thread.id() {
                let _ = join.join();
            }
        }
    }
}

impl RenderSurface for RenderLoop {
    fn schedule(&self, callback: FrameCallback, at: Instant) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let task = ScheduledTask {
            deadline: at,
            seq,
            callback,
        };
        self.tx.send(LoopMsg::Schedule(task)).is_ok()
    }

    fn request_redraw(&self) {
        if !self.redraw_pending.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(LoopMsg::Redraw);
        }
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// ### English
/// Render thread main loop.
///
/// ### 中文
/// 渲染线程主循环。
fn run_loop<F>(
    rx: Receiver<LoopMsg>,
    redraw_pending: Arc<AtomicBool>,
    attached: Arc<AtomicBool>,
    mut on_redraw: F,
) where
    F: FnMut(),
{
    let mut queue: BinaryHeap<ScheduledTask> = BinaryHeap::new();

    loop {
        let visible = attached.load(Ordering::Acquire);
        while visible && let Some(next) = queue.peek() {
            if next.deadline > Instant::now() {
                break;
            }
            let Some(task) = queue.pop() else {
                break;
            };
            (task.callback)();
        }

        // Off screen: sleep until a message (`Wake` on visibility change) arrives.
        let timeout = queue
            .peek()
            .filter(|_| visible)
            .map(|task| task.deadline.saturating_duration_since(Instant::now()));

        let msg = match timeout {
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(msg) => msg,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            },
            None => match rx.recv() {
                Ok(msg) => msg,
                Err(_) => return,
            },
        };

        match msg {
            LoopMsg::Schedule(task) => queue.push(task),
            LoopMsg::Wake => {}
            LoopMsg::Redraw => {
                redraw_pending.store(false, Ordering::Release);
                on_redraw();
            }
            LoopMsg::Shutdown => {
                tracing::debug!(dropped = queue.len(), "render loop stopped");
                return;
            }
        }
    }
}
