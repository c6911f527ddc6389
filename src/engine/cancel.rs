//! ### English
//! Cancellation token observed by every blocking producer wait.
//!
//! Cancelling drops the token's sender, so every receiver selected alongside a channel operation
//! becomes ready (disconnected) at once and the blocked call returns.
//!
//! ### 中文
//! 所有生产者阻塞等待都会观察的取消令牌。
//!
//! 取消时丢弃令牌内部的 sender，与通道操作一起 select 的 receiver 会立即就绪（断开），阻塞调用随即返回。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{self as channel, Receiver, Sender};

struct Signal {
    /// ### English
    /// Held until cancellation; dropping it disconnects `rx`.
    ///
    /// ### 中文
    /// 取消前一直持有；丢弃后 `rx` 断开。
    tx: Option<Sender<()>>,
    rx: Receiver<()>,
}

impl Signal {
    fn armed() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self { tx: Some(tx), rx }
    }
}

pub(crate) struct CancelToken {
    cancelled: AtomicBool,
    signal: Mutex<Signal>,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            signal: Mutex::new(Signal::armed()),
        }
    }

    #[inline]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// ### English
    /// Wakes every current waiter; later waits fail fast until `reset()`.
    ///
    /// ### 中文
    /// 唤醒所有正在等待的调用；在 `reset()` 之前后续等待会立即失败。
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let mut signal = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        signal.tx.take();
    }

    /// ### English
    /// Re-arms the token. Waiters that already saw the old signal stay cancelled.
    ///
    /// ### 中文
    /// 重新装填令牌；已观察到旧信号的等待者仍视为已取消。
    pub(crate) fn reset(&self) {
        let mut signal = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        *signal = Signal::armed();
        self.cancelled.store(false, Ordering::Release);
    }

    /// ### English
    /// Receiver to select on; it never yields a message, it only disconnects.
    ///
    /// ### 中文
    /// 用于 select 的 receiver；永远不会收到消息，只会断开。
    pub(crate) fn receiver(&self) -> Receiver<()> {
        self.signal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rx
            .clone()
    }
}
