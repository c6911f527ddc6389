//! ### English
//! Fixed-capacity FIFO transfer channel used for both the pending and the recycled frame queues.
//!
//! - Blocking `put` (backpressure) and timed `take_timeout`, both released by a `CancelToken`.
//! - Non-blocking `try_put` / `try_take` for the render thread.
//! - Never grows past `capacity`.
//!
//! ### 中文
//! 固定容量的 FIFO 传输通道，pending 与回收队列都使用它。
//!
//! - 阻塞 `put`（背压）与限时 `take_timeout`，都可被 `CancelToken` 解除。
//! - 渲染线程使用非阻塞的 `try_put` / `try_take`。
//! - 永远不会超过 `capacity`。

use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, Select, Sender, TryRecvError, TrySendError};

use crate::engine::cancel::CancelToken;
use crate::engine::error::Cancelled;

pub(crate) struct BoundedChannel<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> BoundedChannel<T> {
    /// ### English
    /// Creates a channel holding at most `capacity` items (`capacity >= 1`).
    ///
    /// ### 中文
    /// 创建最多容纳 `capacity` 个元素的通道（`capacity >= 1`）。
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }

    /// ### English
    /// Enqueues without blocking. Returns `Err(value)` if the channel is full.
    ///
    /// ### 中文
    /// 非阻塞入队；通道已满时返回 `Err(value)`。
    pub(crate) fn try_put(&self, value: T) -> Result<(), T> {
        self.tx.try_send(value).map_err(|err| match err {
            TrySendError::Full(value) | TrySendError::Disconnected(value) => value,
        })
    }

    /// ### English
    /// Enqueues, blocking while the channel is full.
    ///
    /// Returns `Err(value)` if `cancel` fires first; the value is never dropped.
    ///
    /// ### 中文
    /// 入队；通道满时阻塞。
    ///
    /// 若 `cancel` 先触发则返回 `Err(value)`，值不会被丢弃。
    pub(crate) fn put(&self, value: T, cancel: &CancelToken) -> Result<(), T> {
        if cancel.is_cancelled() {
            return Err(value);
        }
        let value = match self.try_put(value) {
            Ok(()) => return Ok(()),
            Err(value) => value,
        };

        let stop = cancel.receiver();
        let mut select = Select::new();
        let send_index = select.send(&self.tx);
        select.recv(&stop);

        let oper = select.select();
        if oper.index() == send_index {
            oper.send(&self.tx, value).map_err(|err| err.into_inner())
        } else {
            let _ = oper.recv(&stop);
            Err(value)
        }
    }

    /// ### English
    /// Dequeues without blocking.
    ///
    /// ### 中文
    /// 非阻塞出队。
    pub(crate) fn try_take(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// ### English
    /// Dequeues, waiting up to `timeout`. `Ok(None)` on expiry, `Err(Cancelled)` on cancellation.
    ///
    /// ### 中文
    /// 出队，最多等待 `timeout`；超时返回 `Ok(None)`，被取消返回 `Err(Cancelled)`。
    pub(crate) fn take_timeout(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Option<T>, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if let Some(value) = self.try_take() {
            return Ok(Some(value));
        }
        if timeout.is_zero() {
            return Ok(None);
        }

        let stop = cancel.receiver();
        let mut select = Select::new();
        let recv_index = select.recv(&self.rx);
        select.recv(&stop);

        match select.select_timeout(timeout) {
            Err(_) => Ok(None),
            Ok(oper) if oper.index() == recv_index => Ok(oper.recv(&self.rx).ok()),
            Ok(oper) => {
                let _ = oper.recv(&stop);
                Err(Cancelled)
            }
        }
    }

    /// ### English
    /// Removes every queued item in FIFO order.
    ///
    /// ### 中文
    /// 按 FIFO 顺序取出所有排队元素。
    pub(crate) fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn preserves_fifo_order() {
        let channel = BoundedChannel::with_capacity(4);
        let cancel = CancelToken::new();
        for i in 0..4 {
            channel.put(i, &cancel).unwrap();
        }
        assert_eq!(channel.len(), 4);
        assert_eq!(channel.drain(), vec![0, 1, 2, 3]);
        assert_eq!(channel.len(), 0);
    }

    #[test]
    fn try_put_returns_value_when_full() {
        let channel = BoundedChannel::with_capacity(1);
        channel.try_put("a").unwrap();
        assert_eq!(channel.try_put("b"), Err("b"));
        assert_eq!(channel.len(), 1);
        assert_eq!(channel.capacity(), 1);
    }

    #[test]
    fn put_blocks_until_space() {
        let channel = Arc::new(BoundedChannel::with_capacity(1));
        let cancel = Arc::new(CancelToken::new());
        channel.put(1, &cancel).unwrap();

        let worker = {
            let channel = channel.clone();
            let cancel = cancel.clone();
            thread::spawn(move || channel.put(2, &cancel))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!worker.is_finished());
        assert_eq!(channel.try_take(), Some(1));
        assert_eq!(worker.join().unwrap(), Ok(()));
        assert_eq!(channel.try_take(), Some(2));
    }

    #[test]
    fn cancel_releases_blocked_put_with_value() {
        let channel = Arc::new(BoundedChannel::with_capacity(1));
        let cancel = Arc::new(CancelToken::new());
        channel.put(1, &cancel).unwrap();

        let worker = {
            let channel = channel.clone();
            let cancel = cancel.clone();
            thread::spawn(move || channel.put(2, &cancel))
        };

        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        assert_eq!(worker.join().unwrap(), Err(2));
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn take_timeout_expires() {
        let channel = BoundedChannel::<u8>::with_capacity(1);
        let cancel = CancelToken::new();
        let start = Instant::now();
        assert_eq!(channel.take_timeout(Duration::from_millis(20), &cancel), Ok(None));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn take_timeout_observes_cancel() {
        let channel = Arc::new(BoundedChannel::<u8>::with_capacity(1));
        let cancel = Arc::new(CancelToken::new());

        let worker = {
            let channel = channel.clone();
            let cancel = cancel.clone();
            thread::spawn(move || channel.take_timeout(Duration::from_secs(30), &cancel))
        };

        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        assert_eq!(worker.join().unwrap(), Err(Cancelled));
    }
}
