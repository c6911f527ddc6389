//! ### English
//! Producer driver: runs a `FrameSource` on a dedicated decode thread, looping the stream until
//! stopped, and feeds the pump through a `FramePool`.
//!
//! ### 中文
//! 生产者驱动：在专用解码线程上运行 `FrameSource`，循环播放直到停止，并通过 `FramePool` 向帧泵供帧。

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, Sender};

use crate::engine::config::PlaybackConfig;
use crate::engine::error::{Cancelled, ConfigError, FrameError, PlaybackError};
use crate::engine::frame::{FrameSize, FrameSlot};
use crate::engine::pool::FramePool;
use crate::engine::pump::FramePump;

/// ### English
/// Capacity of the error and buffering channels returned by `Playback`.
///
/// ### 中文
/// `Playback` 所返回的错误通道与缓冲状态通道的容量。
const EVENT_CHANNEL_CAPACITY: usize = 8;

/// ### English
/// `running` value while no session is active.
///
/// ### 中文
/// 没有活动会话时 `running` 的取值。
const STOPPED: u64 = 0;

/// ### English
/// A decoder that produces frames. `play_once` decodes the whole stream one time.
///
/// ### 中文
/// 产出帧的解码器。`play_once` 完整解码一遍流。
pub trait FrameSource: Send + 'static {
    fn play_once(&mut self, ctx: &mut PlaybackContext<'_>) -> anyhow::Result<()>;
}

struct PlaybackShared {
    pump: FramePump,
    config: PlaybackConfig,
    /// ### English
    /// Id of the running session, or `STOPPED`. A decode thread only acts while this still holds
    /// its own id, so a thread left over from a stopped session never touches a newer one.
    ///
    /// ### 中文
    /// 正在运行的会话 id，或 `STOPPED`。解码线程只在其值仍为自己的 id 时才会动作，
    /// 因此已停止会话遗留的线程永远不会影响新的会话。
    running: AtomicU64,
    next_session: AtomicU64,
    paused: AtomicBool,
    buffering: AtomicBool,
    video_size: Mutex<Option<FrameSize>>,
    position: Mutex<Duration>,
    duration: Mutex<Option<Duration>>,
    errors_tx: Sender<anyhow::Error>,
    errors_rx: Receiver<anyhow::Error>,
    buffering_tx: Sender<bool>,
    buffering_rx: Receiver<bool>,
}

impl PlaybackShared {
    #[inline]
    fn is_current(&self, session: u64) -> bool {
        self.running.load(Ordering::Acquire) == session
    }

    fn stop(&self) {
        self.paused.store(false, Ordering::Release);
        self.running.store(STOPPED, Ordering::Release);
        self.pump.cancel();
    }

    /// ### English
    /// Stops playback only if `session` is still the running one.
    ///
    /// ### 中文
    /// 仅当 `session` 仍是正在运行的会话时才停止播放。
    fn stop_session(&self, session: u64) {
        if self
            .running
            .compare_exchange(session, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.paused.store(false, Ordering::Release);
            self.pump.cancel();
        }
    }

    /// ### English
    /// Publishes a buffering change; repeated values are not re-sent.
    ///
    /// ### 中文
    /// 发布缓冲状态变化；重复的值不会再次发送。
    fn set_buffering(&self, buffering: bool) {
        if self.buffering.swap(buffering, Ordering::AcqRel) != buffering {
            tracing::debug!(buffering, "buffering state changed");
            let _ = self.buffering_tx.try_send(buffering);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// ### English
/// Producer-side view handed to `FrameSource::play_once`.
///
/// ### 中文
/// 交给 `FrameSource::play_once` 的生产者侧视图。
pub struct PlaybackContext<'a> {
    shared: &'a PlaybackShared,
    pool: &'a mut FramePool,
    session: u64,
}

impl PlaybackContext<'_> {
    /// ### English
    /// Gets a frame buffer of `size`, reusing recycled frames once the pool budget is spent.
    ///
    /// ### 中文
    /// 获取一个 `size` 大小的帧缓冲；帧池预算用尽后复用已回收的帧。
    pub fn request_frame(&mut self, size: FrameSize) -> Result<FrameSlot, PlaybackError> {
        self.ensure_running()?;
        Ok(self.pool.request(size)?)
    }

    /// ### English
    /// Queues a filled frame for display. After playback stopped the frame is kept for reuse and
    /// `PlaybackError::Stopped` is returned.
    ///
    /// ### 中文
    /// 将已填充的帧排队显示。播放停止后该帧被保留复用，并返回 `PlaybackError::Stopped`。
    pub fn publish(&mut self, frame: FrameSlot) -> Result<(), PlaybackError> {
        if !self.is_running() {
            self.pool.give_back(frame);
            return Err(PlaybackError::Stopped);
        }
        self.pool.publish(frame)?;
        Ok(())
    }

    pub fn give_back(&mut self, frame: FrameSlot) {
        self.pool.give_back(frame);
    }

    pub fn set_frame_delay(&self, delay: Duration) {
        self.shared.pump.set_frame_delay(delay);
    }

    pub fn report_size(&self, size: FrameSize) {
        *lock(&self.shared.video_size) = Some(size);
    }

    /// ### English
    /// Records the presentation time of the frame just decoded.
    ///
    /// ### 中文
    /// 记录刚解码帧的显示时间。
    pub fn report_position(&self, position: Duration) {
        *lock(&self.shared.position) = position;
    }

    /// ### English
    /// Records the stream length. The longest value reported so far is kept.
    ///
    /// ### 中文
    /// 记录流的时长；保留迄今上报的最大值。
    pub fn report_duration(&self, duration: Duration) {
        let mut known = lock(&self.shared.duration);
        *known = Some(known.map_or(duration, |known| known.max(duration)));
    }

    /// ### English
    /// Marks the source as waiting for input (`true`) or decoding again (`false`).
    ///
    /// ### 中文
    /// 标记 source 正在等待输入（`true`）或已恢复解码（`false`）。
    pub fn set_buffering(&self, buffering: bool) {
        if self.is_running() {
            self.shared.set_buffering(buffering);
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.shared.is_current(self.session)
    }

    pub fn ensure_running(&self) -> Result<(), PlaybackError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(PlaybackError::Stopped)
        }
    }

    /// ### English
    /// Sleeps while paused, freeing idle frames first. Fails once playback is stopped.
    ///
    /// ### 中文
    /// 暂停期间休眠，并先释放空闲帧；播放停止后返回错误。
    pub fn block_while_paused(&mut self) -> Result<(), PlaybackError> {
        if self.shared.paused.load(Ordering::Acquire) {
            self.pool.trim();
        }
        while self.shared.paused.load(Ordering::Acquire) {
            self.ensure_running()?;
            thread::sleep(self.shared.config.pause_poll());
        }
        self.ensure_running()
    }
}

fn is_stop_error(err: &anyhow::Error) -> bool {
    if let Some(err) = err.downcast_ref::<PlaybackError>() {
        return err.is_stop();
    }
    matches!(
        err.downcast_ref::<FrameError>(),
        Some(FrameError::Cancelled(_))
    ) || err.downcast_ref::<Cancelled>().is_some()
}

pub struct Playback {
    shared: Arc<PlaybackShared>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Playback {
    pub fn new(pump: FramePump, config: PlaybackConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (errors_tx, errors_rx) = channel::bounded(EVENT_CHANNEL_CAPACITY);
        let (buffering_tx, buffering_rx) = channel::bounded(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            shared: Arc::new(PlaybackShared {
                pump,
                config,
                running: AtomicU64::new(STOPPED),
                next_session: AtomicU64::new(STOPPED + 1),
                paused: AtomicBool::new(false),
                buffering: AtomicBool::new(false),
                video_size: Mutex::new(None),
                position: Mutex::new(Duration::ZERO),
                duration: Mutex::new(None),
                errors_tx,
                errors_rx,
                buffering_tx,
                buffering_rx,
            }),
            thread: Mutex::new(None),
        })
    }

    pub fn pump(&self) -> &FramePump {
        &self.shared.pump
    }

    /// ### English
    /// Starts (or unpauses) playback. While already running, `source` is dropped.
    ///
    /// A decode thread left over from a previous `stop()` is joined first; it can no longer affect
    /// the new session.
    ///
    /// ### 中文
    /// 开始（或取消暂停）播放；已在运行时 `source` 会被丢弃。
    ///
    /// 之前 `stop()` 遗留的解码线程会先被 join；它不会再影响新的会话。
    pub fn start<S: FrameSource>(&self, source: S) -> io::Result<()> {
        self.shared.paused.store(false, Ordering::Release);
        let session = self.shared.next_session.fetch_add(1, Ordering::Relaxed);
        if self
            .shared
            .running
            .compare_exchange(STOPPED, session, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let mut slot = lock(&self.thread);
        if let Some(previous) = slot.take() {
            let _ = previous.join();
        }
        self.shared.pump.resume();
        *lock(&self.shared.position) = Duration::ZERO;

        let pool = match FramePool::new(self.shared.pump.clone(), self.shared.config.pool.clone())
        {
            Ok(pool) => pool,
            Err(err) => {
                self.shared.stop_session(session);
                return Err(io::Error::new(io::ErrorKind::InvalidInput, err));
            }
        };
        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || run(shared, pool, source, session));

        match spawned {
            Ok(join) => {
                *slot = Some(join);
                Ok(())
            }
            Err(err) => {
                self.shared.stop_session(session);
                Err(err)
            }
        }
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    /// ### English
    /// Stops playback without waiting. Releases a producer blocked in the pump.
    ///
    /// ### 中文
    /// 停止播放但不等待；会释放阻塞在帧泵中的生产者。
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// ### English
    /// Stops playback and waits for the decode thread to exit.
    ///
    /// ### 中文
    /// 停止播放并等待解码线程退出。
    pub fn destroy(&self) {
        self.stop();
        let join = lock(&self.thread).take();
        if let Some(join) = join
            && join.thread().id() != thread::current().id()
        {
            let _ = join.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire) != STOPPED
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    pub fn video_size(&self) -> Option<FrameSize> {
        *lock(&self.shared.video_size)
    }

    pub fn position(&self) -> Duration {
        *lock(&self.shared.position)
    }

    /// ### English
    /// Stream length, `None` until the source reports it.
    ///
    /// ### 中文
    /// 流的时长；source 上报之前为 `None`。
    pub fn duration(&self) -> Option<Duration> {
        *lock(&self.shared.duration)
    }

    pub fn is_buffering(&self) -> bool {
        self.shared.buffering.load(Ordering::Acquire)
    }

    /// ### English
    /// Buffering state changes, without repeats. Playback ending publishes `false`.
    ///
    /// ### 中文
    /// 缓冲状态变化（不含重复值）。播放结束时会发布 `false`。
    pub fn buffering(&self) -> Receiver<bool> {
        self.shared.buffering_rx.clone()
    }

    /// ### English
    /// Source failures that ended playback.
    ///
    /// ### 中文
    /// 导致播放结束的 source 错误。
    pub fn errors(&self) -> Receiver<anyhow::Error> {
        self.shared.errors_rx.clone()
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn run<S: FrameSource>(
    shared: Arc<PlaybackShared>,
    mut pool: FramePool,
    mut source: S,
    session: u64,
) {
    tracing::info!(session, "playback started");

    while shared.is_current(session) {
        let mut ctx = PlaybackContext {
            shared: &shared,
            pool: &mut pool,
            session,
        };
        match source.play_once(&mut ctx) {
            Ok(()) => {}
            Err(err) if is_stop_error(&err) => {
                // Also covers a pump cancelled directly by the host.
                shared.stop_session(session);
                break;
            }
            Err(err) => {
                let reportable =
                    shared.is_current(session) && !shared.paused.load(Ordering::Acquire);
                if reportable {
                    tracing::warn!(session, error = %err, "frame source failed");
                    let _ = shared.errors_tx.try_send(err);
                }
                shared.stop_session(session);
                break;
            }
        }
    }

    shared.set_buffering(false);
    let released = pool.release_all();
    tracing::info!(session, released, "playback finished");
}
