use std::cmp::Ordering;
use std::time::Instant;

use super::FrameCallback;

/// ### English
/// One scheduled callback stored in a deadline heap.
///
/// `BinaryHeap` is a max-heap, so `Ord` is reversed to pop the earliest deadline first.
///
/// ### 中文
/// 存储在 deadline 堆中的单个调度回调。
///
/// `BinaryHeap` 是最大堆，因此在 `Ord` 中反转排序，以便先弹出最早的 deadline。
pub(super) struct ScheduledTask {
    pub(super) deadline: Instant,
    /// ### English
    /// Monotonic sequence used as a tiebreaker (FIFO for equal deadlines).
    ///
    /// ### 中文
    /// 单调序号，用作平局判定（相同 deadline 时保持 FIFO）。
    pub(super) seq: u64,
    pub(super) callback: FrameCallback,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.deadline.cmp(&self.deadline) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}
