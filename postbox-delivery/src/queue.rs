//! Delivery queue management.

use std::{collections::BinaryHeap, time::SystemTime};

use parking_lot::Mutex;
use postbox_common::Message;
use serde::{Deserialize, Serialize};

/// Dequeue ordering for the delivery queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOrder {
    /// Lower priority value first; ties broken by insertion order.
    #[default]
    Priority,
    /// Strict insertion order; submission priority is ignored.
    Fifo,
}

/// A message admitted to the delivery queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// The message awaiting delivery.
    pub message: Message,
    /// Submission priority; lower is more urgent.
    pub priority: i32,
    /// Delivery attempts made so far.
    pub attempts: u32,
    /// When the message was first admitted, for diagnostics.
    pub queued_at: SystemTime,
    seq: u64,
}

#[derive(Debug)]
struct HeapSlot {
    rank: (i32, u64),
    entry: QueueEntry,
}

impl PartialEq for HeapSlot {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank
    }
}

impl Eq for HeapSlot {}

impl PartialOrd for HeapSlot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapSlot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; invert so the smallest rank pops first
        other.rank.cmp(&self.rank)
    }
}

#[derive(Debug, Default)]
struct Inner {
    heap: BinaryHeap<HeapSlot>,
    next_seq: u64,
}

/// Ordered, unbounded queue of pending messages.
///
/// Decoupled from the worker loop: enqueue never blocks or fails, and
/// dequeue returns immediately with `None` when nothing is pending.
/// The interior lock is held only around heap operations, never across
/// a suspension point, so the queue is safe to use from async context.
#[derive(Debug)]
pub struct DeliveryQueue {
    order: QueueOrder,
    inner: Mutex<Inner>,
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new(QueueOrder::Priority)
    }
}

impl DeliveryQueue {
    /// Create a new empty queue with the given ordering.
    #[must_use]
    pub fn new(order: QueueOrder) -> Self {
        Self {
            order,
            inner: Mutex::new(Inner::default()),
        }
    }

    const fn rank(&self, entry: &QueueEntry) -> (i32, u64) {
        match self.order {
            QueueOrder::Priority => (entry.priority, entry.seq),
            QueueOrder::Fifo => (0, entry.seq),
        }
    }

    /// Admit a new message.
    pub fn enqueue(&self, message: Message, priority: i32) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let entry = QueueEntry {
            message,
            priority,
            attempts: 0,
            queued_at: SystemTime::now(),
            seq,
        };
        let rank = self.rank(&entry);
        inner.heap.push(HeapSlot { rank, entry });
    }

    /// Put a transiently-failed entry back.
    ///
    /// The entry keeps its original priority and admission sequence, so
    /// it goes ahead of same-priority messages that arrived later.
    pub fn requeue(&self, entry: QueueEntry) {
        let rank = self.rank(&entry);
        self.inner.lock().heap.push(HeapSlot { rank, entry });
    }

    /// Remove and return the most urgent entry, or `None` when empty.
    #[must_use]
    pub fn dequeue(&self) -> Option<QueueEntry> {
        self.inner.lock().heap.pop().map(|slot| slot.entry)
    }

    /// Number of messages waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Check whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// Remove every entry, in delivery order.
    #[must_use]
    pub fn drain(&self) -> Vec<QueueEntry> {
        let mut inner = self.inner.lock();
        let mut entries = Vec::with_capacity(inner.heap.len());
        while let Some(slot) = inner.heap.pop() {
            entries.push(slot.entry);
        }
        entries
    }
}
