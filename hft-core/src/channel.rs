//! A bounded, multi-producer single-consumer channel with a drop-oldest
//! backpressure policy, used everywhere §5 calls for bounded delivery that
//! must never block an upstream producer: Feeds' tick/book fan-out and
//! OMS's order-update channel.
//!
//! Built on `crossbeam::queue::ArrayQueue`, the same lock-free ring buffer
//! the teacher crate reaches for in its object-pool code
//! (`perf::pools`/`execution::simulated`'s fill queue), paired with a
//! `tokio::sync::Notify` so an async consumer can wait instead of polling.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Shared<T> {
    queue: ArrayQueue<T>,
    notify: Notify,
    dropped: AtomicU64,
    closed: std::sync::atomic::AtomicBool,
}

pub struct DropOldestSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for DropOldestSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

pub struct DropOldestReceiver<T> {
    shared: Arc<Shared<T>>,
}

/// Creates a bounded drop-oldest channel with the given capacity.
pub fn drop_oldest_channel<T>(capacity: usize) -> (DropOldestSender<T>, DropOldestReceiver<T>) {
    let shared = Arc::new(Shared {
        queue: ArrayQueue::new(capacity.max(1)),
        notify: Notify::new(),
        dropped: AtomicU64::new(0),
        closed: std::sync::atomic::AtomicBool::new(false),
    });
    (
        DropOldestSender {
            shared: shared.clone(),
        },
        DropOldestReceiver { shared },
    )
}

impl<T> DropOldestSender<T> {
    /// Pushes an item. If the channel is full, evicts the oldest buffered
    /// item to make room and returns `true` to indicate a drop occurred.
    pub fn send(&self, item: T) -> bool {
        let mut dropped = false;
        let mut item = item;
        loop {
            match self.shared.queue.push(item) {
                Ok(()) => break,
                Err(rejected) => {
                    item = rejected;
                    self.shared.queue.pop();
                    dropped = true;
                }
            }
        }
        if dropped {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.notify.notify_one();
        dropped
    }

    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Drop for DropOldestSender<T> {
    fn drop(&mut self) {
        if Arc::strong_count(&self.shared) <= 2 {
            self.shared.closed.store(true, Ordering::Release);
            self.shared.notify.notify_waiters();
        }
    }
}

impl<T> DropOldestReceiver<T> {
    /// Waits for and returns the next item, or `None` once every sender has
    /// been dropped and the buffer is drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.shared.queue.pop() {
                return Some(item);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
