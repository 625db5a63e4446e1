use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;

/// What a dequeue observes.
///
/// `End` is an ordinary queued marker that terminates one logical sequence (a message body),
/// more items may follow it. `Closed` is sticky: once the queue is closed and every buffered
/// slot has been taken, every dequeue yields `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    Item(T),
    End,
    Closed,
}

/// An unbounded FIFO with non-blocking enqueue and suspending dequeue.
///
/// The queue itself never applies backpressure; callers bound its depth by pausing the
/// producer.
#[derive(Debug)]
pub struct AsyncQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Notify,
}

#[derive(Debug)]
struct Inner<T> {
    slots: VecDeque<Slot<T>>,
    closed: bool,
}

impl<T> AsyncQueue<T> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { slots: VecDeque::new(), closed: false }), available: Notify::new() }
    }

    pub fn enqueue(&self, item: T) {
        self.push(Slot::Item(item));
    }

    /// Enqueues the end marker of the current sequence.
    pub fn enqueue_end(&self) {
        self.push(Slot::End);
    }

    fn push(&self, slot: Slot<T>) {
        {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.slots.push_back(slot);
        }
        self.available.notify_one();
    }

    /// Closes the queue and wakes every waiting consumer.
    ///
    /// Slots enqueued before closing are still delivered in order.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_waiters();
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns the next slot if one is ready, without suspending.
    pub fn try_dequeue(&self) -> Option<Slot<T>> {
        let mut inner = self.lock();
        match inner.slots.pop_front() {
            Some(slot) => Some(slot),
            None if inner.closed => Some(Slot::Closed),
            None => None,
        }
    }

    /// Suspends until a slot is available and returns it.
    pub async fn dequeue(&self) -> Slot<T> {
        loop {
            let available = self.available.notified();
            tokio::pin!(available);
            available.as_mut().enable();

            if let Some(slot) = self.try_dequeue() {
                // another consumer may be waiting on the same wakeup
                if !self.lock().slots.is_empty() {
                    self.available.notify_one();
                }
                return slot;
            }

            available.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().slots.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_order_with_end_markers() {
        let queue = AsyncQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue_end();
        queue.enqueue(3);

        assert_eq!(queue.dequeue().await, Slot::Item(1));
        assert_eq!(queue.dequeue().await, Slot::Item(2));
        assert_eq!(queue.dequeue().await, Slot::End);
        assert_eq!(queue.dequeue().await, Slot::Item(3));
        assert!(queue.dequeue().now_or_never().is_none());
    }

    #[tokio::test]
    async fn dequeue_waits_for_enqueue() {
        let queue = Arc::new(AsyncQueue::new());

        let consumer = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.dequeue().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue("hello");

        assert_eq!(consumer.await.unwrap(), Slot::Item("hello"));
    }

    #[tokio::test]
    async fn close_wakes_every_waiter() {
        let queue = Arc::new(AsyncQueue::<u8>::new());

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.dequeue().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();

        for waiter in waiters {
            let slot = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
            assert_eq!(slot, Slot::Closed);
        }
    }

    #[tokio::test]
    async fn close_delivers_buffered_slots_first() {
        let queue = AsyncQueue::new();
        queue.enqueue(7);
        queue.enqueue_end();
        queue.close();
        queue.enqueue(8);

        assert!(queue.is_closed());
        assert_eq!(queue.dequeue().await, Slot::Item(7));
        assert_eq!(queue.dequeue().await, Slot::End);
        assert_eq!(queue.dequeue().await, Slot::Closed);
        assert_eq!(queue.try_dequeue(), Some(Slot::Closed));
    }
}
