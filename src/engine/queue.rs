// src/engine/queue.rs
//
// Fixed-capacity blocking FIFO handing row-range tasks from the dispatcher to
// the worker pool.
//
// A monitor: one mutex over the ring buffer plus two condition variables,
// `not_empty` (items available) and `not_full` (slots available). Waiting on
// a condvar releases the mutex, so a producer blocked on a full queue never
// holds the lock consumers need to make room.
//
// Shutdown is an explicit state, not a sentinel task: once closed, `pop()`
// drains whatever is left and then returns `None`, so a worker can tell
// "no more work" apart from "a task is ready".

use crate::error::{GrayPoolError, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;

/// Returned by [`BoundedTaskQueue::push`] when the queue was closed. Carries
/// the rejected task back to the caller.
#[derive(PartialEq, Eq)]
pub struct Closed<T>(pub T);

impl<T> fmt::Debug for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Closed(..)")
    }
}

impl<T> fmt::Display for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("push on a closed task queue")
    }
}

impl<T> std::error::Error for Closed<T> {}

#[derive(Debug)]
struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    count: usize,
    closed: bool,
}

impl<T> Ring<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    fn put(&mut self, item: T) {
        debug_assert!(self.count < self.capacity());
        debug_assert!(self.slots[self.tail].is_none());
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity();
        self.count += 1;
    }

    fn take(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        debug_assert!(item.is_some());
        self.head = (self.head + 1) % self.capacity();
        self.count -= 1;
        item
    }
}

/// Bounded multi-producer, multi-consumer task queue.
#[derive(Debug)]
pub struct BoundedTaskQueue<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedTaskQueue<T> {
    /// Create a queue holding at most `capacity` tasks. Zero is rejected:
    /// a zero-slot queue would block the first `push` forever.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(GrayPoolError::invalid_argument(
                "queue_capacity",
                "0",
                "Queue capacity must be at least 1",
            ));
        }
        let slots = std::iter::repeat_with(|| None).take(capacity).collect();
        Ok(Self {
            ring: Mutex::new(Ring {
                slots,
                head: 0,
                tail: 0,
                count: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    /// Insert `task` at the tail, blocking while the queue is full.
    ///
    /// Hands the task back if the queue is (or becomes, while waiting) closed.
    pub fn push(&self, task: T) -> std::result::Result<(), Closed<T>> {
        let mut ring = self.ring.lock();
        while ring.is_full() && !ring.closed {
            self.not_full.wait(&mut ring);
        }
        if ring.closed {
            return Err(Closed(task));
        }
        ring.put(task);
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the head task, blocking while the queue is empty.
    ///
    /// Returns `None` only once the queue is closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut ring = self.ring.lock();
        loop {
            if let Some(task) = ring.take() {
                drop(ring);
                self.not_full.notify_one();
                return Some(task);
            }
            if ring.closed {
                return None;
            }
            self.not_empty.wait(&mut ring);
        }
    }

    /// Non-blocking variant of [`pop`](Self::pop).
    pub fn try_pop(&self) -> Option<T> {
        let task = self.ring.lock().take();
        if task.is_some() {
            self.not_full.notify_one();
        }
        task
    }

    /// Close the queue and wake every blocked producer and consumer.
    ///
    /// Returns the tasks that were still queued; they are removed so no
    /// worker will receive them. Called after the completion barrier fired,
    /// the returned vector is empty. Closing twice is harmless.
    pub fn try_close_and_drain(&self) -> Vec<T> {
        let mut ring = self.ring.lock();
        ring.closed = true;
        let mut leftover = Vec::with_capacity(ring.count);
        while let Some(task) = ring.take() {
            leftover.push(task);
        }
        drop(ring);
        self.not_empty.notify_all();
        self.not_full.notify_all();
        leftover
    }

    pub fn len(&self) -> usize {
        self.ring.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.ring.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(BoundedTaskQueue::<u32>::new(0).is_err());
    }

    #[test]
    fn test_fifo_order_and_wraparound() {
        let q = BoundedTaskQueue::new(3).unwrap();
        for round in 0..4u32 {
            for i in 0..3 {
                q.push(round * 10 + i).unwrap();
            }
            assert_eq!(q.len(), 3);
            for i in 0..3 {
                assert_eq!(q.pop(), Some(round * 10 + i));
            }
            assert!(q.is_empty());
        }
        let ring = q.ring.lock();
        assert!(ring.head < ring.capacity());
        assert!(ring.tail < ring.capacity());
    }

    #[test]
    fn test_try_pop_on_empty_returns_none() {
        let q = BoundedTaskQueue::<u8>::new(2).unwrap();
        assert_eq!(q.try_pop(), None);
        q.push(9).unwrap();
        assert_eq!(q.try_pop(), Some(9));
    }

    #[test]
    fn test_push_blocks_when_full_until_pop() {
        let q = Arc::new(BoundedTaskQueue::new(1).unwrap());
        q.push(1u32).unwrap();

        let (tx_started, rx_started) = mpsc::channel();
        let (tx_done, rx_done) = mpsc::channel();
        let q_push = Arc::clone(&q);
        let handle = thread::spawn(move || {
            tx_started.send(()).unwrap();
            q_push.push(2).unwrap(); // blocks: queue is full
            tx_done.send(()).unwrap();
        });

        rx_started
            .recv_timeout(Duration::from_secs(1))
            .expect("producer should start");
        assert!(rx_done.recv_timeout(Duration::from_millis(50)).is_err());

        assert_eq!(q.pop(), Some(1));
        rx_done
            .recv_timeout(Duration::from_secs(1))
            .expect("producer should finish after a slot frees");
        handle.join().unwrap();
        assert_eq!(q.pop(), Some(2));
    }

    #[test]
    fn test_close_wakes_blocked_consumers() {
        let q = Arc::new(BoundedTaskQueue::<u32>::new(4).unwrap());
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || q.pop())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        assert!(q.try_close_and_drain().is_empty());
        for h in handles {
            assert_eq!(h.join().unwrap(), None);
        }
    }

    #[test]
    fn test_close_returns_leftover_and_rejects_push() {
        let q = BoundedTaskQueue::new(4).unwrap();
        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.try_close_and_drain(), vec![1, 2]);
        assert!(q.is_closed());
        assert_eq!(q.push(3), Err(Closed(3)));
        assert_eq!(q.pop(), None);
        assert!(q.try_close_and_drain().is_empty());
    }

    #[test]
    fn test_close_releases_blocked_producer() {
        let q = Arc::new(BoundedTaskQueue::new(1).unwrap());
        q.push(1u32).unwrap();
        let q_push = Arc::clone(&q);
        let handle = thread::spawn(move || q_push.push(2));
        thread::sleep(Duration::from_millis(20));
        let leftover = q.try_close_and_drain();
        assert_eq!(leftover, vec![1]);
        assert_eq!(handle.join().unwrap(), Err(Closed(2)));
    }

    #[test]
    fn test_each_task_delivered_exactly_once() {
        const PRODUCERS: usize = 3;
        const PER_PRODUCER: usize = 500;
        const CONSUMERS: usize = 4;

        let q = Arc::new(BoundedTaskQueue::<usize>::new(2).unwrap());
        let seen: Arc<Vec<AtomicUsize>> = Arc::new(
            (0..PRODUCERS * PER_PRODUCER)
                .map(|_| AtomicUsize::new(0))
                .collect(),
        );

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let q = Arc::clone(&q);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    while let Some(id) = q.pop() {
                        seen[id].fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        q.push(p * PER_PRODUCER + i).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        // Wait for consumers to drain before closing, mirroring the dispatcher.
        while !q.is_empty() {
            thread::yield_now();
        }
        q.try_close_and_drain();
        for c in consumers {
            c.join().unwrap();
        }

        assert!(seen.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }
}
