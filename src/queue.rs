use crate::error::{PipelineError, QueueClosed, Result};
use crate::signal::Signal;
use parking_lot::Mutex;

/// Ring buffer bookkeeping, guarded by the queue mutex
#[derive(Debug)]
struct QueueState<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    size: usize,
    finished: bool,
}

/// A fixed-capacity FIFO with blocking `put`/`get` and a one-way finished flag
///
/// The mutex only covers O(1) ring bookkeeping and is never held across a blocking wait.
/// Blocking is delegated to three [`Signal`]s: not-full (producers), not-empty (the
/// consumer) and finished (external observers).
#[derive(Debug)]
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    not_full: Signal,
    not_empty: Signal,
    finished: Signal,
}

impl<T> BoundedQueue<T> {
    /// Create a new queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::Config(
                "queue capacity must be greater than 0".into(),
            ));
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| PipelineError::Allocation { capacity })?;
        slots.resize_with(capacity, || None);

        Ok(Self {
            state: Mutex::new(QueueState {
                slots,
                head: 0,
                tail: 0,
                size: 0,
                finished: false,
            }),
            capacity,
            not_full: Signal::new(),
            not_empty: Signal::new(),
            finished: Signal::new(),
        })
    }

    /// Append an item, blocking while the queue is full
    ///
    /// Fails with [`QueueClosed`] if the queue is already finished, or becomes finished
    /// while this call is waiting for space. The refused item is returned inside the error.
    pub fn put(&self, item: T) -> std::result::Result<(), QueueClosed<T>> {
        let mut state = self.state.lock();
        if state.finished {
            return Err(QueueClosed(item));
        }

        while state.size == self.capacity {
            drop(state);
            self.not_full.wait();
            state = self.state.lock();
            if state.finished {
                return Err(QueueClosed(item));
            }
        }

        let tail = state.tail;
        state.slots[tail] = Some(item);
        state.tail = (tail + 1) % self.capacity;
        state.size += 1;

        // Pass the wakeup on to any other parked producer
        if state.size < self.capacity {
            self.not_full.raise();
        }
        self.not_empty.raise();
        Ok(())
    }

    /// Remove the head item, blocking while the queue is empty and still open
    ///
    /// Returns `None` once the queue is finished and every buffered item has been taken.
    pub fn get(&self) -> Option<T> {
        let mut state = self.state.lock();
        while state.size == 0 {
            if state.finished {
                return None;
            }
            drop(state);
            self.not_empty.wait();
            state = self.state.lock();
        }

        let head = state.head;
        let item = state.slots[head].take();
        state.head = (head + 1) % self.capacity;
        state.size -= 1;

        if state.size > 0 {
            self.not_empty.raise();
        }
        self.not_full.raise();
        item
    }

    /// Mark the queue finished and release every waiter
    ///
    /// Producers blocked in `put` fail with [`QueueClosed`]; the consumer keeps receiving
    /// buffered items until the queue is empty, then observes end-of-stream. Idempotent.
    pub fn signal_finished(&self) {
        let mut state = self.state.lock();
        state.finished = true;
        // Latching instead of raising: a single-slot raise could be swallowed by a thread
        // that is between its finished check and parking, or wake only one of several waiters.
        self.finished.latch();
        self.not_empty.latch();
        self.not_full.latch();
    }

    /// Block until [`signal_finished`](Self::signal_finished) has been called
    pub fn wait_until_finished(&self) {
        self.finished.wait();
    }

    /// Take every item still buffered, in FIFO order
    pub fn drain_remaining(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let mut items = Vec::with_capacity(state.size);
        while state.size > 0 {
            let head = state.head;
            if let Some(item) = state.slots[head].take() {
                items.push(item);
            }
            state.head = (head + 1) % self.capacity;
            state.size -= 1;
        }
        self.not_full.raise();
        items
    }

    /// Get the current number of buffered items
    pub fn len(&self) -> usize {
        self.state.lock().size
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the capacity of the queue
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the queue has been finished
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Get the utilization of the queue as a percentage (0-100)
    pub fn utilization(&self) -> u32 {
        ((self.len() * 100) / self.capacity).min(100) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_queue_fifo() {
        let queue = BoundedQueue::new(10).unwrap();
        for i in 0..10 {
            queue.put(i).unwrap();
        }
        for i in 0..10 {
            assert_eq!(queue.get(), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ring_wraps_around() {
        let queue = BoundedQueue::new(3).unwrap();
        for round in 0..5 {
            queue.put(round * 2).unwrap();
            queue.put(round * 2 + 1).unwrap();
            assert_eq!(queue.get(), Some(round * 2));
            assert_eq!(queue.get(), Some(round * 2 + 1));
        }
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = BoundedQueue::<String>::new(0);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_utilization() {
        let queue = BoundedQueue::new(10).unwrap();
        for i in 0..5 {
            queue.put(i).unwrap();
        }
        assert_eq!(queue.utilization(), 50);
        assert_eq!(queue.capacity(), 10);
    }

    #[test]
    fn test_put_blocks_when_full() {
        let queue = Arc::new(BoundedQueue::new(2).unwrap());
        queue.put(1).unwrap();
        queue.put(2).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.put(3))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.get(), Some(1));
        producer.join().unwrap().unwrap();
        assert_eq!(queue.get(), Some(2));
        assert_eq!(queue.get(), Some(3));
    }

    #[test]
    fn test_put_after_finish_returns_record() {
        let queue = BoundedQueue::new(4).unwrap();
        queue.signal_finished();
        let err = queue.put(String::from("late")).unwrap_err();
        assert_eq!(err.into_inner(), "late");
    }

    #[test]
    fn test_get_drains_buffered_items_after_finish() {
        let queue = BoundedQueue::new(4).unwrap();
        queue.put("a").unwrap();
        queue.put("b").unwrap();
        queue.signal_finished();
        queue.signal_finished();

        assert!(queue.put("c").is_err());
        assert_eq!(queue.get(), Some("a"));
        assert_eq!(queue.get(), Some("b"));
        assert_eq!(queue.get(), None);
        assert_eq!(queue.get(), None);
    }

    #[test]
    fn test_finish_releases_every_blocked_producer() {
        let queue = Arc::new(BoundedQueue::new(1).unwrap());
        queue.put(0).unwrap();

        let producers: Vec<_> = (1..=4)
            .map(|i| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.put(i))
            })
            .collect();
        thread::sleep(Duration::from_millis(50));

        queue.signal_finished();
        for producer in producers {
            assert!(producer.join().unwrap().is_err());
        }
        assert_eq!(queue.get(), Some(0));
        assert_eq!(queue.get(), None);
    }

    #[test]
    fn test_finish_releases_blocked_consumer() {
        let queue = Arc::new(BoundedQueue::<u32>::new(4).unwrap());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.get())
        };
        thread::sleep(Duration::from_millis(20));
        queue.signal_finished();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_wait_until_finished() {
        let queue = Arc::new(BoundedQueue::<u32>::new(4).unwrap());
        let observers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.wait_until_finished())
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        assert!(observers.iter().all(|o| !o.is_finished()));

        queue.signal_finished();
        for observer in observers {
            observer.join().unwrap();
        }
        // Already finished: returns immediately
        queue.wait_until_finished();
    }

    #[test]
    fn test_finish_races_parking_consumer() {
        // A finish raised while the consumer sits between its finished check and parking
        // must still wake it.
        for _ in 0..500 {
            let queue = Arc::new(BoundedQueue::<u32>::new(2).unwrap());
            let consumer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || while queue.get().is_some() {})
            };
            queue.put(1).unwrap();
            queue.signal_finished();
            consumer.join().unwrap();
        }
    }

    #[test]
    fn test_concurrent_producer_consumer_preserves_order() {
        let queue = Arc::new(BoundedQueue::new(8).unwrap());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    queue.put(i).unwrap();
                }
                queue.signal_finished();
            })
        };

        let mut expected = 0;
        while let Some(item) = queue.get() {
            assert_eq!(item, expected);
            assert!(queue.len() <= 8);
            expected += 1;
        }
        producer.join().unwrap();
        assert_eq!(expected, 10_000);
    }

    #[test]
    fn test_multiple_producers_lose_nothing() {
        let queue = Arc::new(BoundedQueue::new(4).unwrap());
        let producers: Vec<_> = (0..3u32)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..1_000u32 {
                        queue.put((p, i)).unwrap();
                    }
                })
            })
            .collect();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut last = [None::<u32>; 3];
                let mut count = 0;
                while let Some((p, i)) = queue.get() {
                    let slot = &mut last[p as usize];
                    assert!(slot.map_or(true, |prev| prev + 1 == i));
                    *slot = Some(i);
                    count += 1;
                }
                count
            })
        };

        for producer in producers {
            producer.join().unwrap();
        }
        queue.signal_finished();
        assert_eq!(consumer.join().unwrap(), 3_000);
    }

    #[test]
    fn test_drain_remaining() {
        let queue = BoundedQueue::new(3).unwrap();
        queue.put(1).unwrap();
        queue.put(2).unwrap();
        assert_eq!(queue.drain_remaining(), vec![1, 2]);
        assert!(queue.is_empty());
    }
}
