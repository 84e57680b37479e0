use parking_lot::{Condvar, Mutex};

/// Fixed ring of slots. `head` is the next slot to take from.
struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
    closed: bool,
}

impl<T> Ring<T> {
    fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }
}

/// Bounded multi-producer, multi-consumer queue.
///
/// `push` blocks while every slot is taken. After [`close`](Self::close),
/// pushes are refused but consumers keep draining what is already queued.
pub(crate) struct TaskQueue<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> TaskQueue<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                slots: std::iter::repeat_with(|| None).take(capacity).collect(),
                head: 0,
                len: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Enqueue `item`, waiting for a free slot. Hands the item back if the
    /// queue is or becomes closed.
    pub(crate) fn push(&self, item: T) -> Result<(), T> {
        let mut ring = self.ring.lock();
        while ring.is_full() && !ring.closed {
            self.not_full.wait(&mut ring);
        }
        if ring.closed {
            return Err(item);
        }
        let capacity = ring.slots.len();
        let tail = (ring.head + ring.len) % capacity;
        ring.slots[tail] = Some(item);
        ring.len += 1;
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the oldest item, waiting for one. `None` once the queue is closed
    /// and empty.
    pub(crate) fn pop(&self) -> Option<T> {
        let mut ring = self.ring.lock();
        loop {
            if ring.len > 0 {
                let head = ring.head;
                let item = ring.slots[head].take();
                ring.head = (head + 1) % ring.slots.len();
                ring.len -= 1;
                drop(ring);
                self.not_full.notify_one();
                return item;
            }
            if ring.closed {
                return None;
            }
            self.not_empty.wait(&mut ring);
        }
    }

    pub(crate) fn close(&self) {
        self.ring.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub(crate) fn len(&self) -> usize {
        self.ring.lock().len
    }
}
