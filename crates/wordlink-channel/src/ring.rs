use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use wordlink_frame::Word;

use crate::error::Violation;

struct RingState {
    slots: Box<[Word]>,
    head: usize,
    tail: usize,
    closed: bool,
}

impl RingState {
    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn is_full(&self) -> bool {
        (self.head + 1) % self.slots.len() == self.tail
    }

    fn len(&self) -> usize {
        (self.head + self.slots.len() - self.tail) % self.slots.len()
    }

    fn take(&mut self) -> Option<Word> {
        if self.is_empty() {
            return None;
        }
        let word = self.slots[self.tail];
        self.tail = (self.tail + 1) % self.slots.len();
        Some(word)
    }
}

/// Bounded receive buffer between the receiver loop and the reader.
///
/// Holds up to `capacity` words in `capacity + 1` slots; `head == tail` means
/// empty. One producer pushes and one consumer pops; either side may run on
/// its own thread without outside locking.
pub struct WordRingBuffer {
    state: Mutex<RingState>,
    not_empty: Condvar,
    capacity: usize,
}

impl WordRingBuffer {
    /// Create an empty buffer holding up to `capacity` words.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                slots: vec![0; capacity + 1].into_boxed_slice(),
                head: 0,
                tail: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a word.
    ///
    /// Fails with [`Violation::RingOverflow`] when full. With correct credit
    /// accounting on the sender this cannot happen.
    pub fn push(&self, word: Word) -> Result<(), Violation> {
        let mut state = self.lock();
        if state.is_full() {
            return Err(Violation::RingOverflow {
                capacity: self.capacity,
            });
        }
        let head = state.head;
        state.slots[head] = word;
        state.head = (head + 1) % state.slots.len();
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest word, if any.
    pub fn pop(&self) -> Option<Word> {
        self.lock().take()
    }

    /// Wait for a word.
    ///
    /// Returns `None` only once the buffer is closed and fully drained.
    pub fn pop_blocking(&self) -> Option<Word> {
        let mut state = self.lock();
        loop {
            if let Some(word) = state.take() {
                return Some(word);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Whether no words are buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `capacity` words are buffered; the next push would overflow.
    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// Words currently buffered.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Usable slots, one fewer than allocated.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop accepting waits; wakes a blocked reader. Buffered words can
    /// still be popped.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
    }

    /// Whether [`WordRingBuffer::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl std::fmt::Debug for WordRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("WordRingBuffer")
            .field("len", &state.len())
            .field("capacity", &self.capacity)
            .field("head", &state.head)
            .field("tail", &state.tail)
            .finish()
    }
}
