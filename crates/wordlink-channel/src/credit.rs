use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{ChannelError, Result, Violation};

struct GateState {
    count: usize,
    closed: bool,
}

/// Transmit credit window.
///
/// Starts full at `window` credits. A writer takes one credit per data word
/// sent; the receiver loop returns one per token frame received. The count
/// never exceeds `window`.
///
/// Designed for a single blocked writer. With several writers each release
/// wakes one of them, but no ordering between them is promised.
pub struct CreditGate {
    state: Mutex<GateState>,
    available: Condvar,
    window: usize,
}

impl CreditGate {
    /// Create a gate holding a full window of credit.
    pub fn new(window: usize) -> Self {
        Self {
            state: Mutex::new(GateState {
                count: window,
                closed: false,
            }),
            available: Condvar::new(),
            window,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take one credit if any is available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        if state.count > 0 {
            state.count -= 1;
            true
        } else {
            false
        }
    }

    /// Wait until a credit is available, then take it.
    ///
    /// Returns [`ChannelError::Closed`] if the gate is closed while waiting.
    pub fn acquire_blocking(&self) -> Result<()> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(ChannelError::Closed);
            }
            if state.count > 0 {
                state.count -= 1;
                return Ok(());
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Return one credit.
    ///
    /// A release on a full window is dropped and reported as
    /// [`Violation::CreditOverflow`].
    pub fn release(&self) -> std::result::Result<(), Violation> {
        let mut state = self.lock();
        if state.count >= self.window {
            return Err(Violation::CreditOverflow {
                window: self.window,
            });
        }
        state.count += 1;
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Credits currently available.
    pub fn available(&self) -> usize {
        self.lock().count
    }

    /// Words sent but not yet acknowledged by a token.
    pub fn outstanding(&self) -> usize {
        self.window - self.available()
    }

    /// The window size.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Wake every waiter; later acquires fail with [`ChannelError::Closed`].
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Whether [`CreditGate::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl std::fmt::Debug for CreditGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CreditGate")
            .field("count", &state.count)
            .field("window", &self.window)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn try_acquire_drains_window() {
        let gate = CreditGate::new(3);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        assert_eq!(gate.available(), 0);
        assert_eq!(gate.outstanding(), 3);
    }

    #[test]
    fn release_on_full_window_is_overflow() {
        let gate = CreditGate::new(2);
        assert_eq!(
            gate.release(),
            Err(Violation::CreditOverflow { window: 2 })
        );
        assert_eq!(gate.available(), 2);

        assert!(gate.try_acquire());
        assert!(gate.release().is_ok());
        assert!(gate.release().is_err());
        assert_eq!(gate.available(), 2);
    }

    #[test]
    fn blocked_acquire_wakes_on_release() {
        let gate = Arc::new(CreditGate::new(1));
        assert!(gate.try_acquire());

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let gate = Arc::clone(&gate);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                gate.acquire_blocking().unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        gate.release().unwrap();
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(gate.available(), 0);
    }

    #[test]
    fn one_release_admits_one_waiter() {
        let gate = Arc::new(CreditGate::new(1));
        assert!(gate.try_acquire());

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.acquire_blocking())
            })
            .collect();

        thread::sleep(Duration::from_millis(30));
        gate.release().unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(gate.available(), 0);

        // The second waiter is still parked until the gate closes.
        gate.close();
        let results: Vec<_> = waiters.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(ChannelError::Closed)))
                .count(),
            1
        );
    }

    #[test]
    fn close_fails_later_acquires() {
        let gate = CreditGate::new(4);
        gate.close();
        assert!(gate.is_closed());
        assert!(matches!(gate.acquire_blocking(), Err(ChannelError::Closed)));
    }
}
