use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{LinkError, Result};
use crate::traits::{Link, MacAddr, MAX_FRAME_SIZE};

#[derive(Default)]
struct MailboxState {
    frames: VecDeque<Bytes>,
    closed: bool,
}

#[derive(Default)]
struct Mailbox {
    state: Mutex<MailboxState>,
    ready: Condvar,
}

impl Mailbox {
    fn lock(&self) -> MutexGuard<'_, MailboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory link endpoint.
///
/// Created in connected pairs with [`MemoryLink::pair`]. Frames sent on one
/// end arrive, in order, on the other. Like a real shared medium the link does
/// not check frame addresses, so an endpoint may put any source address on the
/// wire; this is how foreign traffic is simulated.
pub struct MemoryLink {
    addr: MacAddr,
    inbox: Arc<Mailbox>,
    outbox: Arc<Mailbox>,
}

impl MemoryLink {
    /// Create two connected endpoints with the given hardware addresses.
    pub fn pair(left: MacAddr, right: MacAddr) -> (MemoryLink, MemoryLink) {
        let a = Arc::new(Mailbox::default());
        let b = Arc::new(Mailbox::default());
        (
            MemoryLink {
                addr: left,
                inbox: Arc::clone(&a),
                outbox: Arc::clone(&b),
            },
            MemoryLink {
                addr: right,
                inbox: b,
                outbox: a,
            },
        )
    }

    /// Number of frames waiting to be received on this end.
    pub fn pending(&self) -> usize {
        self.inbox.lock().frames.len()
    }

    /// Whether this end has been closed.
    pub fn is_closed(&self) -> bool {
        self.inbox.lock().closed
    }
}

impl Link for MemoryLink {
    fn local_addr(&self) -> MacAddr {
        self.addr
    }

    fn send(&self, frame: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        if frame.len() > MAX_FRAME_SIZE {
            return Err(LinkError::FrameTooLarge {
                size: frame.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let mut remote = self.outbox.lock();
        if remote.closed {
            // Nobody is listening any more; the medium swallows the frame.
            trace!(addr = %self.addr, len = frame.len(), "dropping frame for closed peer");
            return Ok(());
        }
        remote.frames.push_back(Bytes::copy_from_slice(frame));
        drop(remote);
        self.outbox.ready.notify_one();
        Ok(())
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Bytes>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inbox.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                return Ok(Some(frame));
            }
            if state.closed {
                return Err(LinkError::Closed);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            state = self
                .inbox
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn close(&self) {
        let mut state = self.inbox.lock();
        if !state.closed {
            state.closed = true;
            state.frames.clear();
            debug!(addr = %self.addr, "memory link closed");
        }
        drop(state);
        self.inbox.ready.notify_all();
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLink")
            .field("addr", &self.addr)
            .field("pending", &self.pending())
            .finish()
    }
}
