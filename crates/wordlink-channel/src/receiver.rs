use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, trace};
use wordlink_frame::{decode_frame, FrameKind};
use wordlink_transport::{Link, LinkError};

use crate::credit::CreditGate;
use crate::discovery::PeerInfo;
use crate::error::{ChannelError, Result, Violation};
use crate::ring::WordRingBuffer;
use crate::stats::Counters;

/// State shared between the foreground channel and the receiver loop.
#[derive(Debug)]
pub(crate) struct Shared {
    pub credit: CreditGate,
    pub ring: WordRingBuffer,
    pub counters: Counters,
}

impl Shared {
    pub fn new(window: usize) -> Self {
        Self {
            credit: CreditGate::new(window),
            ring: WordRingBuffer::new(window),
            counters: Counters::default(),
        }
    }

    /// Release every caller blocked on the gate or the buffer.
    pub fn close(&self) {
        self.credit.close();
        self.ring.close();
    }
}

/// What the receiver did with one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Foreign, malformed, or misaddressed.
    Discarded,
    Ping,
    Token,
    Data,
    Violation(Violation),
}

/// Which frames belong to this channel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameFilter {
    pub peer: PeerInfo,
    pub ethertype: u16,
}

/// Classify one inbound frame and apply it to the shared state.
pub(crate) fn dispatch(raw: &[u8], filter: &FrameFilter, shared: &Shared) -> Disposition {
    let frame = match decode_frame(raw) {
        Ok(frame) => frame,
        Err(err) => {
            trace!(error = %err, len = raw.len(), "discarding undecodable frame");
            Counters::bump(&shared.counters.frames_discarded);
            return Disposition::Discarded;
        }
    };

    let addressed_to_us = frame.destination == filter.peer.local
        || (frame.kind == FrameKind::Ping && frame.destination.is_broadcast());
    if frame.ethertype != filter.ethertype
        || frame.source != filter.peer.peer
        || !addressed_to_us
    {
        trace!(
            src = %frame.source,
            dst = %frame.destination,
            ethertype = frame.ethertype,
            "discarding foreign frame"
        );
        Counters::bump(&shared.counters.frames_discarded);
        return Disposition::Discarded;
    }

    match frame.kind {
        FrameKind::Token => match shared.credit.release() {
            Ok(()) => {
                Counters::bump(&shared.counters.tokens_received);
                Disposition::Token
            }
            Err(violation) => {
                error!(peer = %frame.source, %violation, "TX credit token overflow");
                Counters::bump(&shared.counters.credit_overflows);
                Disposition::Violation(violation)
            }
        },
        FrameKind::Data => match shared.ring.push(frame.word) {
            Ok(()) => {
                Counters::bump(&shared.counters.words_received);
                Disposition::Data
            }
            Err(violation) => {
                error!(peer = %frame.source, %violation, "RX buffer overflow");
                Counters::bump(&shared.counters.ring_overflows);
                Disposition::Violation(violation)
            }
        },
        FrameKind::Ping => {
            debug!(peer = %frame.source, "ignoring ping after setup");
            Counters::bump(&shared.counters.pings_ignored);
            Disposition::Ping
        }
    }
}

/// Background task that drains the link.
///
/// Tokens replenish the credit gate, data words go into the receive buffer,
/// pings are ignored. The loop ends when stopped or when the link reports
/// closed or failed; either way it closes the shared gate and buffer on the
/// way out so that no caller stays blocked on a dead channel.
pub struct ReceiverLoop {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl ReceiverLoop {
    pub(crate) fn spawn<L: Link>(
        link: Arc<L>,
        filter: FrameFilter,
        shared: Arc<Shared>,
        poll_interval: Duration,
        thread_name: &str,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name(thread_name.to_string())
                .spawn(move || run(&*link, &filter, &shared, &stop, poll_interval))
                .map_err(|err| ChannelError::Link(LinkError::Io(err)))?
        };

        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Ask the loop to exit at its next wake-up.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether the loop thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Request a stop and wait for the thread to exit.
    pub fn join(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("receiver thread panicked");
            }
        }
    }
}

impl Drop for ReceiverLoop {
    fn drop(&mut self) {
        self.join();
    }
}

impl std::fmt::Debug for ReceiverLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverLoop")
            .field("running", &self.is_running())
            .finish()
    }
}

fn run<L: Link + ?Sized>(
    link: &L,
    filter: &FrameFilter,
    shared: &Shared,
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    debug!(peer = %filter.peer.peer, "receiver started");

    while !stop.load(Ordering::Acquire) {
        let raw = match link.recv_timeout(poll_interval) {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(LinkError::Closed) => {
                debug!("link closed, receiver exiting");
                break;
            }
            Err(err) => {
                error!(error = %err, "link receive failed, receiver exiting");
                break;
            }
        };
        dispatch(&raw, filter, shared);
    }

    shared.close();
    debug!("receiver stopped");
}
