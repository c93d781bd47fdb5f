use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters shared by the foreground channel and the receiver loop.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub words_sent: AtomicU64,
    pub words_received: AtomicU64,
    pub tokens_sent: AtomicU64,
    pub tokens_received: AtomicU64,
    pub pings_ignored: AtomicU64,
    pub frames_discarded: AtomicU64,
    pub credit_overflows: AtomicU64,
    pub ring_overflows: AtomicU64,
    pub framing_violations: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, credit_available: usize, buffered_words: usize) -> ChannelStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ChannelStats {
            words_sent: get(&self.words_sent),
            words_received: get(&self.words_received),
            tokens_sent: get(&self.tokens_sent),
            tokens_received: get(&self.tokens_received),
            pings_ignored: get(&self.pings_ignored),
            frames_discarded: get(&self.frames_discarded),
            credit_overflows: get(&self.credit_overflows),
            ring_overflows: get(&self.ring_overflows),
            framing_violations: get(&self.framing_violations),
            credit_available,
            buffered_words,
        }
    }
}

/// Point-in-time view of a channel's traffic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChannelStats {
    pub words_sent: u64,
    pub words_received: u64,
    pub tokens_sent: u64,
    pub tokens_received: u64,
    pub pings_ignored: u64,
    /// Frames from other hosts, with another link-type tag, or malformed.
    pub frames_discarded: u64,
    pub credit_overflows: u64,
    pub ring_overflows: u64,
    /// Message headers rejected while reassembling.
    pub framing_violations: u64,
    pub credit_available: usize,
    pub buffered_words: usize,
}

impl ChannelStats {
    /// Protocol violations observed so far.
    pub fn violations(&self) -> u64 {
        self.credit_overflows + self.ring_overflows + self.framing_violations
    }

    /// False once the peer has broken the credit or message protocol.
    pub fn is_reliable(&self) -> bool {
        self.violations() == 0
    }
}
