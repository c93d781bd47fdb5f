use tracing::{error, trace};
use wordlink_transport::Link;

use crate::config::ChannelConfig;
use crate::discovery::PeerInfo;
use crate::error::{Result, Violation};
use crate::message::{Message, MessageAssembler};
use crate::stats::{ChannelStats, Counters};
use crate::word::WordChannel;

/// Message-level API on top of a [`WordChannel`].
///
/// Outbound messages are split into chunks and written word by word;
/// inbound words are reassembled into complete messages.
pub struct MessageChannel<L: Link> {
    words: WordChannel<L>,
    assembler: MessageAssembler,
}

impl<L: Link> MessageChannel<L> {
    /// Wrap an open word channel.
    pub fn new(words: WordChannel<L>, config: &ChannelConfig) -> Self {
        Self {
            words,
            assembler: MessageAssembler::new(config.max_message_chunks),
        }
    }

    /// Discover the peer on `link` and open a message channel to it.
    pub fn connect(link: L, config: &ChannelConfig) -> Result<Self> {
        let words = WordChannel::connect(link, config)?;
        Ok(Self::new(words, config))
    }

    /// Open a message channel to an already discovered peer.
    pub fn open(link: L, peer: PeerInfo, config: &ChannelConfig) -> Result<Self> {
        let words = WordChannel::open(link, peer, config)?;
        Ok(Self::new(words, config))
    }

    /// Wait until a whole message has arrived.
    pub fn read_blocking(&mut self) -> Result<Message> {
        loop {
            let chunk = self.words.read_blocking()?;
            if let Some(message) = self.assembler.feed(chunk).inspect_err(|v| self.report(v))? {
                trace!(chunks = message.chunk_count(), "received message");
                return Ok(message);
            }
        }
    }

    /// Read at most one word and advance reassembly.
    ///
    /// Returns the message only if this call completed it. A partially
    /// received message is kept across calls.
    pub fn try_read(&mut self) -> Result<Option<Message>> {
        let Some(chunk) = self.words.try_read()? else {
            return Ok(None);
        };
        let message = self.assembler.feed(chunk).inspect_err(|v| self.report(v))?;
        if let Some(message) = &message {
            trace!(chunks = message.chunk_count(), "received message");
        }
        Ok(message)
    }

    /// Send a message: the header first, then the body from last chunk to
    /// first. Each chunk waits for credit as needed.
    pub fn write(&self, message: Message) -> Result<()> {
        for chunk in message.wire_chunks() {
            self.words.write_blocking(chunk)?;
        }
        trace!(
            channel_id = message.channel_id,
            chunks = message.chunk_count(),
            "sent message"
        );
        Ok(())
    }

    fn report(&self, violation: &Violation) {
        Counters::bump(&self.words.counters().framing_violations);
        error!(%violation, "message framing violation");
    }

    /// Whether a message is partially received.
    pub fn is_assembling(&self) -> bool {
        self.assembler.is_assembling()
    }

    /// Snapshot of the underlying word channel's counters.
    pub fn stats(&self) -> ChannelStats {
        self.words.stats()
    }

    /// The endpoints of this channel.
    pub fn peer(&self) -> PeerInfo {
        self.words.peer()
    }

    /// Borrow the word channel.
    pub fn word_channel(&self) -> &WordChannel<L> {
        &self.words
    }

    /// Unwrap into the word channel, dropping any partial message.
    pub fn into_inner(self) -> WordChannel<L> {
        self.words
    }

    /// Shut the channel down.
    pub fn close(self) {
        self.words.close();
    }
}

impl<L: Link> std::fmt::Debug for MessageChannel<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageChannel")
            .field("words", &self.words)
            .field("assembler", &self.assembler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use wordlink_transport::{MacAddr, MemoryLink};

    use super::*;
    use crate::error::ChannelError;

    const HOST: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x01]);
    const BOARD: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x02]);

    fn pair(config: &ChannelConfig) -> (MessageChannel<MemoryLink>, MessageChannel<MemoryLink>) {
        let (host, board) = MemoryLink::pair(HOST, BOARD);
        let a = MessageChannel::open(
            host,
            PeerInfo {
                local: HOST,
                peer: BOARD,
            },
            config,
        )
        .unwrap();
        let b = MessageChannel::open(
            board,
            PeerInfo {
                local: BOARD,
                peer: HOST,
            },
            config,
        )
        .unwrap();
        (a, b)
    }

    #[test]
    fn message_roundtrip() {
        let (a, mut b) = pair(&ChannelConfig::default().with_window(16));
        let msg = Message::new(3, 1, 0x42, vec![0xAA, 0xBB, 0xCC]).unwrap();

        a.write(msg.clone()).unwrap();
        assert_eq!(b.read_blocking().unwrap(), msg);
        assert_eq!(a.stats().words_sent, 4);
    }

    #[test]
    fn try_read_keeps_partial_state() {
        let (a, mut b) = pair(&ChannelConfig::default().with_window(16));
        let msg = Message::new(1, 2, 3, vec![5, 6]).unwrap();
        a.write(msg.clone()).unwrap();

        let mut polls = 0;
        let got = loop {
            polls += 1;
            assert!(polls < 100_000, "message never completed");
            match b.try_read().unwrap() {
                Some(m) => break m,
                None => std::thread::yield_now(),
            }
        };
        assert_eq!(got, msg);
        assert!(!b.is_assembling());
    }

    #[test]
    fn oversized_inbound_message_is_a_violation() {
        let sender_cfg = ChannelConfig::default().with_window(16);
        let receiver_cfg = sender_cfg.clone().with_max_message_chunks(2);
        let (host, board) = MemoryLink::pair(HOST, BOARD);
        let a = MessageChannel::open(
            host,
            PeerInfo {
                local: HOST,
                peer: BOARD,
            },
            &sender_cfg,
        )
        .unwrap();
        let mut b = MessageChannel::open(
            board,
            PeerInfo {
                local: BOARD,
                peer: HOST,
            },
            &receiver_cfg,
        )
        .unwrap();

        a.write(Message::new(0, 0, 0, vec![1, 2, 3]).unwrap()).unwrap();
        let err = b.read_blocking().unwrap_err();
        assert!(matches!(
            err,
            ChannelError::ProtocolViolation(Violation::OversizedMessage { chunks: 3, max: 2 })
        ));

        let stats = b.stats();
        assert_eq!(stats.framing_violations, 1);
        assert!(!stats.is_reliable());
    }
}
