use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace, warn};
use wordlink_frame::{encode_frame, Frame, Word, DATA_FRAME_LEN};
use wordlink_transport::{Link, LinkError};

use crate::config::ChannelConfig;
use crate::discovery::{discover_with_backlog, PeerInfo};
use crate::error::{ChannelError, Result};
use crate::receiver::{dispatch, FrameFilter, ReceiverLoop, Shared};
use crate::stats::{ChannelStats, Counters};

/// Credit flow-controlled word channel to a single peer.
///
/// Writes consume one unit of credit each and block while the window is
/// exhausted. Reads drain the local receive buffer and send one token back
/// per word, telling the peer a slot was freed.
///
/// One thread may write while another reads. Two concurrent writers, or two
/// concurrent readers, are not supported.
///
/// `write_blocking` waits without limit if the peer never drains its
/// buffer; callers needing a deadline must add one on top.
pub struct WordChannel<L: Link> {
    link: Arc<L>,
    peer: PeerInfo,
    ethertype: u16,
    shared: Arc<Shared>,
    receiver: ReceiverLoop,
    shut_down: bool,
}

impl<L: Link> WordChannel<L> {
    /// Discover the peer on `link`, then open a channel to it.
    ///
    /// Words and tokens the peer sends before this side has finished
    /// discovery are kept and delivered once the channel is open.
    pub fn connect(link: L, config: &ChannelConfig) -> Result<Self> {
        config.validate()?;
        let (peer, backlog) = discover_with_backlog(&link, config.ethertype, &config.discovery)?;
        Self::open_with_backlog(link, peer, config, backlog)
    }

    /// Open a channel to an already discovered peer.
    ///
    /// Spawns the background receiver. The link and the receiver are torn
    /// down together by [`WordChannel::close`] or on drop.
    pub fn open(link: L, peer: PeerInfo, config: &ChannelConfig) -> Result<Self> {
        Self::open_with_backlog(link, peer, config, Vec::new())
    }

    fn open_with_backlog(
        link: L,
        peer: PeerInfo,
        config: &ChannelConfig,
        backlog: Vec<Bytes>,
    ) -> Result<Self> {
        config.validate()?;

        let link = Arc::new(link);
        let shared = Arc::new(Shared::new(config.window));
        let filter = FrameFilter {
            peer,
            ethertype: config.ethertype,
        };
        if !backlog.is_empty() {
            debug!(frames = backlog.len(), "replaying frames received during discovery");
        }
        for raw in &backlog {
            dispatch(raw, &filter, &shared);
        }
        let receiver = match ReceiverLoop::spawn(
            Arc::clone(&link),
            filter,
            Arc::clone(&shared),
            config.poll_interval(),
            &config.receiver_thread_name,
        ) {
            Ok(receiver) => receiver,
            Err(err) => {
                link.close();
                return Err(err);
            }
        };

        info!(
            local = %peer.local,
            peer = %peer.peer,
            window = config.window,
            transport = link.transport_name(),
            "word channel open"
        );

        Ok(Self {
            link,
            peer,
            ethertype: config.ethertype,
            shared,
            receiver,
            shut_down: false,
        })
    }

    /// Send one word, waiting for credit if the window is exhausted.
    ///
    /// Returns once the frame is handed to the link; there is no delivery
    /// acknowledgment beyond the eventual credit return.
    ///
    /// If the link rejects the frame the credit is handed back.
    pub fn write_blocking(&self, word: Word) -> Result<()> {
        self.shared.credit.acquire_blocking()?;
        self.send_word(word)
    }

    /// Send one word only if credit is available. Returns whether it was sent.
    pub fn try_write(&self, word: Word) -> Result<bool> {
        if self.shared.credit.is_closed() {
            return Err(ChannelError::Closed);
        }
        if !self.shared.credit.try_acquire() {
            return Ok(false);
        }
        self.send_word(word)?;
        Ok(true)
    }

    /// Wait for the next word and return one credit to the peer.
    ///
    /// Fails with [`ChannelError::Closed`] once the channel is shut down and
    /// every buffered word has been read.
    pub fn read_blocking(&self) -> Result<Word> {
        let word = self
            .shared
            .ring
            .pop_blocking()
            .ok_or(ChannelError::Closed)?;
        self.return_credit()?;
        Ok(word)
    }

    /// Single non-blocking read attempt.
    ///
    /// A word that is read returns one credit to the peer, as in
    /// [`WordChannel::read_blocking`].
    pub fn try_read(&self) -> Result<Option<Word>> {
        match self.shared.ring.pop() {
            Some(word) => {
                self.return_credit()?;
                Ok(Some(word))
            }
            None if self.shared.ring.is_closed() => Err(ChannelError::Closed),
            None => Ok(None),
        }
    }

    /// Send a data frame on credit already taken.
    fn send_word(&self, word: Word) -> Result<()> {
        let frame = Frame::data(self.peer.peer, self.peer.local, self.ethertype, word);
        if let Err(err) = self.send_frame(&frame) {
            // The word never left, so neither did the credit.
            let _ = self.shared.credit.release();
            return Err(err);
        }
        Counters::bump(&self.shared.counters.words_sent);
        trace!(word, "sent word");
        Ok(())
    }

    /// Tell the peer one receive slot was freed.
    ///
    /// Skipped once the channel is shut down: nobody will use the credit, and
    /// the word just read must still reach the caller.
    fn return_credit(&self) -> Result<()> {
        if self.shared.credit.is_closed() {
            return Ok(());
        }
        let token = Frame::token(self.peer.peer, self.peer.local, self.ethertype);
        match self.send_frame(&token) {
            Ok(()) => {
                Counters::bump(&self.shared.counters.tokens_sent);
                Ok(())
            }
            Err(ChannelError::Link(LinkError::Closed)) => {
                debug!("link closed, rx credit token not sent");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "couldn't send rx credit token");
                Err(err)
            }
        }
    }

    fn send_frame(&self, frame: &Frame) -> Result<()> {
        let mut buf = BytesMut::with_capacity(DATA_FRAME_LEN);
        encode_frame(frame, &mut buf);
        self.link.send(&buf)?;
        Ok(())
    }

    /// The endpoints of this channel.
    pub fn peer(&self) -> PeerInfo {
        self.peer
    }

    /// Credit window size.
    pub fn window(&self) -> usize {
        self.shared.credit.window()
    }

    /// Credits currently available for writing.
    pub fn credit_available(&self) -> usize {
        self.shared.credit.available()
    }

    /// Words waiting in the local receive buffer.
    pub fn buffered(&self) -> usize {
        self.shared.ring.len()
    }

    /// Whether the background receiver is still running.
    pub fn is_open(&self) -> bool {
        !self.shut_down && self.receiver.is_running()
    }

    /// Snapshot of traffic counters.
    pub fn stats(&self) -> ChannelStats {
        self.shared
            .counters
            .snapshot(self.shared.credit.available(), self.shared.ring.len())
    }

    /// Borrow the underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.shared.counters
    }

    /// Shut the channel down. Equivalent to dropping it.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        // Stop the receiver before the link goes away.
        self.receiver.request_stop();
        self.link.close();
        self.receiver.join();
        self.shared.close();

        let stats = self.stats();
        info!(
            peer = %self.peer.peer,
            words_sent = stats.words_sent,
            words_received = stats.words_received,
            violations = stats.violations(),
            "word channel closed"
        );
    }
}

impl<L: Link> Drop for WordChannel<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<L: Link> std::fmt::Debug for WordChannel<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordChannel")
            .field("peer", &self.peer)
            .field("ethertype", &self.ethertype)
            .field("credit", &self.shared.credit)
            .field("ring", &self.shared.ring)
            .field("receiver", &self.receiver)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use wordlink_frame::DEFAULT_ETHERTYPE;
    use wordlink_transport::{MacAddr, MemoryLink};

    use super::*;

    const HOST: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x01]);
    const BOARD: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x02]);

    fn config(window: usize) -> ChannelConfig {
        ChannelConfig {
            poll_interval_ms: 5,
            ..ChannelConfig::default()
        }
        .with_window(window)
    }

    fn channel_pair(window: usize) -> (WordChannel<MemoryLink>, WordChannel<MemoryLink>) {
        let (host, board) = MemoryLink::pair(HOST, BOARD);
        let a = WordChannel::open(
            host,
            PeerInfo {
                local: HOST,
                peer: BOARD,
            },
            &config(window),
        )
        .unwrap();
        let b = WordChannel::open(
            board,
            PeerInfo {
                local: BOARD,
                peer: HOST,
            },
            &config(window),
        )
        .unwrap();
        (a, b)
    }

    #[test]
    fn write_then_read_fifo() {
        let (a, b) = channel_pair(8);
        for w in [1, 2, 3, 0xDEAD_BEEF_u64] {
            a.write_blocking(w).unwrap();
        }
        assert_eq!(b.read_blocking().unwrap(), 1);
        assert_eq!(b.read_blocking().unwrap(), 2);
        assert_eq!(b.read_blocking().unwrap(), 3);
        assert_eq!(b.read_blocking().unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn try_write_stops_at_window() {
        let (a, _b) = channel_pair(3);
        assert!(a.try_write(1).unwrap());
        assert!(a.try_write(2).unwrap());
        assert!(a.try_write(3).unwrap());
        assert!(!a.try_write(4).unwrap());
        assert_eq!(a.credit_available(), 0);
    }

    #[test]
    fn try_read_empty_returns_none() {
        let (_a, b) = channel_pair(2);
        assert_eq!(b.try_read().unwrap(), None);
        assert_eq!(b.stats().tokens_sent, 0);
    }

    #[test]
    fn read_returns_credit() {
        let (a, b) = channel_pair(2);
        a.write_blocking(9).unwrap();
        assert_eq!(a.credit_available(), 1);
        assert_eq!(b.read_blocking().unwrap(), 9);

        let start = std::time::Instant::now();
        while a.credit_available() < 2 {
            assert!(start.elapsed() < Duration::from_secs(5), "token never arrived");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(a.stats().tokens_received, 1);
        assert_eq!(b.stats().tokens_sent, 1);
    }

    #[test]
    fn close_wakes_blocked_reader() {
        let (a, b) = channel_pair(2);
        let b = Arc::new(b);
        let reader = {
            let b = Arc::clone(&b);
            thread::spawn(move || b.read_blocking())
        };
        thread::sleep(Duration::from_millis(20));

        // Closing the far end does not stop our receiver; closing our link does.
        drop(a);
        b.link().close();
        assert!(matches!(reader.join().unwrap(), Err(ChannelError::Closed)));
        assert!(matches!(b.try_read(), Err(ChannelError::Closed)));
    }

    #[test]
    fn writes_after_close_fail() {
        let (a, _b) = channel_pair(2);
        a.link().close();
        // Wait for the receiver to notice and close the gate.
        let start = std::time::Instant::now();
        while a.is_open() {
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(1));
        }
        assert!(matches!(a.write_blocking(1), Err(ChannelError::Closed)));
        assert!(matches!(a.try_write(1), Err(ChannelError::Closed)));
    }

    #[test]
    fn buffered_words_survive_local_close() {
        let (a, b) = channel_pair(4);
        for w in [7, 8, 9] {
            a.write_blocking(w).unwrap();
        }
        let start = std::time::Instant::now();
        while b.buffered() < 3 {
            assert!(start.elapsed() < Duration::from_secs(5), "words never arrived");
            thread::sleep(Duration::from_millis(1));
        }

        b.link().close();
        assert_eq!(b.read_blocking().unwrap(), 7);
        assert_eq!(b.try_read().unwrap(), Some(8));
        assert_eq!(b.read_blocking().unwrap(), 9);
        assert!(matches!(b.read_blocking(), Err(ChannelError::Closed)));
        assert_eq!(b.stats().tokens_sent, 0);
    }

    /// Link whose sends can be switched off while receives keep working.
    struct FlakyLink {
        inner: MemoryLink,
        broken: AtomicBool,
    }

    impl Link for FlakyLink {
        fn local_addr(&self) -> MacAddr {
            self.inner.local_addr()
        }

        fn send(&self, frame: &[u8]) -> wordlink_transport::Result<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(LinkError::Io(std::io::Error::other("tx down")));
            }
            self.inner.send(frame)
        }

        fn recv_timeout(&self, timeout: Duration) -> wordlink_transport::Result<Option<Bytes>> {
            self.inner.recv_timeout(timeout)
        }

        fn close(&self) {
            self.inner.close()
        }

        fn transport_name(&self) -> &'static str {
            "flaky"
        }
    }

    #[test]
    fn failed_send_gives_credit_back() {
        let (host, _board) = MemoryLink::pair(HOST, BOARD);
        let link = FlakyLink {
            inner: host,
            broken: AtomicBool::new(true),
        };
        let a = WordChannel::open(
            link,
            PeerInfo {
                local: HOST,
                peer: BOARD,
            },
            &config(2),
        )
        .unwrap();

        assert!(matches!(
            a.write_blocking(1),
            Err(ChannelError::Link(LinkError::Io(_)))
        ));
        assert!(matches!(a.try_write(2), Err(ChannelError::Link(_))));
        assert_eq!(a.credit_available(), 2);
        assert_eq!(a.stats().words_sent, 0);

        a.link().broken.store(false, Ordering::SeqCst);
        assert!(a.try_write(3).unwrap());
        assert_eq!(a.credit_available(), 1);
    }

    #[test]
    fn invalid_config_rejected() {
        let (host, _board) = MemoryLink::pair(HOST, BOARD);
        let result = WordChannel::open(
            host,
            PeerInfo {
                local: HOST,
                peer: BOARD,
            },
            &config(0),
        );
        assert!(matches!(result, Err(ChannelError::InvalidConfig(_))));
    }

    #[test]
    fn debug_output_names_peer() {
        let (a, _b) = channel_pair(2);
        let text = format!("{a:?}");
        assert!(text.contains("WordChannel"));
        assert!(text.contains("02:00:00:00:00:02"));
        assert_eq!(DEFAULT_ETHERTYPE, a.ethertype);
    }
}
