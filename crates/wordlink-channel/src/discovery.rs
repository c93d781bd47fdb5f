use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace, warn};
use wordlink_frame::{decode_frame, encode_frame, Frame, FrameKind};
use wordlink_transport::{Link, MacAddr};

use crate::config::DiscoveryConfig;
use crate::error::{ChannelError, Result};

/// Identity of the two endpoints of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerInfo {
    /// Our own hardware address.
    pub local: MacAddr,
    /// The single remote endpoint.
    pub peer: MacAddr,
}

/// Find the one remote endpoint on the link.
///
/// Broadcasts a ping, then listens for the configured period. Broadcast pings
/// from other hosts are answered with a unicast ping, so two hosts running
/// discovery at the same time find each other. Any ping from another host
/// carrying `ethertype` counts as a response.
///
/// Data and token frames received while listening are dropped. Use
/// [`WordChannel::connect`](crate::WordChannel::connect) to keep traffic from
/// a peer that finishes discovery first.
pub fn discover<L: Link + ?Sized>(
    link: &L,
    ethertype: u16,
    config: &DiscoveryConfig,
) -> Result<PeerInfo> {
    discover_with_backlog(link, ethertype, config).map(|(info, _)| info)
}

/// Like [`discover`], but also returns the raw data and token frames that the
/// discovered peer sent after its ping, in arrival order.
pub(crate) fn discover_with_backlog<L: Link + ?Sized>(
    link: &L,
    ethertype: u16,
    config: &DiscoveryConfig,
) -> Result<(PeerInfo, Vec<Bytes>)> {
    let local = link.local_addr();
    send_ping(link, MacAddr::BROADCAST, local, ethertype)?;
    debug!(%local, transport = link.transport_name(), "sent discovery ping");

    let deadline = Instant::now() + config.timeout();
    let mut found: Option<MacAddr> = None;
    let mut backlog = Vec::new();

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let Some(raw) = link.recv_timeout(deadline - now)? else {
            continue;
        };
        let Ok(frame) = decode_frame(&raw) else {
            continue;
        };

        if frame.ethertype != ethertype
            || frame.source == local
            || !(frame.destination == local || frame.destination.is_broadcast())
        {
            continue;
        }

        if frame.kind != FrameKind::Ping {
            // The peer finished discovery before us and started sending.
            if found == Some(frame.source) && frame.destination == local {
                trace!(peer = %frame.source, kind = %frame.kind, "holding early frame");
                backlog.push(raw);
            }
            continue;
        }

        if frame.destination.is_broadcast() {
            send_ping(link, frame.source, local, ethertype)?;
            debug!(peer = %frame.source, "answered discovery ping");
        }

        match found {
            None => {
                debug!(peer = %frame.source, "peer responded");
                found = Some(frame.source);
            }
            Some(first) if first != frame.source => {
                if config.require_single_peer {
                    return Err(ChannelError::AmbiguousPeer {
                        first,
                        second: frame.source,
                    });
                }
                warn!(%first, other = %frame.source, "ignoring additional peer");
            }
            Some(_) => {}
        }
    }

    match found {
        Some(peer) => {
            info!(%local, %peer, held = backlog.len(), "discovered peer");
            Ok((PeerInfo { local, peer }, backlog))
        }
        None => Err(ChannelError::Unreachable(format!(
            "no remote host answered within {:?}",
            config.timeout()
        ))),
    }
}

fn send_ping<L: Link + ?Sized>(
    link: &L,
    destination: MacAddr,
    source: MacAddr,
    ethertype: u16,
) -> Result<()> {
    let mut buf = BytesMut::new();
    encode_frame(&Frame::ping(destination, source, ethertype), &mut buf);
    link.send(&buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::thread;

    use wordlink_frame::DEFAULT_ETHERTYPE;
    use wordlink_transport::MemoryLink;

    use super::*;

    const HOST: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x01]);
    const BOARD: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x02]);

    fn quick() -> DiscoveryConfig {
        DiscoveryConfig {
            timeout_ms: 100,
            ..DiscoveryConfig::default()
        }
    }

    #[test]
    fn both_sides_find_each_other() {
        let (host, board) = MemoryLink::pair(HOST, BOARD);

        let remote = thread::spawn(move || discover(&board, DEFAULT_ETHERTYPE, &quick()).unwrap());
        let local = discover(&host, DEFAULT_ETHERTYPE, &quick()).unwrap();
        let remote = remote.join().unwrap();

        assert_eq!(local, PeerInfo { local: HOST, peer: BOARD });
        assert_eq!(remote, PeerInfo { local: BOARD, peer: HOST });
    }

    #[test]
    fn silent_link_is_unreachable() {
        let (host, _board) = MemoryLink::pair(HOST, BOARD);
        let result = discover(&host, DEFAULT_ETHERTYPE, &quick());
        assert!(matches!(result, Err(ChannelError::Unreachable(_))));
    }

    #[test]
    fn wrong_ethertype_is_not_a_peer() {
        let (host, board) = MemoryLink::pair(HOST, BOARD);
        let mut buf = BytesMut::new();
        encode_frame(&Frame::ping(HOST, BOARD, 0x0800), &mut buf);
        board.send(&buf).unwrap();

        let result = discover(&host, DEFAULT_ETHERTYPE, &quick());
        assert!(matches!(result, Err(ChannelError::Unreachable(_))));
    }

    #[test]
    fn two_responders_are_ambiguous() {
        let (host, medium) = MemoryLink::pair(HOST, BOARD);
        let other = MacAddr::new([0x02, 0, 0, 0, 0, 0x03]);
        for source in [BOARD, other] {
            let mut buf = BytesMut::new();
            encode_frame(&Frame::ping(HOST, source, DEFAULT_ETHERTYPE), &mut buf);
            medium.send(&buf).unwrap();
        }

        let result = discover(&host, DEFAULT_ETHERTYPE, &quick());
        assert!(matches!(
            result,
            Err(ChannelError::AmbiguousPeer { first, second }) if first == BOARD && second == other
        ));

        let lenient = DiscoveryConfig {
            require_single_peer: false,
            ..quick()
        };
        for source in [BOARD, other] {
            let mut buf = BytesMut::new();
            encode_frame(&Frame::ping(HOST, source, DEFAULT_ETHERTYPE), &mut buf);
            medium.send(&buf).unwrap();
        }
        let info = discover(&host, DEFAULT_ETHERTYPE, &lenient).unwrap();
        assert_eq!(info.peer, BOARD);
    }

    #[test]
    fn early_frames_from_peer_are_held() {
        let (host, medium) = MemoryLink::pair(HOST, BOARD);
        let stranger = MacAddr::new([0x02, 0, 0, 0, 0, 0x03]);
        let frames = [
            // Before the peer is known: not held.
            Frame::data(HOST, BOARD, DEFAULT_ETHERTYPE, 1),
            Frame::ping(MacAddr::BROADCAST, BOARD, DEFAULT_ETHERTYPE),
            Frame::data(HOST, BOARD, DEFAULT_ETHERTYPE, 2),
            Frame::token(HOST, BOARD, DEFAULT_ETHERTYPE),
            Frame::data(HOST, stranger, DEFAULT_ETHERTYPE, 3),
            Frame::data(HOST, BOARD, 0x0800, 4),
        ];
        for frame in frames {
            let mut buf = BytesMut::new();
            encode_frame(&frame, &mut buf);
            medium.send(&buf).unwrap();
        }

        let (info, backlog) = discover_with_backlog(&host, DEFAULT_ETHERTYPE, &quick()).unwrap();
        assert_eq!(info.peer, BOARD);
        let held: Vec<_> = backlog
            .iter()
            .map(|raw| decode_frame(raw).unwrap())
            .collect();
        assert_eq!(
            held,
            vec![
                Frame::data(HOST, BOARD, DEFAULT_ETHERTYPE, 2),
                Frame::token(HOST, BOARD, DEFAULT_ETHERTYPE),
            ]
        );
    }

    #[test]
    fn closed_link_fails_discovery() {
        let (host, _board) = MemoryLink::pair(HOST, BOARD);
        host.close();
        let result = discover(&host, DEFAULT_ETHERTYPE, &quick());
        assert!(matches!(result, Err(ChannelError::Link(_))));
    }
}
