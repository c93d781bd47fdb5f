use bytes::{Buf, BufMut, BytesMut};
use wordlink_transport::MacAddr;

use crate::error::{FrameError, Result};
use crate::kind::FrameKind;

/// The unit of transfer. Opaque to the transport.
pub type Word = u64;

/// Address length in bytes.
pub const ADDR_LEN: usize = 6;

/// Word length in bytes.
pub const WORD_LEN: usize = 8;

/// Addresses (2 * 6) + link-type tag (2) + kind (2).
pub const HEADER_LEN: usize = 2 * ADDR_LEN + 4;

/// Length of a ping or token frame.
pub const CONTROL_FRAME_LEN: usize = HEADER_LEN;

/// Length of a data frame.
pub const DATA_FRAME_LEN: usize = HEADER_LEN + WORD_LEN;

/// Minimum Ethernet frame length. Frames arrive padded up to this size.
pub const MIN_WIRE_FRAME_LEN: usize = 60;

/// Link-type tag reserved for this protocol.
pub const DEFAULT_ETHERTYPE: u16 = 0x8888;

/// One link-layer frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub destination: MacAddr,
    pub source: MacAddr,
    /// Link-type tag identifying the protocol.
    pub ethertype: u16,
    pub kind: FrameKind,
    /// Payload word. Always zero for control frames.
    pub word: Word,
}

impl Frame {
    /// A ping frame.
    pub fn ping(destination: MacAddr, source: MacAddr, ethertype: u16) -> Self {
        Self::control(FrameKind::Ping, destination, source, ethertype)
    }

    /// A credit token frame.
    pub fn token(destination: MacAddr, source: MacAddr, ethertype: u16) -> Self {
        Self::control(FrameKind::Token, destination, source, ethertype)
    }

    /// A data frame carrying `word`.
    pub fn data(destination: MacAddr, source: MacAddr, ethertype: u16, word: Word) -> Self {
        Self {
            destination,
            source,
            ethertype,
            kind: FrameKind::Data,
            word,
        }
    }

    fn control(kind: FrameKind, destination: MacAddr, source: MacAddr, ethertype: u16) -> Self {
        Self {
            destination,
            source,
            ethertype,
            kind,
            word: 0,
        }
    }

    /// The payload word, if this is a data frame.
    pub fn payload(&self) -> Option<Word> {
        match self.kind {
            FrameKind::Data => Some(self.word),
            FrameKind::Ping | FrameKind::Token => None,
        }
    }

    /// The unpadded wire size of this frame.
    pub fn wire_size(&self) -> usize {
        wire_len(self.kind)
    }
}

fn wire_len(kind: FrameKind) -> usize {
    match kind {
        FrameKind::Data => DATA_FRAME_LEN,
        FrameKind::Ping | FrameKind::Token => CONTROL_FRAME_LEN,
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬───────────┬────────────┬───────────┬──────────────────┐
/// │ Dest (6B) │ Src (6B)  │ Type (2B)  │ Kind (2B) │ Word (8B LE)     │
/// │           │           │ BE, 0x8888 │ BE        │ data frames only │
/// └───────────┴───────────┴────────────┴───────────┴──────────────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(frame.wire_size());
    dst.put_slice(&frame.destination.octets());
    dst.put_slice(&frame.source.octets());
    dst.put_u16(frame.ethertype);
    dst.put_u16(frame.kind.tag());
    if frame.kind == FrameKind::Data {
        dst.put_u64_le(frame.word);
    }
}

/// Decode one frame. Trailing padding is ignored.
pub fn decode_frame(mut src: &[u8]) -> Result<Frame> {
    let len = src.len();
    if len < HEADER_LEN {
        return Err(FrameError::TooShort {
            len,
            min: HEADER_LEN,
        });
    }

    let destination = read_addr(&mut src);
    let source = read_addr(&mut src);
    let ethertype = src.get_u16();
    let tag = src.get_u16();
    let kind = FrameKind::from_tag(tag).ok_or(FrameError::UnknownKind(tag))?;

    let expected = wire_len(kind);
    if len < expected {
        return Err(FrameError::Truncated {
            kind,
            len,
            expected,
        });
    }

    let word = match kind {
        FrameKind::Data => src.get_u64_le(),
        FrameKind::Ping | FrameKind::Token => 0,
    };

    Ok(Frame {
        destination,
        source,
        ethertype,
        kind,
        word,
    })
}

fn read_addr(src: &mut &[u8]) -> MacAddr {
    let mut octets = [0u8; ADDR_LEN];
    src.copy_to_slice(&mut octets);
    MacAddr(octets)
}
