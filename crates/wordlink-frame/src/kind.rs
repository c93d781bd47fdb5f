//! Frame-kind tags.
//!
//! The numeric values are fixed by the remote endpoint's decoder and must not
//! change.

use std::fmt;

/// Data frame: carries one 8-byte word.
pub const KIND_DATA: u16 = 0x0008;

/// Credit token: one receive slot was freed.
pub const KIND_TOKEN: u16 = 0xFFFF;

/// Ping request or response.
pub const KIND_PING: u16 = 0xFFFE;

/// The kind of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Ping,
    Token,
    Data,
}

impl FrameKind {
    /// The on-wire tag.
    pub fn tag(self) -> u16 {
        match self {
            FrameKind::Ping => KIND_PING,
            FrameKind::Token => KIND_TOKEN,
            FrameKind::Data => KIND_DATA,
        }
    }

    /// Map an on-wire tag back to a kind.
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            KIND_PING => Some(FrameKind::Ping),
            KIND_TOKEN => Some(FrameKind::Token),
            KIND_DATA => Some(FrameKind::Data),
            _ => None,
        }
    }

    /// Returns true for the kinds that carry no payload.
    pub fn is_control(self) -> bool {
        !matches!(self, FrameKind::Data)
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Ping => "PING",
            FrameKind::Token => "TOKEN",
            FrameKind::Data => "DATA",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for kind in [FrameKind::Ping, FrameKind::Token, FrameKind::Data] {
            assert_eq!(FrameKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(FrameKind::from_tag(0x0800), None);
    }

    #[test]
    fn tags_are_distinct_and_stable() {
        assert_eq!(KIND_DATA, 0x0008);
        assert_eq!(KIND_TOKEN, 0xFFFF);
        assert_eq!(KIND_PING, 0xFFFE);
    }

    #[test]
    fn control_classification() {
        assert!(FrameKind::Ping.is_control());
        assert!(FrameKind::Token.is_control());
        assert!(!FrameKind::Data.is_control());
    }
}
