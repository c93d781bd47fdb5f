use crate::kind::FrameKind;

/// Errors that can occur while decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Too short to hold the address and tag fields.
    #[error("frame too short ({len} bytes, need at least {min})")]
    TooShort { len: usize, min: usize },

    /// The frame-kind tag is not one of the agreed values.
    #[error("unknown frame kind 0x{0:04x}")]
    UnknownKind(u16),

    /// The frame is shorter than its kind requires.
    #[error("truncated {kind} frame ({len} bytes, expected {expected})")]
    Truncated {
        kind: FrameKind,
        len: usize,
        expected: usize,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;
