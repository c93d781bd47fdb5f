//! Fixed-size link-layer frames for wordlink.
//!
//! Every frame carries a destination and source address, a 2-byte link-type
//! tag identifying this protocol, and a 2-byte kind:
//! - `Ping` (peer discovery)
//! - `Token` (returns one unit of transmit credit)
//! - `Data` (carries exactly one 8-byte word)

pub mod codec;
pub mod error;
pub mod kind;

pub use codec::{
    decode_frame, encode_frame, Frame, Word, ADDR_LEN, CONTROL_FRAME_LEN, DATA_FRAME_LEN,
    DEFAULT_ETHERTYPE, HEADER_LEN, MIN_WIRE_FRAME_LEN, WORD_LEN,
};
pub use error::{FrameError, Result};
pub use kind::{FrameKind, KIND_DATA, KIND_PING, KIND_TOKEN};
