//! Reliable word transport between two hosts sharing a raw link.
//!
//! wordlink moves 64-bit words, and messages built from them, across a
//! link-layer medium with credit-based flow control so the receiver's buffer
//! never overflows.
//!
//! # Crate Structure
//!
//! - [`transport`]: raw link abstraction and an in-memory link pair
//! - [`frame`]: fixed-size ping, token and data frames
//! - [`channel`]: peer discovery plus word and message channels (behind `channel` feature)

/// Re-export transport types.
pub mod transport {
    pub use wordlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use wordlink_frame::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use wordlink_channel::*;
}
