//! Raw point-to-point link abstraction.
//!
//! A [`Link`] moves whole link-layer frames to and from a medium that is shared
//! with at most one interesting peer. It knows nothing about frame contents;
//! classifying frames is the job of the layers above.
//!
//! This is the lowest layer of wordlink. An in-memory [`MemoryLink`] pair is
//! provided for loopback use and tests.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{LinkError, Result};
pub use memory::MemoryLink;
pub use traits::{Link, MacAddr, MAX_FRAME_SIZE};
