//! Credit flow-controlled channels over a raw link.
//!
//! This is the layer most users want. Find the one peer on a link, then
//! exchange 64-bit words or multi-word messages with it.
//!
//! Each endpoint may have at most `window` words in flight. Writers block
//! while the window is exhausted; every word the reader consumes sends a
//! token back that restores one unit of credit. A background receiver
//! thread moves inbound data into a bounded buffer, so the buffer can never
//! overflow between correct peers.
//!
//! ```no_run
//! use wordlink_channel::{ChannelConfig, WordChannel};
//! # fn open_link() -> wordlink_transport::MemoryLink { unimplemented!() }
//!
//! # fn main() -> wordlink_channel::Result<()> {
//! let channel = WordChannel::connect(open_link(), &ChannelConfig::default())?;
//! channel.write_blocking(0xC0FFEE)?;
//! let reply = channel.read_blocking()?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credit;
pub mod discovery;
pub mod error;
pub mod message;
pub mod message_channel;
pub mod receiver;
pub mod ring;
pub mod stats;
pub mod word;

pub use config::{
    ChannelConfig, DiscoveryConfig, DEFAULT_MAX_MESSAGE_CHUNKS, DEFAULT_WINDOW, MESSAGE_CHUNKS_LIMIT,
};
pub use credit::CreditGate;
pub use discovery::{discover, PeerInfo};
pub use error::{ChannelError, Result, Violation};
pub use message::{Chunk, Message, MessageAssembler, MessageHeader};
pub use message_channel::MessageChannel;
pub use receiver::ReceiverLoop;
pub use ring::WordRingBuffer;
pub use stats::ChannelStats;
pub use word::WordChannel;
