//! Multi-word messages.
//!
//! A message travels as one header chunk followed by its body chunks. The
//! remote decoder expects the most significant chunk first, so the body goes
//! out last-to-first; [`MessageAssembler`] restores natural order on receipt.

use wordlink_frame::Word;

use crate::config::MESSAGE_CHUNKS_LIMIT;
use crate::error::{ChannelError, Result, Violation};

/// One word as it appears inside a message.
pub type Chunk = Word;

const CHANNEL_SHIFT: u32 = 56;
const SERVICE_SHIFT: u32 = 48;
const METHOD_SHIFT: u32 = 32;

/// Routing fields and body length, packed into one chunk.
///
/// ```text
///  63      56 55      48 47              32 31                              0
/// ┌──────────┬──────────┬──────────────────┬─────────────────────────────────┐
/// │ channel  │ service  │ method           │ body chunk count                │
/// └──────────┴──────────┴──────────────────┴─────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageHeader {
    pub channel_id: u8,
    pub service_id: u8,
    pub method_id: u16,
    /// Number of body chunks following the header.
    pub chunk_count: u32,
}

impl MessageHeader {
    /// Pack into one chunk.
    pub fn encode(&self) -> Chunk {
        (u64::from(self.channel_id) << CHANNEL_SHIFT)
            | (u64::from(self.service_id) << SERVICE_SHIFT)
            | (u64::from(self.method_id) << METHOD_SHIFT)
            | u64::from(self.chunk_count)
    }

    /// Unpack a chunk. Every bit pattern is a valid header.
    pub fn decode(chunk: Chunk) -> Self {
        Self {
            channel_id: (chunk >> CHANNEL_SHIFT) as u8,
            service_id: (chunk >> SERVICE_SHIFT) as u8,
            method_id: (chunk >> METHOD_SHIFT) as u16,
            chunk_count: chunk as u32,
        }
    }
}

/// A complete message: routing fields plus body chunks in natural order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub channel_id: u8,
    pub service_id: u8,
    pub method_id: u16,
    body: Vec<Chunk>,
}

impl Message {
    /// Build a message.
    ///
    /// Fails if the body is too long for the header's 32-bit chunk count.
    pub fn new(channel_id: u8, service_id: u8, method_id: u16, body: Vec<Chunk>) -> Result<Self> {
        if u32::try_from(body.len()).is_err() {
            return Err(ChannelError::MessageTooLarge {
                chunks: body.len(),
                max: u32::MAX as usize,
            });
        }
        Ok(Self {
            channel_id,
            service_id,
            method_id,
            body,
        })
    }

    /// The header describing this message.
    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            channel_id: self.channel_id,
            service_id: self.service_id,
            method_id: self.method_id,
            // Checked in `new`.
            chunk_count: self.body.len() as u32,
        }
    }

    /// Body chunks in natural order.
    pub fn body(&self) -> &[Chunk] {
        &self.body
    }

    /// Take the body chunks, in natural order.
    pub fn into_body(self) -> Vec<Chunk> {
        self.body
    }

    /// Number of body chunks, not counting the header.
    pub fn chunk_count(&self) -> usize {
        self.body.len()
    }

    /// Chunks in transmission order: the header, then the body last-to-first.
    pub fn wire_chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        std::iter::once(self.header().encode()).chain(self.body.iter().rev().copied())
    }
}

enum AssemblyState {
    NoMessage,
    Assembling {
        header: MessageHeader,
        body: Vec<Chunk>,
        /// Body chunks still expected. The next one lands at `remaining - 1`.
        remaining: usize,
    },
}

/// Inbound message state machine: `NoMessage → Assembling → Complete`.
///
/// The first word fed is taken as a header. A zero-length body completes
/// immediately. A completed message is returned to the caller and the
/// assembler resets, so only one message is ever in flight.
pub struct MessageAssembler {
    state: AssemblyState,
    max_chunks: u32,
}

impl MessageAssembler {
    /// Create an assembler accepting bodies of up to `max_chunks` chunks.
    ///
    /// The limit is clamped to [`MESSAGE_CHUNKS_LIMIT`].
    pub fn new(max_chunks: u32) -> Self {
        Self {
            state: AssemblyState::NoMessage,
            max_chunks: max_chunks.min(MESSAGE_CHUNKS_LIMIT),
        }
    }

    /// Feed the next word off the wire.
    pub fn feed(&mut self, chunk: Chunk) -> std::result::Result<Option<Message>, Violation> {
        if self.is_assembling() {
            Ok(self.append(chunk))
        } else {
            self.start(MessageHeader::decode(chunk))
        }
    }

    /// Begin a new message.
    ///
    /// Fails with [`Violation::UnexpectedHeader`] while another message is
    /// still assembling; the partial message is kept.
    pub fn start(
        &mut self,
        header: MessageHeader,
    ) -> std::result::Result<Option<Message>, Violation> {
        if self.is_assembling() {
            return Err(Violation::UnexpectedHeader);
        }
        if header.chunk_count > self.max_chunks {
            return Err(Violation::OversizedMessage {
                chunks: header.chunk_count,
                max: self.max_chunks,
            });
        }

        let remaining = header.chunk_count as usize;
        if remaining == 0 {
            return Ok(Some(complete(header, Vec::new())));
        }
        self.state = AssemblyState::Assembling {
            header,
            body: vec![0; remaining],
            remaining,
        };
        Ok(None)
    }

    fn append(&mut self, chunk: Chunk) -> Option<Message> {
        let AssemblyState::Assembling {
            header,
            body,
            remaining,
        } = &mut self.state
        else {
            return None;
        };

        *remaining -= 1;
        body[*remaining] = chunk;
        if *remaining > 0 {
            return None;
        }

        let header = *header;
        let body = std::mem::take(body);
        self.state = AssemblyState::NoMessage;
        Some(complete(header, body))
    }

    /// Whether a message is partially received.
    pub fn is_assembling(&self) -> bool {
        matches!(self.state, AssemblyState::Assembling { .. })
    }

    /// Body chunks still expected for the in-flight message.
    pub fn pending_chunks(&self) -> usize {
        match &self.state {
            AssemblyState::NoMessage => 0,
            AssemblyState::Assembling { remaining, .. } => *remaining,
        }
    }

    /// Drop any partial message.
    pub fn reset(&mut self) {
        self.state = AssemblyState::NoMessage;
    }
}

fn complete(header: MessageHeader, body: Vec<Chunk>) -> Message {
    Message {
        channel_id: header.channel_id,
        service_id: header.service_id,
        method_id: header.method_id,
        body,
    }
}

impl std::fmt::Debug for MessageAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageAssembler")
            .field("assembling", &self.is_assembling())
            .field("pending_chunks", &self.pending_chunks())
            .field("max_chunks", &self.max_chunks)
            .finish()
    }
}
