use wordlink_transport::MacAddr;

/// A broken protocol invariant.
///
/// None of these can happen between two correct endpoints. Once one is
/// observed the channel should be considered unreliable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// The peer returned more tokens than there were outstanding sends.
    #[error("tx credit token overflow (window {window})")]
    CreditOverflow { window: usize },

    /// A data word arrived while the receive buffer was full.
    #[error("rx buffer overflow (capacity {capacity})")]
    RingOverflow { capacity: usize },

    /// A message header arrived before the previous message completed.
    #[error("message header received while a message is still assembling")]
    UnexpectedHeader,

    /// A header announced more body chunks than this endpoint accepts.
    #[error("message of {chunks} chunks exceeds limit of {max}")]
    OversizedMessage { chunks: u32, max: u32 },
}

/// Errors that can occur on a word or message channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Link-level failure. Fatal to the channel.
    #[error("link error: {0}")]
    Link(#[from] wordlink_transport::LinkError),

    /// The peer broke the protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] Violation),

    /// No peer answered during discovery.
    #[error("no reachable peer: {0}")]
    Unreachable(String),

    /// More than one peer answered during discovery.
    #[error("more than one peer on the link ({first} and {second})")]
    AmbiguousPeer { first: MacAddr, second: MacAddr },

    /// The channel has been shut down.
    #[error("channel closed")]
    Closed,

    /// Configuration rejected before the channel was opened.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An outbound message has more body chunks than a header can describe.
    #[error("message too large ({chunks} chunks, max {max})")]
    MessageTooLarge { chunks: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, ChannelError>;
