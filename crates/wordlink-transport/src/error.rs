/// Errors that can occur on the raw link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// An I/O error occurred on the underlying medium.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link has been closed locally.
    #[error("link closed")]
    Closed,

    /// The frame exceeds what the medium can carry in one unit.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, LinkError>;
