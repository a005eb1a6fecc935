use thiserror::Error;

/// Errors raised while decoding or transporting protocol data
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown command code {0}")]
    UnknownCommand(u8),

    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("step out of order: expected frame {expected}, got {got}")]
    FrameOrder { expected: u32, got: u32 },

    #[error("connection closed")]
    Closed,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}
