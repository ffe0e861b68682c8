use std::io;

/// Errors returned by the connection core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("byte buffer pool exhausted")]
    BufferPoolExhausted,
    #[error("operation context pool exhausted")]
    ContextPoolExhausted,
    #[error("a receive callback is already registered")]
    ReceiveCallbackAlreadySet,
    #[error("buffer is not a full chunk of this pool")]
    InvalidBuffer,
}
