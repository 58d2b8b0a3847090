use thiserror::Error;

pub type EcResult<T> = Result<T, EcError>;

/// Top-level error type for the EC client library.
///
/// Mirrors the four error categories of the wire protocol: a connection
/// lifecycle failure, a transport failure, a malformed-frame failure, and a
/// programmer error in the version-parameterized code tables.
#[derive(Error, Debug)]
pub enum EcError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("unknown protocol version: 0x{0:04x}")]
    Version(u16),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("server returned EC_OP_FAILED: {0}")]
    RequestFailed(String),
}

impl EcError {
    pub(crate) fn decoding<S: Into<String>>(msg: S) -> Self {
        EcError::Decoding(msg.into())
    }

    pub(crate) fn connection<S: Into<String>>(msg: S) -> Self {
        EcError::Connection(msg.into())
    }
}
