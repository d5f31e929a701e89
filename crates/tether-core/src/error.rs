//! Shared error type across tether crates.

use thiserror::Error;

/// Coarse error classes (stable API).
///
/// The class decides how a failure is handled: protocol errors drop a frame,
/// dispatch errors become failure responses, everything else reaches the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or unsupported frame.
    Protocol,
    /// Timeout or duplicate request id.
    Correlation,
    /// Target/method/service resolution or service failure on the server.
    Dispatch,
    /// Connect/write failures and closed channels.
    Transport,
    /// Missing chain attributes or empty candidate lists.
    Precondition,
    /// The remote executed the call and reported a failure.
    Remote,
    /// Invalid configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorClass {
    /// String representation used in logs and tests.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Protocol => "PROTOCOL",
            ErrorClass::Correlation => "CORRELATION",
            ErrorClass::Dispatch => "DISPATCH",
            ErrorClass::Transport => "TRANSPORT",
            ErrorClass::Precondition => "PRECONDITION",
            ErrorClass::Remote => "REMOTE",
            ErrorClass::Config => "CONFIG",
            ErrorClass::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Unified error type used by core and runtime.
#[derive(Debug, Error)]
pub enum RpcError {
    // protocol
    #[error("bad magic number: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 5], found: [u8; 5] },
    #[error("unsupported protocol version: {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("unknown message kind: {0:#04x}")]
    UnknownMessageKind(u8),
    #[error("unknown response status: {0:#04x}")]
    UnknownStatus(u8),
    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("compression failed: {0}")]
    Compression(String),

    // registry
    #[error("no {capability} component named `{name}`")]
    UnknownComponent { capability: &'static str, name: String },
    #[error("no {capability} component with wire id {id:#04x}")]
    UnknownComponentId { capability: &'static str, id: u8 },

    // correlation
    #[error("request {request_id} timed out after {timeout_ms}ms")]
    Timeout { request_id: String, timeout_ms: u64 },
    #[error("request id already in flight: {0}")]
    DuplicateRequest(String),

    // dispatch
    #[error("service not found: no interface named `{0}`")]
    UnknownTarget(String),
    #[error("method not found: {target}#{method}({params})")]
    MethodNotFound {
        target: String,
        method: String,
        params: String,
    },
    #[error("service not found: `{0}` has no registered instance")]
    ServiceNotFound(String),
    #[error("invocation failed: {0}")]
    Invocation(String),

    // transport
    #[error("cannot connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },
    #[error("write failed: {0}")]
    Write(String),
    #[error("connection closed")]
    ChannelClosed,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    // chain preconditions
    #[error("missing required attribute `{name}` ({expected})")]
    MissingAttribute { name: String, expected: &'static str },
    #[error("no available address for {0}")]
    NoAvailableAddress(String),

    #[error("remote failure: {0}")]
    Remote(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RpcError {
    /// Map the error to its class.
    pub fn class(&self) -> ErrorClass {
        match self {
            RpcError::BadMagic { .. }
            | RpcError::UnsupportedVersion(_)
            | RpcError::UnknownMessageKind(_)
            | RpcError::UnknownStatus(_)
            | RpcError::FrameTooLarge { .. }
            | RpcError::Malformed(_)
            | RpcError::Serialization(_)
            | RpcError::Compression(_)
            | RpcError::UnknownComponentId { .. } => ErrorClass::Protocol,
            RpcError::Timeout { .. } | RpcError::DuplicateRequest(_) => ErrorClass::Correlation,
            RpcError::UnknownTarget(_)
            | RpcError::MethodNotFound { .. }
            | RpcError::ServiceNotFound(_)
            | RpcError::Invocation(_) => ErrorClass::Dispatch,
            RpcError::Connect { .. }
            | RpcError::Write(_)
            | RpcError::ChannelClosed
            | RpcError::Io(_) => ErrorClass::Transport,
            RpcError::MissingAttribute { .. } | RpcError::NoAvailableAddress(_) => {
                ErrorClass::Precondition
            }
            RpcError::Remote(_) => ErrorClass::Remote,
            RpcError::UnknownComponent { .. } | RpcError::Config(_) => ErrorClass::Config,
            RpcError::Internal(_) => ErrorClass::Internal,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}
