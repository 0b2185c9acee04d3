//! Error types and handling for framebind

/// Result type alias for framebind operations
pub type Result<T> = std::result::Result<T, FrameBindError>;

/// Error taxonomy shared by the pool manager, channel registry, bind graph and router
#[derive(Debug, thiserror::Error)]
pub enum FrameBindError {
    /// Malformed size, zero count or mismatched configuration
    #[error("Invalid argument: {parameter} - {message}")]
    InvalidArgument { parameter: String, message: String },

    /// Operation not valid for the channel's current lifecycle state
    #[error("Illegal state for {channel}: {message}")]
    IllegalState { channel: String, message: String },

    /// Channel identity already registered
    #[error("Duplicate channel: {channel}")]
    DuplicateChannel { channel: String },

    /// Source already has an outgoing edge
    #[error("Already bound: {src} -> {existing}")]
    AlreadyBound { src: String, existing: String },

    /// The requested edge does not exist
    #[error("Not bound: {src} -> {dst}")]
    NotBound { src: String, dst: String },

    /// Resource saturated or still referenced
    #[error("Busy: {resource}")]
    Busy { resource: String },

    /// Deadline expired before the operation could complete
    #[error("Timed out after {timeout_ms} ms: {operation}")]
    Timeout { operation: String, timeout_ms: i32 },

    /// Non-blocking pool request with no free block
    #[error("Pool {pool} exhausted ({capacity} blocks in use)")]
    Exhausted { pool: u32, capacity: usize },

    /// Reference count underflow or stale handle
    #[error("Double free of block {block} in pool {pool}")]
    DoubleFree { pool: u32, block: usize },

    /// Cached buffer handed over without a flush for reader visibility
    #[error("Buffer {block} in pool {pool} was not flushed before handoff")]
    Unflushed { pool: u32, block: usize },

    /// Unknown pool or channel
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// I/O errors from byte sources and sinks
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl FrameBindError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an illegal state error
    pub fn illegal_state(channel: impl ToString, message: impl Into<String>) -> Self {
        Self::IllegalState {
            channel: channel.to_string(),
            message: message.into(),
        }
    }

    /// Create a duplicate channel error
    pub fn duplicate_channel(channel: impl ToString) -> Self {
        Self::DuplicateChannel {
            channel: channel.to_string(),
        }
    }

    /// Create an already bound error
    pub fn already_bound(src: impl ToString, existing: impl ToString) -> Self {
        Self::AlreadyBound {
            src: src.to_string(),
            existing: existing.to_string(),
        }
    }

    /// Create a not bound error
    pub fn not_bound(src: impl ToString, dst: impl ToString) -> Self {
        Self::NotBound {
            src: src.to_string(),
            dst: dst.to_string(),
        }
    }

    /// Create a busy error
    pub fn busy(resource: impl Into<String>) -> Self {
        Self::Busy {
            resource: resource.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: i32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// `Busy` and `Timeout` are transient; callers may back off and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::Timeout { .. })
    }

    /// Short, stable name of the variant for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::IllegalState { .. } => "illegal_state",
            Self::DuplicateChannel { .. } => "duplicate_channel",
            Self::AlreadyBound { .. } => "already_bound",
            Self::NotBound { .. } => "not_bound",
            Self::Busy { .. } => "busy",
            Self::Timeout { .. } => "timeout",
            Self::Exhausted { .. } => "exhausted",
            Self::DoubleFree { .. } => "double_free",
            Self::Unflushed { .. } => "unflushed",
            Self::NotFound { .. } => "not_found",
            Self::Io { .. } => "io",
        }
    }
}

impl From<std::io::Error> for FrameBindError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}
