use thiserror::Error;

/// Failure taxonomy for the watch pipeline.
///
/// The retry driver only needs two distinctions: [`WatchError::Cancelled`]
/// aborts the slot immediately, everything else is retryable until the
/// attempt budget runs out.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Network-level failure: connect, TLS handshake, request transmission.
    #[error("transport: {0}")]
    Transport(String),

    /// Local file I/O (config, snapshot).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The attempt deadline fired. Cleanup still runs under a fresh deadline.
    #[error("attempt deadline exceeded")]
    DeadlineExceeded,

    /// Explicit stop signal. Never wrapped, never retried; cleanup network
    /// I/O is skipped.
    #[error("stopped")]
    Cancelled,

    /// Malformed HTML or tag syntax on the login page.
    #[error("parse: {0}")]
    Parse(String),

    /// A scraped hidden field has no registered destination slot.
    #[error("hidden field <{name}> has no destination")]
    MissingField { name: String },

    /// Authentication did not yield the expected session state.
    #[error("http: can't find cookie: {name}")]
    CookieNotFound { name: String },

    /// Malformed JSON from the grid endpoint, or a snapshot that failed to
    /// serialize.
    #[error("json: {0}")]
    Decode(#[from] serde_json::Error),

    /// The server-supplied encryption key is unusable.
    #[error("encoding: {0}")]
    Encoding(&'static str),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("config: {0}")]
    Config(String),

    /// Terminal for the scheduled slot. Carries the last underlying error.
    #[error("maximum attempts: {attempts} reached with error: {cause}")]
    MaxAttemptsExceeded { attempts: u32, cause: Box<WatchError> },
}

impl WatchError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        WatchError::Transport(err.to_string())
    }

    /// Whether this is the explicit-stop signal rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WatchError::Cancelled)
    }
}
