use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::io;
use std::sync::Arc;

/// Stable tag identifying what kind of failure an [Error] is.
///
/// Retry decisions are made on kinds, never on concrete Rust types, so the
/// lists inside [RetryConfig](crate::RetryConfig) stay meaningful no matter
/// which library produced the failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection could not be established or was dropped
    Connect,
    /// Socket read/write timed out
    SocketTimeout,
    /// Generic I/O failure
    Io,
    /// An operation-level timeout elapsed
    Timeout,
    /// An asynchronous computation completed with a failure
    Completion,
    InvalidArgument,
    Security,
    Unsupported,
    /// The wait between attempts was cancelled
    Interrupted,
    Unknown,
    /// Caller-defined failure type
    Custom(Cow<'static, str>),
}

impl ErrorKind {
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Custom(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Connect => "Connect",
            Self::SocketTimeout => "SocketTimeout",
            Self::Io => "Io",
            Self::Timeout => "Timeout",
            Self::Completion => "Completion",
            Self::InvalidArgument => "InvalidArgument",
            Self::Security => "Security",
            Self::Unsupported => "Unsupported",
            Self::Interrupted => "Interrupted",
            Self::Unknown => "Unknown",
            Self::Custom(name) => &**name,
        }
    }

    /// More general kind this one specialises, if any
    pub fn parent(&self) -> Option<ErrorKind> {
        match self {
            Self::Connect | Self::SocketTimeout => Some(Self::Io),
            _ => None,
        }
    }

    /// Whether a list entry `kind` covers `self`, either directly or
    /// through one of its ancestors.
    pub fn is_a(&self, kind: &ErrorKind) -> bool {
        if self == kind {
            return true;
        }
        match self.parent() {
            Some(parent) => parent.is_a(kind),
            None => false,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure produced by a retried operation.
///
/// Cloning is cheap: the payload is shared, so the same failure can be kept
/// both on the [attempt](crate::RetryAttempt) that produced it and as the
/// [result's](crate::RetryResult) final error.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    error: Arc<anyhow::Error>,
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        Debug::fmt(&*self.error, f)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&*self.error, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

impl Error {
    pub fn msg<M: Display + Debug + Send + Sync + 'static>(kind: ErrorKind, msg: M) -> Self {
        Self::from_anyhow(kind, anyhow::Error::msg(msg))
    }

    pub fn new<E: std::error::Error + Send + Sync + 'static>(kind: ErrorKind, e: E) -> Self {
        Self::from_anyhow(kind, anyhow::Error::new(e))
    }

    pub fn from_anyhow(kind: ErrorKind, error: anyhow::Error) -> Self {
        Self { kind, error: Arc::new(error) }
    }

    pub(crate) fn interrupted() -> Self {
        Self::msg(ErrorKind::Interrupted, "retry interrupted")
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn downcast_ref<E: Display + Debug + Send + Sync + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }
}

fn io_kind(e: &io::Error) -> ErrorKind {
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => ErrorKind::Connect,
        io::ErrorKind::TimedOut => ErrorKind::SocketTimeout,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => ErrorKind::InvalidArgument,
        io::ErrorKind::PermissionDenied => ErrorKind::Security,
        io::ErrorKind::Unsupported => ErrorKind::Unsupported,
        _ => ErrorKind::Io,
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(io_kind(&e), e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Self::new(ErrorKind::Timeout, e)
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        let kind = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<io::Error>())
            .map_or(ErrorKind::Unknown, io_kind);
        Self::from_anyhow(kind, error)
    }
}

/// Returned from [RetryConfigBuilder::build](crate::RetryConfigBuilder::build)
/// when the requested policy is inconsistent
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidConfig {
    ZeroAttempts,
    InitialDelayExceedsMax,
    Multiplier(f64),
}

impl Display for InvalidConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroAttempts => f.write_str("max_attempts must be at least 1"),
            Self::InitialDelayExceedsMax => f.write_str("initial_delay must not exceed max_delay"),
            Self::Multiplier(m) => write!(f, "backoff_multiplier must be finite and >= 1.0, got {m}"),
        }
    }
}

impl std::error::Error for InvalidConfig {}
