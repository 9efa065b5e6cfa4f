//! Shared error type across ocigate crates.

use thiserror::Error;

/// Stable error classes surfaced to callers that need to branch on the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required per-request context missing.
    Precondition,
    /// Malformed reference, manifest, digest or body.
    Parse,
    /// Registry backend or transport failure.
    Transport,
    /// Evaluation cancelled or past its deadline.
    Cancelled,
    /// Wrong argument count or type handed to a function.
    Argument,
    /// Invalid configuration.
    Config,
    /// The evaluator itself failed.
    Evaluation,
}

impl ErrorKind {
    /// String representation used in logs and decision payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Precondition => "PRECONDITION",
            ErrorKind::Parse => "PARSE",
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::Argument => "ARGUMENT",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Evaluation => "EVALUATION",
        }
    }
}

/// Errors reported by a registry backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The tag does not exist in the repository. Not a failure for lookups.
    #[error("unknown tag={tag}")]
    TagUnknown { tag: String },
    #[error("invalid repository name {name}: {reason}")]
    NameInvalid { name: String, reason: String },
    #[error("unknown manifest {digest}")]
    ManifestUnknown { digest: String },
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Backend(String),
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, OcigateError>;

/// Unified error type used by core and bridge.
#[derive(Debug, Error)]
pub enum OcigateError {
    #[error("bad context")]
    BadContext,
    #[error("reference without tag")]
    ReferenceWithoutTag,
    #[error("bad reference name: {0}")]
    BadReferenceName(String),
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("empty body request")]
    EmptyBody,
    #[error("invalid body: {0}")]
    InvalidBody(String),
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("bad argument: {0}")]
    BadArgument(String),
    #[error("{context}: {source}")]
    Registry {
        context: String,
        #[source]
        source: RegistryError,
    },
    #[error("read body failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("evaluation cancelled")]
    Cancelled,
    #[error("evaluation deadline exceeded")]
    DeadlineExceeded,
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("{location} builtin eval {function} error: {source}")]
    Builtin {
        location: String,
        function: String,
        #[source]
        source: Box<OcigateError>,
    },
}

impl OcigateError {
    /// Attach the registry call that failed.
    pub fn registry(context: impl Into<String>, source: RegistryError) -> Self {
        OcigateError::Registry {
            context: context.into(),
            source,
        }
    }

    /// Map an error to its stable class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OcigateError::BadContext => ErrorKind::Precondition,
            OcigateError::ReferenceWithoutTag
            | OcigateError::BadReferenceName(_)
            | OcigateError::InvalidDigest(_)
            | OcigateError::InvalidManifest(_)
            | OcigateError::EmptyBody
            | OcigateError::InvalidBody(_)
            | OcigateError::InvalidEvent(_) => ErrorKind::Parse,
            OcigateError::BadArgument(_) => ErrorKind::Argument,
            OcigateError::Registry { .. } | OcigateError::Io(_) => ErrorKind::Transport,
            OcigateError::Cancelled | OcigateError::DeadlineExceeded => ErrorKind::Cancelled,
            OcigateError::Evaluation(_) => ErrorKind::Evaluation,
            OcigateError::Config(_) | OcigateError::UnsupportedVersion => ErrorKind::Config,
            OcigateError::Builtin { source, .. } => source.kind(),
        }
    }

    /// Innermost error, skipping builtin annotations.
    pub fn root(&self) -> &OcigateError {
        match self {
            OcigateError::Builtin { source, .. } => source.root(),
            other => other,
        }
    }
}
