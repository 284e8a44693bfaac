use thiserror::Error;

/// Untrusted wire data did not match the bookmark schema.
/// `path` points at the offending value, e.g. `$[1].children[0].url`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid bookmark data at {path}: {reason}")]
pub struct ValidationError {
    pub path: String,
    pub reason: String,
}

impl ValidationError {
    pub(crate) fn new(path: &str, reason: impl Into<String>) -> Self {
        Self { path: path.to_string(), reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("duplicate ids: {0:?}")]
    DuplicateIdentifier(Vec<i64>),
    // unreachable after a breadth-first discovery pass
    #[error("node {id} references parent {parent:?} which was never materialized")]
    OrphanNode { id: i64, parent: Option<i64> },
    #[error("node {id} sits {depth} levels deep")]
    TooDeep { id: i64, depth: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("source not found")]
    SourceNotFound,
    #[error("destination not found")]
    DestinationNotFound,
    #[error("target not found")]
    TargetNotFound,
    #[error("source has no parent")]
    SourceHasNoParent,
    #[error("target has no parent")]
    TargetHasNoParent,
    #[error("cannot move a folder into itself or one of its descendants")]
    CyclicMove,
    #[error("result would nest deeper than {} levels", crate::wire::MAX_DEPTH)]
    TooDeep,
    #[error("no identifiers left above the current maximum")]
    IdentifierExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("encrypt failed")]
    Encryption,
    #[error("decrypt failed: {0}")]
    Decryption(String),
    #[error("ciphertext failed authentication")]
    AuthenticationFailure,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("config parse {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
    #[error("config value {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("remote bookmarks changed since the last fetch")]
    VersionConflict,
    #[error("sync id not found")]
    NotFound,
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network: {0}")]
    Network(String),
    #[error("bad response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Protocol(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(TransportError),
    // split out of Transport so callers can match the fetch-merge-retry case directly
    #[error("remote bookmarks changed since the last fetch")]
    VersionConflict,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("decrypted payload is not json: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("credentials: {0}")]
    Credentials(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::VersionConflict => SyncError::VersionConflict,
            other => SyncError::Transport(other),
        }
    }
}

impl SyncError {
    /// True when a fetch-merge-retry cycle can resolve the failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::VersionConflict)
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
