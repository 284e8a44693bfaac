use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque optimistic-concurrency token (the store's `lastUpdated`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(pub String);

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The stored envelope and the token it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBlob {
    /// Base64 envelope; empty for a sync that was created but never written.
    pub ciphertext: String,
    pub version: VersionToken,
    /// Version of the client that last wrote the blob.
    pub client_version: String,
}

/// Remote blob store keyed by sync id.
///
/// `push_blob` is a compare-and-swap: it must fail with
/// [`TransportError::VersionConflict`] when `version` is no longer current.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_blob(&self, sync_id: &str) -> Result<RemoteBlob, TransportError>;

    async fn push_blob(
        &self,
        sync_id: &str,
        ciphertext: &str,
        version: &VersionToken,
    ) -> Result<VersionToken, TransportError>;

    async fn last_updated(&self, sync_id: &str) -> Result<VersionToken, TransportError>;

    async fn sync_version(&self, sync_id: &str) -> Result<String, TransportError>;
}
