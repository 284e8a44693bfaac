use crate::crypto::SyncKey;
use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a user hands over to open a sync: either the password, which is
/// stretched into a key, or a previously exported key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    #[serde(rename_all = "camelCase")]
    Password { sync_id: String, password: String },
    #[serde(rename_all = "camelCase")]
    Key {
        sync_id: String,
        #[serde(rename = "base64key")]
        key: String,
    },
}

impl Credentials {
    pub fn password(sync_id: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password { sync_id: sync_id.into(), password: password.into() }
    }

    pub fn key(sync_id: impl Into<String>, key: &SyncKey) -> Self {
        Credentials::Key { sync_id: sync_id.into(), key: key.to_base64() }
    }

    pub fn sync_id(&self) -> &str {
        match self {
            Credentials::Password { sync_id, .. } | Credentials::Key { sync_id, .. } => sync_id,
        }
    }

    /// Produce the key. Password derivation blocks for a noticeable time.
    pub fn resolve(&self) -> SyncResult<SyncKey> {
        if self.sync_id().is_empty() {
            return Err(SyncError::Credentials("empty sync id".to_string()));
        }
        match self {
            Credentials::Password { sync_id, password } => {
                if password.is_empty() {
                    return Err(SyncError::Credentials("empty password".to_string()));
                }
                Ok(SyncKey::derive(password, sync_id))
            }
            Credentials::Key { key, .. } => Ok(SyncKey::from_base64(key)?),
        }
    }

    /// [`resolve`](Self::resolve) off the async executor.
    pub async fn resolve_blocking(self) -> SyncResult<(String, SyncKey)> {
        tokio::task::spawn_blocking(move || -> SyncResult<(String, SyncKey)> {
            let key = self.resolve()?;
            let sync_id = match self {
                Credentials::Password { sync_id, .. } | Credentials::Key { sync_id, .. } => sync_id,
            };
            Ok((sync_id, key))
        })
        .await
        .map_err(|e| SyncError::Credentials(format!("key derivation task: {}", e)))?
    }
}

// keep secrets out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { sync_id, .. } => {
                f.debug_struct("Password").field("sync_id", sync_id).finish_non_exhaustive()
            }
            Credentials::Key { sync_id, .. } => f.debug_struct("Key").field("sync_id", sync_id).finish_non_exhaustive(),
        }
    }
}
