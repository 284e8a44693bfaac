//! Fetch / mutate / push against a remote blob store.
//!
//! fetch: blob -> decrypt -> validate -> build. push: serialize -> encrypt ->
//! compare-and-swap on the version token. The client never merges or retries;
//! a `VersionConflict` goes back to the caller, who re-fetches and reapplies.

pub mod api;
pub mod transport;

pub use api::HttpTransport;
pub use transport::{RemoteBlob, Transport, VersionToken};

use crate::cache::Cached;
use crate::config::SyncConfig;
use crate::credentials::Credentials;
use crate::crypto::{self, SyncKey};
use crate::error::{SyncError, SyncResult};
use crate::tree::Tree;
use crate::wire;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A live tree plus the token it was fetched (or last pushed) under.
#[derive(Debug, Clone)]
pub struct SyncedTree {
    pub tree: Tree,
    version: VersionToken,
}

impl SyncedTree {
    pub fn version(&self) -> &VersionToken {
        &self.version
    }
}

pub struct SyncClient<T: Transport> {
    transport: T,
    sync_id: String,
    key: SyncKey,
    cache_max_age: Duration,
    cache: Mutex<Option<Cached<SyncedTree>>>,
}

impl SyncClient<HttpTransport> {
    /// HTTP client from config, credentials verified with one fetch.
    pub async fn connect(config: &SyncConfig, credentials: Credentials) -> SyncResult<(Self, SyncedTree)> {
        let transport = HttpTransport::new(config)?;
        let (client, synced) = Self::login(transport, credentials).await?;
        Ok((client.with_cache_max_age(config.cache_max_age()), synced))
    }
}

impl<T: Transport> SyncClient<T> {
    /// Use an already resolved key. Nothing is checked until the first fetch.
    pub fn new(transport: T, sync_id: impl Into<String>, key: SyncKey) -> Self {
        Self {
            transport,
            sync_id: sync_id.into(),
            key,
            cache_max_age: SyncConfig::default().cache_max_age(),
            cache: Mutex::new(None),
        }
    }

    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = max_age;
        self
    }

    /// Resolve the key (deriving off the executor) and prove it by fetching.
    /// A wrong password shows up as an authentication failure from decrypt.
    pub async fn login(transport: T, credentials: Credentials) -> SyncResult<(Self, SyncedTree)> {
        let (sync_id, key) = credentials.resolve_blocking().await?;
        let client = Self::new(transport, sync_id, key);
        let synced = client.fetch().await?;
        info!(sync_id = %client.sync_id, "logged in");
        Ok((client, synced))
    }

    pub fn sync_id(&self) -> &str {
        &self.sync_id
    }

    /// Storable credentials: the derived key, never the password.
    pub fn credentials(&self) -> Credentials {
        Credentials::key(self.sync_id.clone(), &self.key)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ── fetch ──

    pub async fn fetch(&self) -> SyncResult<SyncedTree> {
        let blob = self.transport.fetch_blob(&self.sync_id).await?;
        debug!(
            sync_id = %self.sync_id,
            bytes = blob.ciphertext.len(),
            version = %blob.version,
            client_version = %blob.client_version,
            "fetched blob"
        );
        let synced = self.decode(blob)?;
        *self.cache.lock() = Some(Cached::new(synced.clone()));
        Ok(synced)
    }

    /// The last fetched tree while it is younger than the cache max age,
    /// otherwise a fresh fetch.
    pub async fn fetch_cached(&self) -> SyncResult<SyncedTree> {
        let hit = self.cache.lock().as_ref().and_then(|c| c.get(self.cache_max_age)).cloned();
        if let Some(hit) = hit {
            debug!(sync_id = %self.sync_id, "cache hit");
            return Ok(hit);
        }
        self.fetch().await
    }

    pub fn invalidate_cache(&self) {
        *self.cache.lock() = None;
    }

    fn decode(&self, blob: RemoteBlob) -> SyncResult<SyncedTree> {
        if blob.ciphertext.trim().is_empty() {
            info!(sync_id = %self.sync_id, "remote is empty");
            return Ok(SyncedTree { tree: Tree::new(), version: blob.version });
        }
        let plaintext = crypto::decrypt(&self.key, &blob.ciphertext)?;
        debug!(bytes = plaintext.len(), "decrypted");
        let tree = Tree::build(wire::parse(&plaintext)?)?;
        info!(sync_id = %self.sync_id, nodes = tree.len(), "fetched bookmarks");
        Ok(SyncedTree { tree, version: blob.version })
    }

    // ── push ──

    /// Upload `synced`. On success its token becomes the store's new token;
    /// on any error it is left as it was.
    pub async fn push(&self, synced: &mut SyncedTree) -> SyncResult<()> {
        let plaintext = wire::to_json(&synced.tree.to_external())?;
        let ciphertext = crypto::encrypt(&self.key, &plaintext)?;
        debug!(plain = plaintext.len(), bytes = ciphertext.len(), "encrypted");

        let version = match self.transport.push_blob(&self.sync_id, &ciphertext, &synced.version).await {
            Ok(v) => v,
            Err(e) => {
                let err = SyncError::from(e);
                if err.is_conflict() {
                    warn!(sync_id = %self.sync_id, stale = %synced.version, "push rejected, remote changed");
                    self.invalidate_cache();
                }
                return Err(err);
            }
        };

        info!(sync_id = %self.sync_id, nodes = synced.tree.len(), version = %version, "pushed bookmarks");
        synced.version = version;
        *self.cache.lock() = Some(Cached::new(synced.clone()));
        Ok(())
    }

    // ── remote status ──

    pub async fn last_updated(&self) -> SyncResult<VersionToken> {
        Ok(self.transport.last_updated(&self.sync_id).await?)
    }

    /// True when the remote moved past the token `synced` holds.
    pub async fn is_stale(&self, synced: &SyncedTree) -> SyncResult<bool> {
        Ok(self.last_updated().await? != synced.version)
    }

    pub async fn sync_version(&self) -> SyncResult<String> {
        Ok(self.transport.sync_version(&self.sync_id).await?)
    }
}
