//! Encrypted bookmark sync.
//!
//! A bookmark collection is stored remotely as one encrypted blob. [`SyncClient`]
//! fetches and decrypts it into a [`Tree`], callers edit the tree in memory,
//! and [`SyncClient::push`] writes it back guarded by the version token from
//! the fetch.

pub mod cache;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
mod lzutf8;
pub mod sync;
pub mod telemetry;
pub mod tree;
pub mod wire;

pub use config::SyncConfig;
pub use credentials::Credentials;
pub use crypto::SyncKey;
pub use error::{
    BuildError, ConfigError, CryptoError, MutationError, SyncError, SyncResult, TransportError, ValidationError,
};
pub use sync::{HttpTransport, RemoteBlob, SyncClient, SyncedTree, Transport, VersionToken};
pub use tree::{Bookmark, Folder, NewBookmark, NewFolder, Node, NodeRef, Selector, Tree, ROOT_ID};
pub use wire::{Item, MAX_DEPTH};
