//! Distribution service client.
//!
//! The engine never speaks the remote wire protocol directly; everything goes
//! through [`DistributionClient`] so sync logic can be unit-tested against
//! scripted catalogs without live network access.

mod client;

pub use client::HttpDistributionClient;

use futures::future::BoxFuture;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::RateLimiter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Opaque identifier of one remote content revision.
///
/// Treated strictly as an equality key; revisions are never compared
/// ordinally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one parallel distribution channel.
pub type ChannelId = u32;

/// One downloadable file listed in a channel catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// File listing for a single channel at the current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCatalog {
    pub channel: ChannelId,
    pub files: Vec<FileRef>,
}

impl ChannelCatalog {
    /// Finds a catalog entry whose name ends with `suffix`.
    ///
    /// Catalog names may carry platform-specific directory prefixes, so
    /// lookups match on suffix rather than full equality.
    pub fn find_by_suffix(&self, suffix: &str) -> Option<&FileRef> {
        self.files.iter().find(|file| file.name.ends_with(suffix))
    }
}

/// Current remote version plus the per-channel catalogs backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub version: VersionId,
    pub catalogs: Vec<ChannelCatalog>,
}

impl ProductSnapshot {
    pub fn catalog(&self, channel: ChannelId) -> Option<&ChannelCatalog> {
        self.catalogs
            .iter()
            .find(|catalog| catalog.channel == channel)
    }
}

/// Shared process-local limiter enforcing one request budget across all
/// concurrent segment fetches in a run.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("connection error: {0}")]
    Connect(String),
    #[error("authentication rejected for account {account}: status {status}")]
    AuthRejected { account: String, status: u16 },
    #[error("unexpected HTTP status while fetching {resource}: {status}")]
    UnexpectedStatus { resource: String, status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Access to the remote distribution service.
///
/// This trait exists so the sync engine can be driven by deterministic
/// scripted snapshots in tests.
pub trait DistributionClient: Send + Sync {
    /// Resolves the current version and per-channel file catalogs for one
    /// product.
    fn product_snapshot<'a>(
        &'a self,
        product_id: u32,
    ) -> BoxFuture<'a, Result<ProductSnapshot, DistributionError>>;

    /// Downloads one catalog entry to `dest`, overwriting any prior content.
    fn fetch_file<'a>(
        &'a self,
        channel: ChannelId,
        file: &'a FileRef,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<(), DistributionError>>;
}

impl<T> DistributionClient for Arc<T>
where
    T: DistributionClient + ?Sized,
{
    fn product_snapshot<'a>(
        &'a self,
        product_id: u32,
    ) -> BoxFuture<'a, Result<ProductSnapshot, DistributionError>> {
        (**self).product_snapshot(product_id)
    }

    fn fetch_file<'a>(
        &'a self,
        channel: ChannelId,
        file: &'a FileRef,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<(), DistributionError>> {
        (**self).fetch_file(channel, file, dest)
    }
}
