//! Document store seam: the asynchronous write primitive the pipeline
//! drives, plus the lazily-initialized shared handle to it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{keys, Settings};
use crate::errors::SinkError;
use crate::record::Document;
use crate::transport::TransportConfig;

/// Target container inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAddress {
    pub database: String,
    pub collection: String,
}

impl CollectionAddress {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SinkError> {
        Ok(Self::new(
            settings.require(keys::DATABASE)?,
            settings.require(keys::COLLECTION)?,
        ))
    }

    /// Self-link form the transport addresses operations with.
    pub fn self_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.collection)
    }
}

impl fmt::Display for CollectionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.self_link())
    }
}

/// Success metadata for one completed write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteReceipt {
    /// Request units billed by the store.
    pub charge: f64,
    pub etag: Option<String>,
}

/// Failure reported by the transport for one write.
///
/// Throttling is retried inside the transport per its configured
/// `RetryOptions`; a `Throttled` value here means those retries are
/// already exhausted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("document with the same identity already exists: {0}")]
    Conflict(String),
    #[error("request rate exhausted transport retries: {0}")]
    Throttled(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether a replay of the same write could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::Timeout(_) | Self::Network(_))
    }
}

impl From<StoreError> for SinkError {
    fn from(err: StoreError) -> Self {
        let code = match err {
            StoreError::Conflict(_) => "WRITE_CONFLICT",
            StoreError::Throttled(_) => "WRITE_THROTTLED",
            StoreError::Timeout(_) => "WRITE_TIMEOUT",
            StoreError::Network(_) => "WRITE_NETWORK",
            StoreError::Internal(_) => "WRITE_FAILED",
        };
        let retryable = err.is_transient();
        SinkError::write(code, err.to_string(), retryable)
    }
}

/// Asynchronous per-document write primitive of the remote store.
///
/// Connection establishment, the wire protocol, and retry-on-throttle all
/// live behind this seam.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document; fails with [`StoreError::Conflict`] if a
    /// document with the same identity exists.
    async fn create(
        &self,
        collection: &CollectionAddress,
        document: Document,
    ) -> Result<WriteReceipt, StoreError>;

    /// Insert or replace a document with the same identity.
    async fn upsert(
        &self,
        collection: &CollectionAddress,
        document: Document,
    ) -> Result<WriteReceipt, StoreError>;
}

/// Lazily-initialized shared store handle.
///
/// The transport configuration is built and the connect closure run at
/// most once, even under concurrent first access; a failed initialization
/// is not cached, so the next caller retries.
pub struct SharedStore<S> {
    settings: Settings,
    connect: Box<dyn Fn(&TransportConfig) -> Result<Arc<S>, SinkError> + Send + Sync>,
    cell: OnceCell<Arc<S>>,
}

impl<S> SharedStore<S> {
    pub fn new<F>(settings: Settings, connect: F) -> Self
    where
        F: Fn(&TransportConfig) -> Result<Arc<S>, SinkError> + Send + Sync + 'static,
    {
        Self {
            settings,
            connect: Box::new(connect),
            cell: OnceCell::new(),
        }
    }

    /// The shared handle, constructing it on first use.
    pub fn handle(&self) -> Result<Arc<S>, SinkError> {
        self.cell
            .get_or_try_init(|| {
                let config = TransportConfig::from_settings(&self.settings)?;
                tracing::info!(
                    endpoint = config.endpoint,
                    mode = ?config.connection_policy.mode,
                    consistency = ?config.consistency_level,
                    preferred_regions = config.connection_policy.preferred_regions.len(),
                    "initializing document store transport"
                );
                (self.connect)(&config)
            })
            .cloned()
    }
}
