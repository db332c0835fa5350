//! Client-side bulk ingestion into remote document stores: bounded-concurrency
//! batched writes with configurable consistency, retry tuning, and pacing.

pub mod config;
pub mod errors;
pub mod logging;
pub mod record;
pub mod store;
pub mod transport;
pub mod writer;

// Re-export public API for convenience
pub use config::{Settings, WriteOptions};
pub use errors::{ErrorCategory, SinkError};
pub use record::{to_document, Document, Record, Row};
pub use store::{CollectionAddress, DocumentStore, SharedStore, StoreError, WriteReceipt};
pub use transport::{
    ConnectionMode, ConnectionPolicy, ConsistencyLevel, Credential, RetryOptions, TransportConfig,
};
pub use writer::{BatchWriter, WriteSummary};
