//! Batched asynchronous write pipeline.
//!
//! Submission is iterator-driven and sequential; only the per-batch wait
//! parallelizes network work. At most `batch_size` operations are in
//! flight at any moment, and every operation of batch N settles before
//! any operation of batch N+1 is submitted.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::config::WriteOptions;
use crate::errors::SinkError;
use crate::record::{to_document, Record};
use crate::store::{CollectionAddress, DocumentStore, StoreError, WriteReceipt};

/// Aggregate outcome of one completed import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteSummary {
    pub records_written: u64,
    pub batches_flushed: u64,
    /// Total request units billed across all receipts.
    pub total_charge: f64,
    pub flush_secs: f64,
}

/// Drives bulk ingestion of records into one collection.
pub struct BatchWriter<S> {
    store: Arc<S>,
    collection: CollectionAddress,
}

impl<S: DocumentStore + 'static> BatchWriter<S> {
    pub fn new(store: Arc<S>, collection: CollectionAddress) -> Self {
        Self { store, collection }
    }

    /// Write every record of `records` into the collection.
    ///
    /// Records are converted and submitted in iteration order. Once
    /// `options.batch_size` submissions have accumulated, the pipeline
    /// waits for all of them to settle before submitting more; with a
    /// non-zero `inter_batch_delay` it then sleeps before the next batch.
    /// A trailing partial batch is awaited the same way, without the
    /// delay.
    ///
    /// # Errors
    ///
    /// The first conversion or write failure aborts the import. Writes
    /// from batches already flushed remain committed in the store; the
    /// failing batch's outstanding operations are cancelled.
    pub async fn import_batch<I>(
        &self,
        records: I,
        options: &WriteOptions,
    ) -> Result<WriteSummary, SinkError>
    where
        I: IntoIterator<Item = Record>,
    {
        options.validate()?;

        tracing::debug!(
            collection = %self.collection,
            batch_size = options.batch_size,
            delay_ms = options.inter_batch_delay.as_millis() as u64,
            upsert = options.upsert,
            "starting batched import"
        );

        let flush_start = Instant::now();
        let mut inflight: JoinSet<Result<WriteReceipt, StoreError>> = JoinSet::new();
        let mut added = 0usize;
        let mut summary = WriteSummary::default();

        for record in records {
            let document = to_document(record, options.root_field.as_deref())?;

            let store = Arc::clone(&self.store);
            let collection = self.collection.clone();
            let upsert = options.upsert;
            inflight.spawn(async move {
                if upsert {
                    store.upsert(&collection, document).await
                } else {
                    store.create(&collection, document).await
                }
            });
            added += 1;

            if added == options.batch_size {
                drain_batch(&mut inflight, &mut summary).await?;
                tracing::debug!(
                    collection = %self.collection,
                    batch = summary.batches_flushed,
                    records_written = summary.records_written,
                    "batch flushed"
                );
                if !options.inter_batch_delay.is_zero() {
                    tokio::time::sleep(options.inter_batch_delay).await;
                }
                added = 0;
            }
        }

        // Trailing partial batch; no pacing delay afterwards.
        if added > 0 {
            drain_batch(&mut inflight, &mut summary).await?;
        }

        summary.flush_secs = flush_start.elapsed().as_secs_f64();
        tracing::info!(
            collection = %self.collection,
            records_written = summary.records_written,
            batches_flushed = summary.batches_flushed,
            total_charge = summary.total_charge,
            flush_secs = summary.flush_secs,
            "import completed"
        );
        Ok(summary)
    }
}

/// Await every in-flight operation of the current batch.
///
/// On the first observed failure the remaining operations are aborted and
/// their cancelled joins drained before the failure propagates.
async fn drain_batch(
    inflight: &mut JoinSet<Result<WriteReceipt, StoreError>>,
    summary: &mut WriteSummary,
) -> Result<(), SinkError> {
    let mut first_error: Option<SinkError> = None;

    while let Some(joined) = inflight.join_next().await {
        match joined {
            Ok(Ok(receipt)) => {
                summary.records_written += 1;
                summary.total_charge += receipt.charge;
            }
            Ok(Err(store_err)) => {
                if first_error.is_none() {
                    tracing::error!(error = %store_err, "write failed, aborting batch");
                    first_error = Some(store_err.into());
                    inflight.abort_all();
                }
            }
            Err(join_err) if join_err.is_cancelled() && first_error.is_some() => {
                // Expected: siblings cancelled after the first failure.
            }
            Err(join_err) => {
                return Err(SinkError::internal(
                    "WRITE_TASK_PANICKED",
                    format!("write task panicked: {join_err}"),
                ));
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => {
            summary.batches_flushed += 1;
            Ok(())
        }
    }
}
