//! Chunked batch writes against a [`RecordKvStore`].

use std::time::Duration;
use tracing::{debug, warn};

use crate::{RecordKvStore, Result, ScalarRow, StorageError};

/// Rows sent per batch request.
pub const BATCH_SIZE: usize = 25;

/// Retry bounds for rejected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per batch, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            pause: Duration::from_secs(2),
        }
    }
}

/// Writes rows in batches of [`BATCH_SIZE`], re-sending only rejected rows.
#[derive(Debug)]
pub struct BatchWriter<'a> {
    store: &'a dyn RecordKvStore,
    policy: RetryPolicy,
}

impl<'a> BatchWriter<'a> {
    /// Creates a writer with the default retry policy.
    #[must_use]
    pub fn new(store: &'a dyn RecordKvStore) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Writes every row to `table` and returns the number written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Rejected`] if a batch still has rejected rows
    /// after `max_attempts`, or any store error.
    pub fn write_all(&self, table: &str, rows: &[ScalarRow]) -> Result<usize> {
        let total = rows.len();
        for (idx, batch) in rows.chunks(BATCH_SIZE).enumerate() {
            let mut pending = batch.to_vec();
            let mut attempts = 0;
            while !pending.is_empty() {
                attempts += 1;
                pending = self.store.write_scalar_rows_batch(table, &pending)?;
                if pending.is_empty() {
                    break;
                }
                if attempts >= self.policy.max_attempts {
                    return Err(StorageError::Rejected {
                        table: table.to_string(),
                        count: pending.len(),
                        attempts,
                    });
                }
                warn!(
                    table,
                    rejected = pending.len(),
                    attempt = attempts,
                    "batch partially rejected, retrying"
                );
                std::thread::sleep(self.policy.pause);
            }
            let written = ((idx + 1) * BATCH_SIZE).min(total);
            debug!(table, written, total, "batch committed");
        }
        Ok(total)
    }
}
