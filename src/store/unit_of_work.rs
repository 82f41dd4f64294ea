use std::fmt;

use async_trait::async_trait;

use super::{Store, StoreError, StoreTx};

/// A self-contained piece of work that runs inside its own transaction.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Output: Send;
    type Error: From<StoreError> + fmt::Display + Send;

    /// Short label used in logs ("upsert trade abc123").
    fn describe(&self) -> String;

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Self::Output, Self::Error>;
}

/// Outcome of a batch: successes in input order plus the failed units.
#[derive(Debug)]
pub struct BatchReport<T, E> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(String, E)>,
}

impl<T, E> BatchReport<T, E> {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Run one unit: commit on success, roll back on error.
pub async fn execute<U>(store: &dyn Store, unit: &U) -> Result<U::Output, U::Error>
where
    U: UnitOfWork + ?Sized,
{
    let mut tx = store.begin().await?;

    match unit.run(tx.as_mut()).await {
        Ok(output) => {
            tx.commit().await?;
            Ok(output)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(
                    unit = %unit.describe(),
                    error = %rb,
                    "Rollback failed"
                );
            }
            Err(e)
        }
    }
}

/// Run units in sequential chunks of `batch_size`. Each unit is isolated:
/// a failure rolls back that unit only and the batch moves on.
pub async fn execute_batch<U>(
    store: &dyn Store,
    units: &[U],
    batch_size: usize,
) -> BatchReport<U::Output, U::Error>
where
    U: UnitOfWork,
{
    let mut report = BatchReport {
        succeeded: Vec::with_capacity(units.len()),
        failed: Vec::new(),
    };

    for (batch_no, chunk) in units.chunks(batch_size.max(1)).enumerate() {
        tracing::debug!(batch = batch_no, size = chunk.len(), "Processing unit batch");

        for unit in chunk {
            match execute(store, unit).await {
                Ok(output) => report.succeeded.push(output),
                Err(e) => {
                    tracing::error!(unit = %unit.describe(), error = %e, "Unit of work failed");
                    report.failed.push((unit.describe(), e));
                }
            }
        }

        tokio::task::yield_now().await;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    struct ReadPrice {
        fail: bool,
    }

    #[async_trait]
    impl UnitOfWork for ReadPrice {
        type Output = Option<Decimal>;
        type Error = StoreError;

        fn describe(&self) -> String {
            format!("read price (fail={})", self.fail)
        }

        async fn run(&self, tx: &mut dyn StoreTx) -> Result<Self::Output, Self::Error> {
            if self.fail {
                return Err(StoreError::Conflict("boom".into()));
            }
            tx.selling_price().await
        }
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let store = MemoryStore::new();
        store.set_selling_price(Decimal::from(1500)).await;

        let units = vec![
            ReadPrice { fail: false },
            ReadPrice { fail: true },
            ReadPrice { fail: false },
            ReadPrice { fail: false },
        ];
        let report = execute_batch(&store, &units, 2).await;

        assert_eq!(report.succeeded.len(), 3);
        assert_eq!(report.failed_count(), 1);
        assert!(report.succeeded.iter().all(|p| *p == Some(Decimal::from(1500))));
    }

    #[tokio::test]
    async fn test_zero_batch_size_still_runs() {
        let store = MemoryStore::new();
        let units = vec![ReadPrice { fail: false }];
        let report = execute_batch(&store, &units, 0).await;
        assert_eq!(report.succeeded.len(), 1);
    }
}
