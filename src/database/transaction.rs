//! Transaction Executor
//!
//! Runs a unit of work inside one store transaction: commit on success,
//! rollback on failure, exactly one of the two per call.

use futures::future::BoxFuture;

use super::store::{AccountStore, StoreError, StoreResult, StoreTx};

/// Execute `work` in a fresh transaction and return its value.
///
/// ```rust,ignore
/// let exists = execute_in_tx(store, move |tx| {
///     Box::pin(async move { tx.account_conflicts(&nickname, &email).await })
/// })
/// .await?;
/// ```
///
/// If the returned future is dropped before completion the transaction is
/// dropped with it and the store discards its writes.
pub async fn execute_in_tx<T, E, F>(store: &dyn AccountStore, work: F) -> Result<T, E>
where
    T: Send,
    E: From<StoreError> + Send,
    F: for<'t> FnOnce(&'t mut dyn StoreTx) -> BoxFuture<'t, Result<T, E>> + Send,
{
    let mut tx = store.begin().await?;

    match work(tx.as_mut()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                log::warn!("Transaction rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

/// Convenience wrapper when the unit of work only produces store errors
pub async fn execute_store_tx<T, F>(store: &dyn AccountStore, work: F) -> StoreResult<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn StoreTx) -> BoxFuture<'t, StoreResult<T>> + Send,
{
    execute_in_tx(store, work).await
}
