/*!
 * Transaction Helper Utilities
 *
 * Runs a unit of work inside a database transaction, committing on `Ok` and
 * rolling back on `Err`. Unlike a plain `DbErr` wrapper, the caller's own
 * error type survives the round-trip so business failures such as
 * insufficient stock reach the caller intact.
 */

use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionError, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};
use uuid::Uuid;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Execute a function within a database transaction
///
/// # Example
///
/// ```rust,ignore
/// use kitchen_ops::db::with_transaction;
///
/// let order = with_transaction(&db, move |txn| {
///     Box::pin(async move {
///         deduct(txn, stock_id, quantity).await?;
///         mark_approved(txn, order_id).await
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T, E>(db: &DatabaseConnection, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: From<DbErr> + std::error::Error + Send,
{
    let transaction_id = Uuid::new_v4();
    let start = std::time::Instant::now();

    debug!(transaction_id = %transaction_id, "Starting database transaction");
    counter!("kitchen_ops_db.transaction.started", 1);

    let result = db.transaction::<_, T, E>(f).await;

    let elapsed = start.elapsed();
    histogram!("kitchen_ops_db.transaction.duration", elapsed.as_secs_f64());

    match &result {
        Ok(_) => {
            counter!("kitchen_ops_db.transaction.committed", 1);
            debug!(transaction_id = %transaction_id, "Transaction committed in {:?}", elapsed);
        }
        Err(_) => {
            counter!("kitchen_ops_db.transaction.rolled_back", 1);
            warn!(transaction_id = %transaction_id, "Transaction rolled back after {:?}", elapsed);
        }
    }

    result.map_err(|e| match e {
        TransactionError::Connection(db_err) => E::from(db_err),
        TransactionError::Transaction(err) => err,
    })
}
