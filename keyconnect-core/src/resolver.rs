use futures::future::try_join_all;
use keyconnect_device::messages::TxInputType;
use tracing::debug;

use crate::backend::Backend;
use crate::error::Result;
use crate::tx::{RefTransaction, referenced_hashes};

/// Fetch every distinct transaction referenced by `inputs`.
///
/// All lookups are started before any is awaited; the first failure fails
/// the whole group.
pub async fn resolve_referenced(
    backend: &dyn Backend,
    inputs: &[TxInputType],
) -> Result<Vec<RefTransaction>> {
    let hashes = referenced_hashes(inputs);
    debug!(
        "Resolving {} referenced transaction(s) for {} input(s)",
        hashes.len(),
        inputs.len()
    );

    let transactions = try_join_all(hashes.iter().map(|hash| backend.lookup_transaction(hash))).await?;
    Ok(transactions.into_iter().map(RefTransaction::from).collect())
}
