use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::CaseRecord;

/// Read-only access to materialized recovery cases.
///
/// The attribution engine never writes through this trait: cases and their
/// ledgers are produced upstream and only read here.
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait CaseStore: Send + Sync + 'static {
    /// Fetch one case with its full ledger.
    ///
    /// Returns `Err(StorageError::CaseNotFound)` if no such case exists.
    async fn get_case(&self, case_id: &str) -> Result<CaseRecord, StorageError>;

    /// List every known case identifier in ascending order.
    async fn list_case_ids(&self) -> Result<Vec<String>, StorageError>;
}
