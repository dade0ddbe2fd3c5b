//! Data store boundary
//!
//! The store is reached only through parameterized statements. Transactions,
//! pooling and read consistency belong to the implementation behind the
//! trait.

use indexmap::IndexMap;
use octofhir_amc_diagnostics::AmcError;
use octofhir_amc_types::FieldValue;
use std::sync::Arc;

/// One result row, columns in select order
pub type Row = IndexMap<String, FieldValue>;

/// Executes parameterized statements against the data store
///
/// Placeholders are positional (`?`) and bound from `params` in order.
#[cfg_attr(test, mockall::automock)]
pub trait QueryExecutor: Send + Sync {
    /// Run a query and return all rows in the store's natural order
    fn query(&self, sql: &str, params: &[FieldValue]) -> Result<Vec<Row>, DataStoreError>;

    /// Run a statement that modifies data and return the affected row count
    fn execute(&self, sql: &str, params: &[FieldValue]) -> Result<u64, DataStoreError>;

    /// Run one statement for each parameter set as a single unit
    ///
    /// Either every set is applied or none is. Returns the total affected
    /// row count.
    fn execute_batch(&self, sql: &str, batch: &[Vec<FieldValue>]) -> Result<u64, DataStoreError>;
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for Arc<E> {
    fn query(&self, sql: &str, params: &[FieldValue]) -> Result<Vec<Row>, DataStoreError> {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[FieldValue]) -> Result<u64, DataStoreError> {
        (**self).execute(sql, params)
    }

    fn execute_batch(&self, sql: &str, batch: &[Vec<FieldValue>]) -> Result<u64, DataStoreError> {
        (**self).execute_batch(sql, batch)
    }
}

/// Data store error
#[derive(Debug, Clone, thiserror::Error)]
pub enum DataStoreError {
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Statement rejected: {0}")]
    Rejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DataStoreError> for AmcError {
    fn from(error: DataStoreError) -> Self {
        AmcError::query_failed(error.to_string())
    }
}
