//! In-memory query executor

use crate::provider::{DataStoreError, QueryExecutor, Row};
use octofhir_amc_types::FieldValue;
use parking_lot::RwLock;
use std::collections::HashMap;

type StatementKey = (String, Vec<FieldValue>);

/// Query executor answering from fixtures registered per statement
///
/// A fixture matches when both the SQL text and the bound parameters are
/// identical. Unknown queries return no rows unless the executor is strict.
/// Modifying statements are recorded and reported as affecting one row.
/// A batch is recorded only when none of its parameter sets is set to fail.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    results: RwLock<HashMap<StatementKey, Vec<Row>>>,
    failures: RwLock<HashMap<StatementKey, String>>,
    executed: RwLock<Vec<StatementKey>>,
    strict: bool,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that fails on queries without a registered fixture
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Register the rows returned for a query
    pub fn add_rows(&self, sql: impl Into<String>, params: Vec<FieldValue>, rows: Vec<Row>) {
        self.results.write().insert((sql.into(), params), rows);
    }

    /// Make a statement fail with the given message
    pub fn fail_on(&self, sql: impl Into<String>, params: Vec<FieldValue>, message: impl Into<String>) {
        self.failures.write().insert((sql.into(), params), message.into());
    }

    /// Modifying statements executed so far, in order
    pub fn executed(&self) -> Vec<(String, Vec<FieldValue>)> {
        self.executed.read().clone()
    }

    fn failure(&self, key: &StatementKey) -> Option<DataStoreError> {
        self.failures
            .read()
            .get(key)
            .map(|message| DataStoreError::QueryFailed(message.clone()))
    }
}

impl QueryExecutor for MemoryExecutor {
    fn query(&self, sql: &str, params: &[FieldValue]) -> Result<Vec<Row>, DataStoreError> {
        let key = (sql.to_string(), params.to_vec());
        if let Some(error) = self.failure(&key) {
            return Err(error);
        }

        match self.results.read().get(&key) {
            Some(rows) => Ok(rows.clone()),
            None if self.strict => Err(DataStoreError::Rejected(format!(
                "no fixture for query: {}",
                sql
            ))),
            None => Ok(Vec::new()),
        }
    }

    fn execute(&self, sql: &str, params: &[FieldValue]) -> Result<u64, DataStoreError> {
        let key = (sql.to_string(), params.to_vec());
        if let Some(error) = self.failure(&key) {
            return Err(error);
        }

        self.executed.write().push(key);
        Ok(1)
    }

    fn execute_batch(&self, sql: &str, batch: &[Vec<FieldValue>]) -> Result<u64, DataStoreError> {
        let keys: Vec<StatementKey> = batch
            .iter()
            .map(|params| (sql.to_string(), params.clone()))
            .collect();
        if let Some(error) = keys.iter().find_map(|key| self.failure(key)) {
            return Err(error);
        }

        let count = keys.len() as u64;
        self.executed.write().extend(keys);
        Ok(count)
    }
}
