//! Durable key-value store on a single redb file.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use redb::Database;
use redb::ReadableTable;
use redb::Table;
use redb::TableDefinition;
use snafu::ResultExt;
use tollgate_core::KeyValue;
use tollgate_core::KeyValueStore;
use tollgate_core::KeyValueStoreError;
use tollgate_core::ReadRequest;
use tollgate_core::ReadResult;
use tollgate_core::ScanRequest;
use tollgate_core::ScanResult;
use tollgate_core::WriteCommand;
use tollgate_core::WriteRequest;
use tollgate_core::WriteResult;
use tracing::debug;

use crate::error::AbortSnafu;
use crate::error::BeginReadSnafu;
use crate::error::BeginWriteSnafu;
use crate::error::CommitSnafu;
use crate::error::CreateDirectorySnafu;
use crate::error::GetSnafu;
use crate::error::InsertSnafu;
use crate::error::OpenDatabaseSnafu;
use crate::error::OpenTableSnafu;
use crate::error::RangeSnafu;
use crate::error::RedbStorageError;
use crate::error::RemoveSnafu;

/// All registry keys: key = storage key, value = JSON document.
const KV_TABLE: TableDefinition<&str, &str> = TableDefinition::new("tollgate_kv");

/// Key-value store persisted in redb.
#[derive(Clone, Debug)]
pub struct RedbKeyValueStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbKeyValueStore {
    /// Create or open a store at the given path.
    ///
    /// Creates parent directories, the database file, and the table if they
    /// don't exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, RedbStorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateDirectorySnafu { path: parent })?;
        }

        let db = if path.exists() {
            Database::open(&path).context(OpenDatabaseSnafu { path: &path })?
        } else {
            Database::create(&path).context(OpenDatabaseSnafu { path: &path })?
        };

        let write_txn = db.begin_write().context(BeginWriteSnafu)?;
        {
            write_txn.open_table(KV_TABLE).context(OpenTableSnafu)?;
        }
        write_txn.commit().context(CommitSnafu)?;

        debug!(path = %path.display(), "opened redb key-value store");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Get the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get(&self, key: &str) -> Result<Option<String>, RedbStorageError> {
        let read_txn = self.db.begin_read().context(BeginReadSnafu)?;
        let table = read_txn.open_table(KV_TABLE).context(OpenTableSnafu)?;
        Ok(table.get(key).context(GetSnafu)?.map(|v| v.value().to_string()))
    }

    fn scan_prefix(&self, prefix: &str, limit: usize) -> Result<(Vec<KeyValue>, bool), RedbStorageError> {
        let read_txn = self.db.begin_read().context(BeginReadSnafu)?;
        let table = read_txn.open_table(KV_TABLE).context(OpenTableSnafu)?;

        let mut entries = Vec::with_capacity(limit.min(128));
        let mut is_truncated = false;
        for item in table.range::<&str>(prefix..).context(RangeSnafu)? {
            let (key, value) = item.context(GetSnafu)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            if entries.len() == limit {
                is_truncated = true;
                break;
            }
            entries.push(KeyValue {
                key: key.to_string(),
                value: value.value().to_string(),
            });
        }
        Ok((entries, is_truncated))
    }

    /// Apply one command inside a write transaction, committing only if its
    /// condition held.
    fn apply(&self, command: &WriteCommand) -> Result<Result<(), KeyValueStoreError>, RedbStorageError> {
        let write_txn = self.db.begin_write().context(BeginWriteSnafu)?;
        let outcome = {
            let mut table = write_txn.open_table(KV_TABLE).context(OpenTableSnafu)?;
            apply_command(&mut table, command)?
        };

        match outcome {
            Ok(()) => write_txn.commit().context(CommitSnafu)?,
            // Condition failed: nothing was changed, drop the transaction.
            Err(_) => write_txn.abort().context(AbortSnafu)?,
        }
        Ok(outcome)
    }
}

fn apply_command(
    table: &mut Table<'_, &'static str, &'static str>,
    command: &WriteCommand,
) -> Result<Result<(), KeyValueStoreError>, RedbStorageError> {
    match command {
        WriteCommand::CompareAndSwap {
            key,
            expected,
            new_value,
        } => {
            let current = table.get(key.as_str()).context(GetSnafu)?.map(|v| v.value().to_string());
            if current != *expected {
                return Ok(Err(KeyValueStoreError::CompareAndSwapFailed {
                    key: key.clone(),
                    expected: expected.clone(),
                    actual: current,
                }));
            }
            table.insert(key.as_str(), new_value.as_str()).context(InsertSnafu)?;
        }
        WriteCommand::CompareAndDelete { key, expected } => {
            let current = table.get(key.as_str()).context(GetSnafu)?.map(|v| v.value().to_string());
            if current.as_ref() != Some(expected) {
                return Ok(Err(KeyValueStoreError::CompareAndSwapFailed {
                    key: key.clone(),
                    expected: Some(expected.clone()),
                    actual: current,
                }));
            }
            table.remove(key.as_str()).context(RemoveSnafu)?;
        }
    }
    Ok(Ok(()))
}

#[async_trait]
impl KeyValueStore for RedbKeyValueStore {
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        let value = self.get(&request.key)?;
        Ok(ReadResult {
            kv: value.map(|value| KeyValue {
                key: request.key,
                value,
            }),
        })
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        self.apply(&request.command)??;
        Ok(WriteResult {
            command: request.command,
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        let (entries, is_truncated) = self.scan_prefix(&request.prefix, request.bounded_limit() as usize)?;
        Ok(ScanResult { entries, is_truncated })
    }
}
