//! Table store backends.

pub mod memory;
pub mod sqlite;

use crate::error::{StorageError, StorageResult};
use crate::traits::ScanRequest;

pub(crate) fn check_batch(operation: &str, len: usize, max: usize) -> StorageResult<()> {
    if len > max {
        return Err(StorageError::InvalidRequest(format!(
            "{operation} of {len} entries exceeds the limit of {max}"
        )));
    }
    Ok(())
}

pub(crate) fn check_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidItem {
            key: String::new(),
            reason: "key must not be empty".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn check_scan(request: &ScanRequest) -> StorageResult<()> {
    if request.limit == 0 {
        return Err(StorageError::InvalidRequest(
            "scan limit must be at least 1".to_string(),
        ));
    }
    Ok(())
}
