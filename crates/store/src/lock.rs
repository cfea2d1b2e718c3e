use crate::error::{Result, StoreError};
use crate::paths::CaseLayout;
use fs2::FileExt;
use std::fs::OpenOptions;

/// Case-scoped write lock.
///
/// Serializes write transactions per case across processes. Reads stay
/// lock-free: the store's transactional guarantees keep them consistent
/// with either the pre- or post-commit state of an in-flight run.
pub struct CaseWriteLock {
    file: std::fs::File,
}

impl Drop for CaseWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Block until the case write lock is held.
pub(crate) fn acquire_case_write_lock(layout: &CaseLayout) -> Result<CaseWriteLock> {
    let path = layout.lock_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|err| StoreError::Other(format!("open case lock {}: {err}", path.display())))?;

    file.lock_exclusive()
        .map_err(|err| StoreError::Other(format!("acquire case lock {}: {err}", path.display())))?;

    Ok(CaseWriteLock { file })
}
