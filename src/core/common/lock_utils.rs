//! Lock error handling utilities following DRY principle
//!
//! This module provides common lock error conversions to reduce code duplication.

use crate::core::error::GraphError;
use std::sync::{MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};

/// Convert a poisoned mutex error to `GraphError` with a generic message
pub fn lock_poisoned<T>(_: PoisonError<MutexGuard<T>>) -> GraphError {
    GraphError::LockPoisoned("lock poisoned".to_string())
}

/// Convert a poisoned mutex error to `GraphError` for store locks
pub fn store_lock_poisoned<T>(_: PoisonError<MutexGuard<T>>) -> GraphError {
    GraphError::LockPoisoned("failed to lock store".to_string())
}

/// Convert a poisoned read lock error to `GraphError`
pub fn read_lock_poisoned<T>(_: PoisonError<RwLockReadGuard<T>>) -> GraphError {
    GraphError::LockPoisoned("failed to acquire read lock".to_string())
}

/// Convert a poisoned write lock error to `GraphError`
pub fn write_lock_poisoned<T>(_: PoisonError<RwLockWriteGuard<T>>) -> GraphError {
    GraphError::LockPoisoned("failed to acquire write lock".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_lock_error_messages() {
        let mutex = Arc::new(Mutex::new(42));
        let poisoned = Arc::clone(&mutex);
        let _ = panic::catch_unwind(move || {
            let _guard = poisoned.lock().unwrap();
            panic!("poison the mutex");
        });

        let err = mutex.lock().unwrap_err();
        assert_eq!(lock_poisoned(err).to_string(), "lock poisoned: lock poisoned");
    }
}
