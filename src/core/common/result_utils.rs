//! Result and Error Utilities
//!
//! This module provides common utilities for handling Results and Errors
//! throughout the codebase, following DRY principles.

use crate::core::error::GraphError;
use std::fmt::Debug;

/// A trait for converting various error types into `GraphError`
pub trait IntoGraphError<T> {
    /// Convert the result into a `Result<T, GraphError>`
    fn into_graph_error(self) -> Result<T, GraphError>;
}

impl<T, E> IntoGraphError<T> for Result<T, E>
where
    E: Into<GraphError>,
{
    fn into_graph_error(self) -> Result<T, GraphError> {
        self.map_err(Into::into)
    }
}

/// Extension trait for Result to provide common operations
pub trait ResultExt<T, E> {
    /// Map error with context information
    fn with_context<F>(self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T, E> for Result<T, E>
where
    E: Debug,
{
    fn with_context<F>(self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| GraphError::Other(format!("{}: {:?}", f(), e)))
    }
}

/// Safe unwrapping utilities for testing
#[cfg(test)]
pub trait TestResultExt<T> {
    /// Unwrap for tests with better error messages
    fn unwrap_test(self) -> T;
}

#[cfg(test)]
impl<T> TestResultExt<T> for Result<T, GraphError> {
    fn unwrap_test(self) -> T {
        match self {
            Ok(val) => val,
            Err(e) => panic!("test failed with error: {e:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_into_graph_error() {
        let io_error: io::Result<i32> = Err(io::Error::new(io::ErrorKind::NotFound, "test"));
        let result = io_error.into_graph_error();
        assert!(result.is_err());
    }

    #[test]
    fn test_with_context() {
        let result: Result<i32, &str> = Err("test error");
        let contextual_result = result.with_context(|| "operation failed".to_string());
        assert!(contextual_result.is_err());
        if let Err(e) = contextual_result {
            assert!(format!("{e:?}").contains("operation failed"));
        }
    }
}
