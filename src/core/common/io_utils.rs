//! IO utility functions following DRY principle
//!
//! This module provides common IO operations and error handling utilities
//! to reduce code duplication across the codebase.

use crate::core::error::GraphError;
use std::io;

/// Extension trait for IO Result types to simplify error conversion
pub trait IoResultExt<T> {
    /// Convert IO errors to `GraphError::Io`
    fn graph_io(self) -> Result<T, GraphError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn graph_io(self) -> Result<T, GraphError> {
        self.map_err(GraphError::from)
    }
}

/// Helper trait for Write operations with `GraphError`
pub trait WriteExt: io::Write {
    /// Write all bytes and convert errors to `GraphError`
    fn write_all_graph(&mut self, buf: &[u8]) -> Result<(), GraphError> {
        self.write_all(buf).graph_io()
    }

    /// Flush and convert errors to `GraphError`
    fn flush_graph(&mut self) -> Result<(), GraphError> {
        self.flush().graph_io()
    }
}

/// Helper trait for Read operations with `GraphError`
pub trait ReadExt: io::Read {
    /// Read exact bytes and convert errors to `GraphError`
    fn read_exact_graph(&mut self, buf: &mut [u8]) -> Result<(), GraphError> {
        self.read_exact(buf).graph_io()
    }
}

// Implement for all types that implement the base traits
impl<W: io::Write + ?Sized> WriteExt for W {}
impl<R: io::Read + ?Sized> ReadExt for R {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_io_result_ext() {
        let result: io::Result<()> = Ok(());
        assert!(result.graph_io().is_ok());

        let error: io::Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "test"));
        assert!(matches!(error.graph_io(), Err(GraphError::Io(_))));
    }

    #[test]
    fn test_write_ext() {
        let mut buffer = Vec::new();
        assert!(buffer.write_all_graph(b"test").is_ok());
        assert!(buffer.flush_graph().is_ok());
        assert_eq!(buffer, b"test");
    }

    #[test]
    fn test_read_ext() {
        let mut cursor = Cursor::new(b"test");
        let mut buf = [0u8; 4];
        assert!(cursor.read_exact_graph(&mut buf).is_ok());
        assert_eq!(&buf, b"test");
    }
}
