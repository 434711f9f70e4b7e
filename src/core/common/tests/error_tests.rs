use crate::core::error::GraphError;
use std::error::Error;
use std::io;

#[test]
fn test_error_display_and_source() {
    let io_err: GraphError = io::Error::new(io::ErrorKind::NotFound, "file not found").into();
    assert_eq!(format!("{io_err}"), "I/O error: file not found");
    assert!(io_err.source().is_none());

    let unknown_field = GraphError::UnknownField("friend".to_string());
    assert_eq!(format!("{unknown_field}"), "unknown field: friend");
    assert!(unknown_field.source().is_none());

    let stale = GraphError::StaleTransaction;
    assert_eq!(format!("{stale}"), "transaction already committed or rolled back");
}

#[test]
fn test_from_std_io_error() {
    let std_io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
    let err: GraphError = std_io_err.into();
    match err {
        GraphError::Io(msg) => assert!(msg.contains("access denied")),
        _ => panic!("expected GraphError::Io variant"),
    }
}

#[test]
fn test_from_serde_json_error() {
    let json_err_str = "[1, 2";
    let serde_err = serde_json::from_str::<serde_json::Value>(json_err_str).unwrap_err();
    let err: GraphError = serde_err.into();
    match err {
        GraphError::Encoding(msg) => {
            assert!(msg.contains("EOF") || msg.contains("expected"));
        }
        _ => panic!("expected GraphError::Encoding variant"),
    }
}

#[test]
fn test_other_error_variants() {
    let _ = GraphError::InvalidSchema("bad field".to_string());
    let _ = GraphError::SchemaMismatch("storage id collision".to_string());
    let _ = GraphError::TypeNotInSchema("Person".to_string());
    let _ = GraphError::DeletedObject("abcd1234".to_string());
    let _ = GraphError::ReferencedObject { referrer: "p2".to_string(), field: "friend".to_string() };
    let _ = GraphError::RollbackOnlyTransaction;
    let _ = GraphError::InvalidReference("target type not allowed".to_string());
    let _ = GraphError::IllegalArgument("null id".to_string());
}
