//! Tests for error types.

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("max_files must be greater than 0");
        assert_eq!(
            err.to_string(),
            "configuration error: max_files must be greater than 0"
        );
    }

    #[test]
    fn test_storage_error_not_found() {
        let err = StorageError::not_found("file", "src/main.rs");
        assert_eq!(err.to_string(), "not found: file with id 'src/main.rs'");
    }

    #[test]
    fn test_storage_error_conversion() {
        let storage_err = StorageError::Database("connection failed".to_string());
        let err: Error = storage_err.into();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_sink_error_conversion() {
        let sink_err = SinkError::SubmitFailed {
            documents: 10,
            reason: "connection reset".to_string(),
        };
        assert_eq!(
            sink_err.to_string(),
            "failed to submit 10 chunk documents: connection reset"
        );
        let err: Error = sink_err.into();
        assert!(matches!(err, Error::Sink(_)));
    }

    #[test]
    fn test_watcher_error_conversion() {
        let watch_err = WatcherError::WatchFailed {
            path: "/tmp/test".to_string(),
            reason: "permission denied".to_string(),
        };
        let err: Error = watch_err.into();
        assert!(matches!(err, Error::Watcher(_)));
    }

    #[test]
    fn test_invalid_state_message() {
        let err = WatcherError::invalid_state("pause", "stopped");
        assert_eq!(err.to_string(), "cannot pause watcher while stopped");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_file_error_serializes() {
        let err = FileError::new("src/lib.rs", "permission denied");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(
            json,
            r#"{"path":"src/lib.rs","message":"permission denied"}"#
        );
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(Error::config("test error"))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_debug_format() {
        let err = Error::Internal("something went wrong".to_string());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("Internal"));
        assert!(debug_str.contains("something went wrong"));
    }
}
