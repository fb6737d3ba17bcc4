//! Error types for the cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// Rejected at construction (zero capacity, zero TTL)
    InvalidConfig(String),
    Io(Box<std::io::Error>),
    Serialization(serde_json::Error),
    /// Snapshot written by an incompatible format version
    VersionMismatch { found: u32, expected: u32 },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidConfig(msg) => write!(f, "Invalid cache configuration: {}", msg),
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Serialization(err) => write!(f, "Snapshot serialization error: {}", err),
            CacheError::VersionMismatch { found, expected } => write!(
                f,
                "Snapshot format version {} does not match expected {}",
                found, expected
            ),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = CacheError::InvalidConfig("capacity must be positive".to_string());
        assert_eq!(
            format!("{}", err),
            "Invalid cache configuration: capacity must be positive"
        );
    }

    #[test]
    fn test_version_mismatch_display() {
        let err = CacheError::VersionMismatch {
            found: 7,
            expected: 1,
        };
        assert_eq!(
            format!("{}", err),
            "Snapshot format version 7 does not match expected 1"
        );
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;
        let err = CacheError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(err.source().is_some());
        assert!(format!("{}", err).contains("missing"));
    }
}
