use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("unsupported_platform - no task source for operating system '{0}'")]
    UnsupportedPlatform(String),
    #[error("source_unavailable - {0}")]
    SourceUnavailable(String),
    #[error("collection_failed - {0}")]
    Collection(String),
    #[error("collection_timeout - collection did not finish within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
}

impl WatchError {
    pub fn unsupported_platform<M: Into<String>>(os: M) -> Self {
        Self::UnsupportedPlatform(os.into())
    }

    pub fn source_unavailable<M: Into<String>>(message: M) -> Self {
        Self::SourceUnavailable(message.into())
    }

    pub fn collection<M: Into<String>>(message: M) -> Self {
        Self::Collection(message.into())
    }

    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform(_) => "unsupported_platform",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::Collection(_) => "collection_failed",
            Self::Timeout(_) => "collection_timeout",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::UnsupportedPlatform(os) => {
                format!("no task source for operating system '{os}'")
            }
            Self::Timeout(limit) => {
                format!("collection did not finish within {}s", limit.as_secs())
            }
            Self::SourceUnavailable(message)
            | Self::Collection(message)
            | Self::InvalidInput(message)
            | Self::InvalidData(message)
            | Self::Io(message) => message.clone(),
        }
    }

    /// True for failures raised by a task source while enumerating tasks.
    /// These are retried on the next interval once the loop is running.
    pub fn is_collection_failure(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_) | Self::Collection(_) | Self::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::WatchError;
    use std::time::Duration;

    #[test]
    fn display_matches_code_and_message() {
        let err = WatchError::collection("crontab exited with status 2");
        assert_eq!(err.code(), "collection_failed");
        assert_eq!(
            err.to_string(),
            format!("{} - {}", err.code(), err.message())
        );

        let timeout = WatchError::Timeout(Duration::from_secs(30));
        assert_eq!(
            timeout.to_string(),
            "collection_timeout - collection did not finish within 30s"
        );
    }

    #[test]
    fn classifies_collection_failures() {
        assert!(WatchError::source_unavailable("crontab not found").is_collection_failure());
        assert!(WatchError::Timeout(Duration::from_secs(1)).is_collection_failure());
        assert!(!WatchError::unsupported_platform("plan9").is_collection_failure());
        assert!(!WatchError::io("disk full").is_collection_failure());
    }
}
