use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Invalid stream format: {0}")]
    Format(String),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedDepth(String),

    #[error("Unsupported image mode: {0}")]
    UnsupportedMode(String),

    #[error("Size computation overflowed: {0}")]
    Overflow(String),

    #[error("Host tile protocol failed with status {0}")]
    HostProtocol(i32),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(u32, u32),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TranscodeError>;

/// Status reported back to the host once an operation has finished.
///
/// Only the outermost boundary produces one of these; everything below it
/// works with [`TranscodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    NoError,
    UserCanceled,
    OutOfMemory,
    BadFormat,
    HostError(i32),
    IoFailure,
}

impl HostStatus {
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::NoError,
            Err(err) => Self::from_error(err),
        }
    }

    pub fn from_error(err: &TranscodeError) -> Self {
        match err {
            TranscodeError::UserCancelled => Self::UserCanceled,
            TranscodeError::Overflow(_) => Self::OutOfMemory,
            TranscodeError::Format(_)
            | TranscodeError::UnsupportedDepth(_)
            | TranscodeError::UnsupportedMode(_)
            | TranscodeError::InvalidDimensions(_, _) => Self::BadFormat,
            TranscodeError::HostProtocol(code) => Self::HostError(*code),
            TranscodeError::IoError(_) => Self::IoFailure,
        }
    }

    /// Cancellation is a clean abort, not a fault.
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::NoError | Self::UserCanceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_not_fatal() {
        let result: Result<()> = Err(TranscodeError::UserCancelled);
        let status = HostStatus::from_result(&result);
        assert_eq!(status, HostStatus::UserCanceled);
        assert!(!status.is_fatal());
    }

    #[test]
    fn host_codes_pass_through_verbatim() {
        let status = HostStatus::from_error(&TranscodeError::HostProtocol(-108));
        assert_eq!(status, HostStatus::HostError(-108));
        assert!(status.is_fatal());
    }

    #[test]
    fn overflow_reports_out_of_memory() {
        let status = HostStatus::from_error(&TranscodeError::Overflow("tile".to_string()));
        assert_eq!(status, HostStatus::OutOfMemory);
    }
}
