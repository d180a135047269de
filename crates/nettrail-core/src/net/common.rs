use crate::error::{Error, ErrorKind};

/// Utility methods to map errors.
pub struct ErrorMapper;

impl ErrorMapper {
    /// Convert a given [`ErrorKind`] to [`Error::SendFailed`].
    #[expect(clippy::needless_pass_by_value)]
    pub fn send_failed(err: Error, kind: ErrorKind) -> Error {
        match err {
            Error::IoError(io_err) if io_err.kind() == kind => Error::SendFailed(io_err),
            _ => err,
        }
    }

    /// Convert [`std::io::ErrorKind::PermissionDenied`] to [`Error::PermissionDenied`].
    #[must_use]
    pub fn permission_denied(err: Error) -> Error {
        match err {
            Error::IoError(io_err)
                if io_err.kind() == ErrorKind::Std(std::io::ErrorKind::PermissionDenied) =>
            {
                Error::PermissionDenied
            }
            err => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IoError, IoOperation};
    use std::io;

    #[test]
    fn test_send_failed() {
        let io_err = io::Error::from(ErrorKind::HostUnreachable);
        let err = Error::IoError(IoError::Other(io_err, IoOperation::NewSocket));
        let send_err = ErrorMapper::send_failed(err, ErrorKind::HostUnreachable);
        assert!(matches!(send_err, Error::SendFailed(_)));
    }

    #[test]
    fn test_not_send_failed() {
        let io_err = io::Error::from(ErrorKind::Std(io::ErrorKind::Other));
        let err = Error::IoError(IoError::Other(io_err, IoOperation::NewSocket));
        let send_err = ErrorMapper::send_failed(err, ErrorKind::HostUnreachable);
        assert!(matches!(send_err, Error::IoError(_)));
    }

    #[test]
    fn test_permission_denied() {
        let io_err = io::Error::from(io::ErrorKind::PermissionDenied);
        let err = Error::IoError(IoError::Other(io_err, IoOperation::NewSocket));
        let perm_err = ErrorMapper::permission_denied(err);
        assert!(matches!(perm_err, Error::PermissionDenied));
    }

    #[test]
    fn test_not_permission_denied() {
        let io_err = io::Error::from(io::ErrorKind::Other);
        let err = Error::IoError(IoError::Other(io_err, IoOperation::NewSocket));
        let perm_err = ErrorMapper::permission_denied(err);
        assert!(matches!(perm_err, Error::IoError(_)));
    }
}
