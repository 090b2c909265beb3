//! Call failure status reported by the RPC layer.

use strum::{AsRefStr, Display};

/// Canonical status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    Internal,
    Unavailable,
    Unimplemented,
}

/// Failure of a call, raised by the transport or by the remote side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status: {code}, message: \"{message}\"")]
pub struct Status {
    code: Code,
    message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    /// What a call reports once the caller's cancellation token fires.
    pub fn cancelled_by_client() -> Self {
        Self::cancelled("call cancelled by client")
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let status = Status::unavailable("connection refused");
        assert_eq!(status.to_string(), "status: Unavailable, message: \"connection refused\"");
        assert_eq!(status.code(), Code::Unavailable);
    }
}
