use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CtError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Handle already freed: {0}")]
    HandleAlreadyFreed(String),

    #[error("Signature count mismatch: {0}")]
    SignatureCountMismatch(String),

    #[error("Public key not found in script: {0}")]
    PubkeyNotInScript(String),

    #[error("Unblind failed: {0}")]
    UnblindFailed(String),

    #[error("Blinding failed: {0}")]
    BlindingFailed(String),

    #[error("Insufficient blinding data: {0}")]
    InsufficientBlindingData(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Numeric status codes reported through a session's error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    Unknown = -1,
    IllegalArgument = 1,
    IllegalState = 2,
    OutOfRange = 3,
    DiskAccess = 6,
    SignVerification = 7,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl CtError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CtError::InvalidArgument(_)
            | CtError::InvalidDescriptor(_)
            | CtError::InvalidScript(_)
            | CtError::MalformedEncoding(_)
            | CtError::Json(_)
            | CtError::Hex(_) => ErrorCode::IllegalArgument,
            CtError::DuplicateEntry(_)
            | CtError::HandleAlreadyFreed(_)
            | CtError::InsufficientBlindingData(_)
            | CtError::IllegalState(_) => ErrorCode::IllegalState,
            CtError::SignatureCountMismatch(_)
            | CtError::PubkeyNotInScript(_)
            | CtError::UnblindFailed(_)
            | CtError::BlindingFailed(_) => ErrorCode::SignVerification,
            CtError::Io(_) => ErrorCode::DiskAccess,
        }
    }

    pub(crate) fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        CtError::InvalidArgument(msg.into())
    }

    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        CtError::MalformedEncoding(msg.into())
    }
}

impl From<secp256k1::Error> for CtError {
    fn from(e: secp256k1::Error) -> Self {
        CtError::InvalidArgument(format!("Invalid key material: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, CtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CtError::InvalidArgument("Illegal network type.".into()).code(),
            ErrorCode::IllegalArgument
        );
        assert_eq!(
            CtError::HandleAlreadyFreed("blind".into()).code(),
            ErrorCode::IllegalState
        );
        assert_eq!(
            CtError::UnblindFailed("bad key".into()).code(),
            ErrorCode::SignVerification
        );
        assert_eq!(ErrorCode::Success.as_i32(), 0);
    }

    #[test]
    fn test_invalid_argument_message_is_verbatim() {
        let err = CtError::invalid_argument("Illegal network type.");
        assert_eq!(err.to_string(), "Illegal network type.");
    }

    #[test]
    fn test_hex_error_conversion() {
        let err: CtError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, CtError::Hex(_)));
        assert_eq!(err.code(), ErrorCode::IllegalArgument);
    }
}
