//! Error types for keyconnect-device

use serde::Serialize;
use thiserror::Error;

use crate::interaction::ChallengeKind;
use crate::messages::failure_codes;
use crate::version::FirmwareVersion;

/// Closed classification of every failure a request can end with.
///
/// Classification looks only at the error variant and, for failures reported
/// by the device, at the failure code string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr)]
pub enum ErrorKind {
    TransportMissing,
    NoConnectedDevice,
    BootloaderMode,
    Uninitialized,
    FirmwareTooOld,
    PinInvalid,
    ParamValidation,
    BackendFailure,
    Unclassified,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("No transport is available")]
    TransportMissing,

    #[error("No connected devices")]
    NoConnectedDevice,

    #[error("Connected device is in bootloader mode")]
    BootloaderMode,

    #[error("Connected device is not initialized")]
    Uninitialized,

    #[error("Firmware of connected device is too old (required {required}, found {found})")]
    FirmwareTooOld {
        required: FirmwareVersion,
        found: FirmwareVersion,
    },

    /// `Failure` message sent by the device
    #[error("{message}")]
    Failure { code: String, message: String },

    #[error("Device does not support given coin type: {0}")]
    UnsupportedCoin(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Another challenge is already pending")]
    ChallengeBusy,

    #[error("No {0} challenge is pending")]
    NoChallenge(ChallengeKind),

    #[error("Unexpected message from device: expected {expected}, got {got}")]
    UnexpectedMessage { expected: String, got: String },

    #[error("Invalid response from device: {0}")]
    InvalidResponse(String),

    #[cfg(feature = "bridge")]
    #[error("Bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors the retry policy can act on
pub trait Classify: std::fmt::Display {
    fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
    fn kind(&self) -> ErrorKind {
        Error::kind(self)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TransportMissing => ErrorKind::TransportMissing,
            Error::NoConnectedDevice => ErrorKind::NoConnectedDevice,
            Error::BootloaderMode => ErrorKind::BootloaderMode,
            Error::Uninitialized => ErrorKind::Uninitialized,
            Error::FirmwareTooOld { .. } => ErrorKind::FirmwareTooOld,
            Error::Failure { code, .. } if code == failure_codes::PIN_INVALID => {
                ErrorKind::PinInvalid
            }
            _ => ErrorKind::Unclassified,
        }
    }

    /// Build an error from a device `Failure` message
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Failure {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_by_tag() {
        assert_eq!(Error::TransportMissing.kind(), ErrorKind::TransportMissing);
        assert_eq!(Error::NoConnectedDevice.kind(), ErrorKind::NoConnectedDevice);
        assert_eq!(Error::BootloaderMode.kind(), ErrorKind::BootloaderMode);
        assert_eq!(Error::Uninitialized.kind(), ErrorKind::Uninitialized);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Unclassified);
    }

    #[test]
    fn test_failure_classified_by_code_string() {
        let pin = Error::failure("Failure_PinInvalid", "PIN invalid");
        assert_eq!(pin.kind(), ErrorKind::PinInvalid);
        assert_eq!(pin.to_string(), "PIN invalid");

        let other = Error::failure("Failure_ActionCancelled", "Action cancelled by user");
        assert_eq!(other.kind(), ErrorKind::Unclassified);
        assert_eq!(other.to_string(), "Action cancelled by user");
    }

    #[test]
    fn test_kind_serializes_as_tag() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&ErrorKind::FirmwareTooOld)?,
            "\"FirmwareTooOld\""
        );
        assert_eq!(ErrorKind::PinInvalid.to_string(), "PinInvalid");
        Ok(())
    }
}
