use crate::pl1000::PicoStatus;
use crate::session::SessionState;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PicoError {
    #[error("PicoLog is not opened")]
    DeviceNotOpen,
    #[error("device returned {status} (0x{code:02X})")]
    Device { code: u32, status: PicoStatus },
    #[error("value out of range: {0}")]
    ArgumentOutOfRange(String),
    #[error("{op} is not allowed in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: SessionState,
    },
    #[error("failed to load pl1000 library: {0}")]
    Library(#[from] libloading::Error),
}

impl From<PicoStatus> for PicoError {
    fn from(status: PicoStatus) -> Self {
        PicoError::Device {
            code: status.code(),
            status,
        }
    }
}

impl PicoError {
    /// Vendor status carried by a device error.
    pub fn status(&self) -> Option<PicoStatus> {
        match self {
            PicoError::Device { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Non-fatal conditions collected while a call still succeeds.
#[derive(Clone, Debug, PartialEq)]
pub enum Warning {
    /// Fewer samples per channel came back than were requested.
    PartialCapture { delivered: u32, requested: u32 },
    /// Requested timing was adjusted by the host policy or by the unit.
    TimingCorrected {
        field: &'static str,
        requested: u64,
        actual: u64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::PartialCapture {
                delivered,
                requested,
            } => write!(f, "data partial reading {} of {}", delivered, requested),
            Warning::TimingCorrected {
                field,
                requested,
                actual,
            } => write!(f, "{} corrected from {} to {}", field, requested, actual),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_carries_code_and_name() {
        let err = PicoError::from(PicoStatus::NotFound);
        assert_eq!(err.status(), Some(PicoStatus::NotFound));
        assert_eq!(err.to_string(), "device returned PICO_NOT_FOUND (0x03)");
        assert_eq!(PicoError::DeviceNotOpen.status(), None);
    }

    #[test]
    fn unlisted_vendor_code_is_kept() {
        let err = PicoError::from(PicoStatus::from(0x2E));
        assert!(matches!(err, PicoError::Device { code: 0x2E, .. }));
        assert_eq!(err.status(), Some(PicoStatus::Unknown(0x2E)));
        assert_eq!(
            err.to_string(),
            "device returned PICO_UNKNOWN_STATUS 0x2E (0x2E)"
        );
    }
}
