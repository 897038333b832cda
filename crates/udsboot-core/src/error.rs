//! Engine errors

use thiserror::Error;

use crate::frame::FrameError;
use crate::nrc::NegativeResponseCode;

/// Why a call to [`Bootloader::handle_service`](crate::Bootloader::handle_service)
/// did not end in a positive response
#[derive(Debug, Error)]
pub enum BootloaderError {
    /// The request could not be framed; no response was written
    #[error("Framing error: {0}")]
    Frame(#[from] FrameError),

    /// The request was answered with a negative response
    #[error("Service 0x{service_id:02X} rejected: {nrc} (0x{nrc:02X})")]
    Rejected {
        service_id: u8,
        nrc: NegativeResponseCode,
    },
}

impl BootloaderError {
    /// The NRC sent back to the tester, if a response was written
    pub fn nrc(&self) -> Option<NegativeResponseCode> {
        match self {
            Self::Rejected { nrc, .. } => Some(*nrc),
            Self::Frame(_) => None,
        }
    }
}
