//! UDS Negative Response Codes (NRC)

use std::fmt;

/// Negative response codes emitted by the bootloader.
///
/// A negative response on the wire is the bare code byte; there is no
/// `0x7F` marker and no echoed service identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NegativeResponseCode {
    ServiceNotSupported = 0x11,
    IncorrectMessageLengthOrFormat = 0x13,
    ConditionsNotCorrect = 0x22,
    RequestOutOfRange = 0x31,
    GeneralProgrammingFailure = 0x72,

    /// Unknown/reserved NRC
    Unknown(u8),
}

impl From<u8> for NegativeResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0x11 => Self::ServiceNotSupported,
            0x13 => Self::IncorrectMessageLengthOrFormat,
            0x22 => Self::ConditionsNotCorrect,
            0x31 => Self::RequestOutOfRange,
            0x72 => Self::GeneralProgrammingFailure,
            other => Self::Unknown(other),
        }
    }
}

impl From<NegativeResponseCode> for u8 {
    fn from(nrc: NegativeResponseCode) -> Self {
        match nrc {
            NegativeResponseCode::ServiceNotSupported => 0x11,
            NegativeResponseCode::IncorrectMessageLengthOrFormat => 0x13,
            NegativeResponseCode::ConditionsNotCorrect => 0x22,
            NegativeResponseCode::RequestOutOfRange => 0x31,
            NegativeResponseCode::GeneralProgrammingFailure => 0x72,
            NegativeResponseCode::Unknown(v) => v,
        }
    }
}

impl fmt::UpperHex for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: u8 = (*self).into();
        fmt::UpperHex::fmt(&value, f)
    }
}

impl fmt::Display for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceNotSupported => write!(f, "ServiceNotSupported"),
            Self::IncorrectMessageLengthOrFormat => write!(f, "IncorrectMessageLengthOrFormat"),
            Self::ConditionsNotCorrect => write!(f, "ConditionsNotCorrect"),
            Self::RequestOutOfRange => write!(f, "RequestOutOfRange"),
            Self::GeneralProgrammingFailure => write!(f, "GeneralProgrammingFailure"),
            Self::Unknown(v) => write!(f, "Unknown(0x{:02X})", v),
        }
    }
}
