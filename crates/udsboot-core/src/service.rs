//! Service identifiers and protocol constants

use std::fmt;

/// Bit set on a service identifier to form its positive response identifier
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

/// Services understood by the bootloader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServiceId {
    DiagnosticSessionControl = 0x10,
    ReadDataByIdentifier = 0x22,
    RequestDownload = 0x34,
    TransferData = 0x36,
    RequestTransferExit = 0x37,
}

impl ServiceId {
    /// Look up a service by its request byte. Unknown bytes yield `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x10 => Some(Self::DiagnosticSessionControl),
            0x22 => Some(Self::ReadDataByIdentifier),
            0x34 => Some(Self::RequestDownload),
            0x36 => Some(Self::TransferData),
            0x37 => Some(Self::RequestTransferExit),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Identifier carried by a positive response to this service
    pub fn positive_response_id(self) -> u8 {
        self.as_byte() | POSITIVE_RESPONSE_OFFSET
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiagnosticSessionControl => write!(f, "DiagnosticSessionControl"),
            Self::ReadDataByIdentifier => write!(f, "ReadDataByIdentifier"),
            Self::RequestDownload => write!(f, "RequestDownload"),
            Self::TransferData => write!(f, "TransferData"),
            Self::RequestTransferExit => write!(f, "RequestTransferExit"),
        }
    }
}

/// DiagnosticSessionControl (0x10) session types
pub mod session_type {
    /// Programming session, the only one the bootloader accepts
    pub const PROGRAMMING: u8 = 0x02;
}

/// Data identifiers served by ReadDataByIdentifier (0x22)
pub mod did {
    /// NUL-terminated bootloader version string
    pub const BOOTLOADER_VERSION: u16 = 0xF000;
    /// Current system time as text
    pub const SYSTEM_TIME: u16 = 0xF001;

    /// Width of the BOOTLOADER_VERSION record, terminator included
    pub const VERSION_RECORD_LENGTH: usize = 6;
}

/// RequestDownload (0x34) format constants
pub mod download_format {
    /// Only 32-bit addresses are accepted
    pub const ADDRESS_LENGTH: u8 = 4;
    /// Only 32-bit sizes are accepted
    pub const SIZE_LENGTH: u8 = 4;
    /// Bytes preceding the address field: sid, dataFormatId, addrLen, sizeLen
    pub const HEADER_LENGTH: usize = 4;
    /// lengthFormatIdentifier: maxNumberOfBlockLength is 4 bytes wide
    pub const LENGTH_FORMAT_IDENTIFIER: u8 = 0x40;
}
