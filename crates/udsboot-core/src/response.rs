//! Response payload construction

use crate::nrc::NegativeResponseCode;
use crate::service::ServiceId;

/// A response ready to be framed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `[sid | 0x40, data...]`
    Positive { service: ServiceId, data: Vec<u8> },
    /// `[nrc]`, nothing else
    Negative(NegativeResponseCode),
}

impl Response {
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive { .. })
    }

    /// Encode the response payload (without the length prefix)
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Positive { service, data } => positive_response(*service, data),
            Self::Negative(nrc) => negative_response(*nrc),
        }
    }
}

/// Create a positive response for a service
pub fn positive_response(service: ServiceId, data: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(1 + data.len());
    response.push(service.positive_response_id());
    response.extend_from_slice(data);
    response
}

/// Create a negative response
pub fn negative_response(nrc: NegativeResponseCode) -> Vec<u8> {
    vec![nrc.into()]
}
