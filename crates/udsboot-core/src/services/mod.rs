//! Service handlers
//!
//! Each handler receives the full request payload (service id included),
//! validates it completely, and only then mutates state. The `Ok` payload is
//! the positive response data that follows the response id.

pub(crate) mod read_data_by_identifier;
pub(crate) mod request_download;
pub(crate) mod request_transfer_exit;
pub(crate) mod session_control;
pub(crate) mod transfer_data;

use crate::nrc::NegativeResponseCode;

pub(crate) type ServiceResult = Result<Vec<u8>, NegativeResponseCode>;
