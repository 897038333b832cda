//! ReadDataByIdentifier (0x22)

use chrono::Utc;
use tracing::debug;

use super::ServiceResult;
use crate::nrc::NegativeResponseCode;
use crate::service::did;

const REQUEST_LENGTH: usize = 3;

/// `[0x22, didHigh, didLow]` → `[0x62, didHigh, didLow, data...]`
pub(crate) fn handle(request: &[u8]) -> ServiceResult {
    if request.len() != REQUEST_LENGTH {
        return Err(NegativeResponseCode::IncorrectMessageLengthOrFormat);
    }

    let identifier = u16::from_be_bytes([request[1], request[2]]);
    let data = match identifier {
        did::BOOTLOADER_VERSION => version_record().to_vec(),
        did::SYSTEM_TIME => system_time().into_bytes(),
        _ => {
            debug!(did = format!("0x{:04X}", identifier), "Unknown data identifier");
            return Err(NegativeResponseCode::RequestOutOfRange);
        }
    };

    let mut response = Vec::with_capacity(2 + data.len());
    response.extend_from_slice(&identifier.to_be_bytes());
    response.extend_from_slice(&data);
    Ok(response)
}

/// Version string in a fixed-width, NUL-terminated record.
/// Longer versions are cut to fit.
fn version_record() -> [u8; did::VERSION_RECORD_LENGTH] {
    let mut record = [0u8; did::VERSION_RECORD_LENGTH];
    let version = crate::VERSION.as_bytes();
    let len = version.len().min(did::VERSION_RECORD_LENGTH - 1);
    record[..len].copy_from_slice(&version[..len]);
    record
}

fn system_time() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
