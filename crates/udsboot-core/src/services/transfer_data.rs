//! TransferData (0x36)

use tracing::{debug, error, info};

use super::ServiceResult;
use crate::flash::FlashDriver;
use crate::nrc::NegativeResponseCode;
use crate::state::DownloadState;

const HEADER_LENGTH: usize = 2;

/// `[0x36, blockIndex, data...]` → `[0x76, blockIndex]`
pub(crate) fn handle<F: FlashDriver + ?Sized>(
    request: &[u8],
    download: &mut DownloadState,
    flash: &mut F,
) -> ServiceResult {
    if !download.in_progress {
        debug!("TransferData denied: no active download");
        return Err(NegativeResponseCode::ConditionsNotCorrect);
    }

    if request.len() < HEADER_LENGTH {
        return Err(NegativeResponseCode::IncorrectMessageLengthOrFormat);
    }

    let block_index = request[1];
    let data = &request[HEADER_LENGTH..];

    let len = match u32::try_from(data.len()) {
        Ok(len) if len <= download.bytes_remaining => len,
        _ => {
            debug!(
                block = block_index,
                data_len = data.len(),
                bytes_remaining = download.bytes_remaining,
                "TransferData: data exceeds declared download size"
            );
            return Err(NegativeResponseCode::RequestOutOfRange);
        }
    };

    if !data.is_empty() {
        if let Err(e) = flash.write(download.write_address, data) {
            error!(
                address = format!("0x{:08X}", download.write_address),
                len,
                error = %e,
                "TransferData: flash write failed"
            );
            return Err(NegativeResponseCode::GeneralProgrammingFailure);
        }
    }

    download.advance(block_index, len);

    info!(
        block = block_index,
        bytes = len,
        next_address = format!("0x{:08X}", download.write_address),
        bytes_remaining = download.bytes_remaining,
        "TransferData: block written"
    );

    Ok(vec![block_index])
}
