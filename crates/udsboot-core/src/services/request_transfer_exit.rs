//! RequestTransferExit (0x37)

use tracing::{debug, error, info, warn};

use super::ServiceResult;
use crate::flash::FlashDriver;
use crate::nrc::NegativeResponseCode;
use crate::state::DownloadState;

const REQUEST_LENGTH: usize = 1;

/// `[0x37]` → `[0x77]`
pub(crate) fn handle<F: FlashDriver + ?Sized>(
    request: &[u8],
    download: &mut DownloadState,
    flash: &mut F,
) -> ServiceResult {
    if request.len() != REQUEST_LENGTH {
        return Err(NegativeResponseCode::IncorrectMessageLengthOrFormat);
    }

    if !download.in_progress {
        debug!("RequestTransferExit denied: no active download");
        return Err(NegativeResponseCode::ConditionsNotCorrect);
    }

    let start_address = download.start_address;
    let written = download.bytes_written();
    if !download.is_complete() {
        warn!(
            written,
            declared = download.total_size,
            "RequestTransferExit: download ended before all declared bytes arrived"
        );
    }

    if let Err(e) = flash.finalize(start_address, written) {
        error!(
            address = format!("0x{:08X}", start_address),
            written,
            error = %e,
            "RequestTransferExit: finalizing image failed"
        );
        return Err(NegativeResponseCode::GeneralProgrammingFailure);
    }

    info!(
        address = format!("0x{:08X}", start_address),
        written, "RequestTransferExit: download finished"
    );
    download.clear();

    Ok(Vec::new())
}
