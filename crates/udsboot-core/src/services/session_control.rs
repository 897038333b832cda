//! DiagnosticSessionControl (0x10)

use tracing::{debug, info};

use super::ServiceResult;
use crate::nrc::NegativeResponseCode;
use crate::service::session_type;
use crate::state::SessionState;

const REQUEST_LENGTH: usize = 2;

/// `[0x10, sessionType]` → `[0x50]`
pub(crate) fn handle(request: &[u8], session: &mut SessionState) -> ServiceResult {
    if request.len() != REQUEST_LENGTH {
        return Err(NegativeResponseCode::IncorrectMessageLengthOrFormat);
    }

    let requested = request[1];
    if requested != session_type::PROGRAMMING {
        debug!(
            session = format!("0x{:02X}", requested),
            "Unsupported session type"
        );
        return Err(NegativeResponseCode::RequestOutOfRange);
    }

    if *session != SessionState::Programming {
        info!("Entering programming session");
    }
    *session = SessionState::Programming;

    Ok(Vec::new())
}
