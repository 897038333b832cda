//! Bootloader engine: frame in, dispatch, frame out
//!
//! One call to [`Bootloader::handle_service`] consumes exactly one request
//! frame and, unless the frame itself was unreadable, writes exactly one
//! response frame.

use std::io::{Read, Write};

use tracing::{debug, info, warn};

use crate::config::BootloaderConfig;
use crate::error::BootloaderError;
use crate::flash::FlashDriver;
use crate::frame::{FrameCodec, FrameError};
use crate::nrc::NegativeResponseCode;
use crate::response::Response;
use crate::service::ServiceId;
use crate::services::{
    read_data_by_identifier, request_download, request_transfer_exit, session_control,
    transfer_data, ServiceResult,
};
use crate::state::{DownloadState, SessionState};

/// Payload capacity for response frames
pub const RESPONSE_CAPACITY: usize = 64;

/// Bootloader protocol engine over an input channel `R`, an output channel
/// `W` and a flash driver `F`.
///
/// All protocol state lives in the instance; independent instances share
/// nothing.
pub struct Bootloader<R, W, F> {
    input: R,
    output: W,
    flash: F,
    request_codec: FrameCodec,
    response_codec: FrameCodec,
    config: BootloaderConfig,
    session: SessionState,
    download: DownloadState,
}

impl<R, W, F> Bootloader<R, W, F>
where
    R: Read,
    W: Write,
    F: FlashDriver,
{
    /// Create an engine in the default session with no download active.
    ///
    /// Request frames are bounded by `config.transfer.max_block_length`,
    /// response frames by [`RESPONSE_CAPACITY`].
    pub fn new(input: R, output: W, flash: F, config: BootloaderConfig) -> Self {
        let request_codec = FrameCodec::new(config.transfer.max_block_length as usize);
        Self {
            input,
            output,
            flash,
            request_codec,
            response_codec: FrameCodec::new(RESPONSE_CAPACITY),
            config,
            session: SessionState::default(),
            download: DownloadState::default(),
        }
    }

    /// Read one request, process it and write its response.
    ///
    /// Returns the service on a positive response. Any negative response is
    /// reported as [`BootloaderError::Rejected`] after it has been written.
    /// Framing failures return [`BootloaderError::Frame`] with nothing written.
    pub fn handle_service(&mut self) -> Result<ServiceId, BootloaderError> {
        let request = self.request_codec.read_frame(&mut self.input)?;
        let service_id = request[0];

        let response = self.process_request(&request);
        self.response_codec.write_frame(&mut self.output, &response.to_bytes())?;

        match response {
            Response::Positive { service, .. } => Ok(service),
            Response::Negative(nrc) => Err(BootloaderError::Rejected { service_id, nrc }),
        }
    }

    /// Process an unframed request payload and build its response.
    pub fn process_request(&mut self, request: &[u8]) -> Response {
        debug!(request = %hex::encode(request), "Received request");

        let Some(&service_byte) = request.first() else {
            return Response::Negative(NegativeResponseCode::IncorrectMessageLengthOrFormat);
        };

        let Some(service) = ServiceId::from_byte(service_byte) else {
            debug!(
                service_id = format!("0x{:02X}", service_byte),
                "Unsupported service"
            );
            return Response::Negative(NegativeResponseCode::ServiceNotSupported);
        };

        match self.dispatch(service, request) {
            Ok(data) => {
                debug!(%service, response = %hex::encode(&data), "Positive response");
                Response::Positive { service, data }
            }
            Err(nrc) => {
                debug!(
                    %service,
                    nrc = format!("0x{:02X}", nrc),
                    reason = %nrc,
                    "Negative response"
                );
                Response::Negative(nrc)
            }
        }
    }

    fn dispatch(&mut self, service: ServiceId, request: &[u8]) -> ServiceResult {
        match service {
            ServiceId::DiagnosticSessionControl => {
                session_control::handle(request, &mut self.session)
            }
            ServiceId::ReadDataByIdentifier => read_data_by_identifier::handle(request),
            ServiceId::RequestDownload => request_download::handle(
                request,
                &self.config.application,
                self.config.transfer.max_block_length,
                &mut self.download,
            ),
            ServiceId::TransferData => {
                transfer_data::handle(request, &mut self.download, &mut self.flash)
            }
            ServiceId::RequestTransferExit => {
                request_transfer_exit::handle(request, &mut self.download, &mut self.flash)
            }
        }
    }

    /// Serve requests until the input channel closes.
    ///
    /// Negative responses and recoverable framing errors (zero-length or
    /// oversized frames) are logged and serving continues. Returns `Ok` on a
    /// clean close between frames.
    pub fn serve(&mut self) -> Result<(), BootloaderError> {
        loop {
            match self.handle_service() {
                Ok(_) | Err(BootloaderError::Rejected { .. }) => {}
                Err(BootloaderError::Frame(FrameError::Closed)) => {
                    info!("Input channel closed");
                    return Ok(());
                }
                Err(BootloaderError::Frame(e)) if !e.is_fatal() => {
                    warn!(error = %e, "Dropped malformed frame");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Return to the default session and abandon any download.
    pub fn reset(&mut self) {
        if self.download.in_progress {
            info!(
                address = format!("0x{:08X}", self.download.write_address),
                bytes_remaining = self.download.bytes_remaining,
                "Reset: abandoning download"
            );
        }
        self.session = SessionState::Default;
        self.download.clear();
    }
}

impl<R, W, F> Bootloader<R, W, F> {
    /// Current diagnostic session
    pub fn session(&self) -> SessionState {
        self.session
    }

    /// Progress of the active download, if any
    pub fn download(&self) -> &DownloadState {
        &self.download
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &BootloaderConfig {
        &self.config
    }

    /// Flash driver, e.g. to inspect what was programmed
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Output channel with every response written so far
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Tear down the engine and hand back its channels and flash driver.
    ///
    /// Protocol state is dropped; a new engine starts fresh.
    pub fn into_parts(self) -> (R, W, F) {
        (self.input, self.output, self.flash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::MemoryFlash;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Cursor;

    type TestBootloader = Bootloader<Cursor<Vec<u8>>, Vec<u8>, MemoryFlash>;

    fn frames(payloads: &[&[u8]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for payload in payloads {
            bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            bytes.extend_from_slice(payload);
        }
        bytes
    }

    fn bootloader(input: Vec<u8>) -> TestBootloader {
        let config = BootloaderConfig::with_application(0x0000_0000, 0x2000_0000);
        let flash = MemoryFlash::new(config.application);
        Bootloader::new(Cursor::new(input), Vec::new(), flash, config)
    }

    #[test]
    fn test_zero_length_frame_writes_nothing() {
        let mut bl = bootloader(vec![0, 0, 0, 0]);
        let err = bl.handle_service().unwrap_err();
        assert!(matches!(err, BootloaderError::Frame(FrameError::ZeroLength)));
        assert!(bl.output().is_empty());
    }

    #[test]
    fn test_unknown_service() {
        let mut bl = bootloader(frames(&[&[0xFF]]));
        let err = bl.handle_service().unwrap_err();
        assert!(matches!(
            err,
            BootloaderError::Rejected {
                service_id: 0xFF,
                nrc: NegativeResponseCode::ServiceNotSupported
            }
        ));
        assert_eq!(bl.output(), &vec![0, 0, 0, 1, 0x11]);
    }

    #[test]
    fn test_positive_response_reports_service() {
        let mut bl = bootloader(frames(&[&[0x10, 0x02]]));
        assert_eq!(
            bl.handle_service().unwrap(),
            ServiceId::DiagnosticSessionControl
        );
        assert_eq!(bl.output(), &vec![0, 0, 0, 1, 0x50]);
        assert_eq!(bl.session(), SessionState::Programming);
    }

    #[rstest]
    #[case::session_length(&[0x10], 0x13)]
    #[case::session_type(&[0x10, 0x01], 0x31)]
    #[case::did_length(&[0x22, 0x00], 0x13)]
    #[case::did_unknown(&[0x22, 0x00, 0x00], 0x31)]
    #[case::download_length(&[0x34, 0x00], 0x13)]
    #[case::download_widths(&[0x34, 0x00, 0x04, 0x03], 0x31)]
    #[case::transfer_without_download(&[0x36], 0x22)]
    #[case::exit_length(&[0x37, 0x00], 0x13)]
    #[case::exit_without_download(&[0x37], 0x22)]
    fn test_rejections_leave_state_unchanged(#[case] request: &[u8], #[case] nrc: u8) {
        let mut bl = bootloader(Vec::new());
        for _ in 0..2 {
            let response = bl.process_request(request);
            assert_eq!(response.to_bytes(), vec![nrc]);
            assert_eq!(bl.session(), SessionState::Default);
            assert_eq!(bl.download(), &DownloadState::default());
        }
    }

    #[test]
    fn test_full_download_sequence() {
        let mut bl = bootloader(Vec::new());

        assert_eq!(bl.process_request(&[0x10, 0x02]).to_bytes(), vec![0x50]);
        assert_eq!(
            bl.process_request(&[0x34, 0x00, 0x04, 0x04, 0, 0, 0x01, 0x00, 0, 0, 0, 3])
                .to_bytes(),
            vec![0x74, 0x40, 0x00, 0x00, 0x10, 0x00]
        );
        assert_eq!(
            bl.process_request(&[0x36, 0x01, 0xAA, 0xBB]).to_bytes(),
            vec![0x76, 0x01]
        );
        assert_eq!(
            bl.process_request(&[0x36, 0x02, 0xCC]).to_bytes(),
            vec![0x76, 0x02]
        );
        assert!(bl.download().is_complete());
        assert_eq!(bl.process_request(&[0x37]).to_bytes(), vec![0x77]);
        assert!(!bl.download().in_progress);

        assert_eq!(bl.flash().read(0x100, 3), Some(vec![0xAA, 0xBB, 0xCC]));
        assert_eq!(bl.flash().finalized(), Some((0x100, 3)));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut bl = bootloader(Vec::new());
        bl.process_request(&[0x10, 0x02]);
        bl.process_request(&[0x34, 0x00, 0x04, 0x04, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(bl.download().in_progress);

        bl.reset();
        assert_eq!(bl.session(), SessionState::Default);
        assert!(!bl.download().in_progress);
        assert_eq!(bl.process_request(&[0x36, 0x00, 0x5A]).to_bytes(), vec![0x22]);
    }

    #[test]
    fn test_serve_continues_past_rejections_and_zero_frames() {
        let mut input = frames(&[&[0xFF]]);
        input.extend_from_slice(&[0, 0, 0, 0]);
        input.extend_from_slice(&frames(&[&[0x10, 0x02]]));

        let mut bl = bootloader(input);
        bl.serve().unwrap();
        assert_eq!(bl.output(), &vec![0, 0, 0, 1, 0x11, 0, 0, 0, 1, 0x50]);
    }

    #[test]
    fn test_serve_stops_on_truncated_frame() {
        let mut bl = bootloader(vec![0, 0, 0, 5, 0x34]);
        assert!(matches!(
            bl.serve(),
            Err(BootloaderError::Frame(FrameError::Truncated { .. }))
        ));
        assert!(bl.output().is_empty());
    }

    fn bootloader_with_block_length(input: Vec<u8>, max_block_length: u32) -> TestBootloader {
        let config = BootloaderConfig {
            transfer: crate::config::TransferConfig { max_block_length },
            ..BootloaderConfig::with_application(0, 0x100)
        };
        let flash = MemoryFlash::new(config.application);
        Bootloader::new(Cursor::new(input), Vec::new(), flash, config)
    }

    #[test]
    fn test_oversized_frame_is_skipped() {
        let mut input = frames(&[&[0x36; 13]]);
        input.extend_from_slice(&frames(&[&[0x37]]));
        let mut bl = bootloader_with_block_length(input, 12);

        assert!(matches!(
            bl.handle_service(),
            Err(BootloaderError::Frame(FrameError::TooLarge {
                declared: 13,
                capacity: 12
            }))
        ));
        assert!(bl.output().is_empty());

        assert!(bl.handle_service().is_err());
        assert_eq!(bl.output(), &vec![0, 0, 0, 1, 0x22]);
    }

    #[test]
    fn test_responses_exceed_small_block_length() {
        let input = frames(&[
            &[0x22, 0xF0, 0x01],
            &[0x22, 0xF0, 0x00],
            &[0x34, 0x00, 0x04, 0x04, 0, 0, 0, 0, 0, 0, 0, 1],
        ]);
        let mut bl = bootloader_with_block_length(input, 12);

        assert_eq!(bl.handle_service().unwrap(), ServiceId::ReadDataByIdentifier);
        assert_eq!(bl.handle_service().unwrap(), ServiceId::ReadDataByIdentifier);
        assert_eq!(bl.handle_service().unwrap(), ServiceId::RequestDownload);

        let (_, output, _) = bl.into_parts();
        let time_length = u32::from_be_bytes([output[0], output[1], output[2], output[3]]) as usize;
        assert!(time_length > 12);
        assert_eq!(&output[4..7], &[0x62, 0xF0, 0x01]);

        let rest = &output[4 + time_length..];
        assert_eq!(&rest[..7], &[0, 0, 0, 9, 0x62, 0xF0, 0x00]);
        assert_eq!(
            &rest[13..],
            &[0, 0, 0, 6, 0x74, 0x40, 0x00, 0x00, 0x00, 0x0C]
        );
    }
}
