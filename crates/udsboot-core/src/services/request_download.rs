//! RequestDownload (0x34)

use tracing::{debug, info, warn};

use super::ServiceResult;
use crate::config::ApplicationRegion;
use crate::nrc::NegativeResponseCode;
use crate::service::download_format::{
    ADDRESS_LENGTH, HEADER_LENGTH, LENGTH_FORMAT_IDENTIFIER, SIZE_LENGTH,
};
use crate::state::DownloadState;

/// `[0x34, dataFormatId, addrLen, sizeLen, address, size]`
/// → `[0x74, 0x40, maxBlockLength (u32 BE)]`
pub(crate) fn handle(
    request: &[u8],
    region: &ApplicationRegion,
    max_block_length: u32,
    download: &mut DownloadState,
) -> ServiceResult {
    if request.len() < HEADER_LENGTH {
        return Err(NegativeResponseCode::IncorrectMessageLengthOrFormat);
    }

    let data_format = request[1];
    let address_length = request[2];
    let size_length = request[3];

    if address_length != ADDRESS_LENGTH || size_length != SIZE_LENGTH {
        debug!(
            address_length,
            size_length, "RequestDownload: unsupported address/size field widths"
        );
        return Err(NegativeResponseCode::RequestOutOfRange);
    }

    let expected_len = HEADER_LENGTH + usize::from(address_length) + usize::from(size_length);
    if request.len() != expected_len {
        return Err(NegativeResponseCode::IncorrectMessageLengthOrFormat);
    }

    let address = read_u32_be(&request[4..8]);
    let size = read_u32_be(&request[8..12]);

    if !region.contains(address, size) {
        debug!(
            address = format!("0x{:08X}", address),
            size,
            region_start = format!("0x{:08X}", region.base_address),
            region_end = format!("0x{:08X}", region.end()),
            "RequestDownload: range outside application region"
        );
        return Err(NegativeResponseCode::RequestOutOfRange);
    }

    if download.in_progress {
        warn!(
            previous_address = format!("0x{:08X}", download.write_address),
            bytes_remaining = download.bytes_remaining,
            "RequestDownload: abandoning unfinished download"
        );
    }

    info!(
        address = format!("0x{:08X}", address),
        size,
        data_format = format!("0x{:02X}", data_format),
        "RequestDownload: initiating download"
    );
    download.begin(address, size);

    let mut response = Vec::with_capacity(5);
    response.push(LENGTH_FORMAT_IDENTIFIER);
    response.extend_from_slice(&max_block_length.to_be_bytes());
    Ok(response)
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAX_BLOCK: u32 = 4096;

    fn region() -> ApplicationRegion {
        ApplicationRegion {
            base_address: 0x0000_0000,
            size: 0x2000_0000,
        }
    }

    fn request(address: u32, size: u32) -> Vec<u8> {
        let mut req = vec![0x34, 0x00, 0x04, 0x04];
        req.extend_from_slice(&address.to_be_bytes());
        req.extend_from_slice(&size.to_be_bytes());
        req
    }

    #[test]
    fn test_accepts_range_inside_region() {
        let mut download = DownloadState::default();
        let response = handle(&request(0, 1), &region(), MAX_BLOCK, &mut download).unwrap();
        assert_eq!(response, vec![0x40, 0x00, 0x00, 0x10, 0x00]);
        assert_eq!(
            download,
            DownloadState {
                in_progress: true,
                write_address: 0,
                bytes_remaining: 1,
                expected_block_index: 0,
                start_address: 0,
                total_size: 1,
            }
        );
    }

    #[test]
    fn test_advertises_configured_block_length() {
        let mut download = DownloadState::default();
        let response = handle(&request(0x100, 0x10), &region(), 0x0102, &mut download).unwrap();
        assert_eq!(response, vec![0x40, 0x00, 0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_short_header() {
        let mut download = DownloadState::default();
        assert_eq!(
            handle(&[0x34, 0x00], &region(), MAX_BLOCK, &mut download),
            Err(NegativeResponseCode::IncorrectMessageLengthOrFormat)
        );
        assert!(!download.in_progress);
    }

    #[test]
    fn test_unsupported_field_widths() {
        let mut download = DownloadState::default();
        assert_eq!(
            handle(&[0x34, 0x00, 0x04, 0x03], &region(), MAX_BLOCK, &mut download),
            Err(NegativeResponseCode::RequestOutOfRange)
        );
        assert_eq!(
            handle(&[0x34, 0x00, 0x02, 0x04], &region(), MAX_BLOCK, &mut download),
            Err(NegativeResponseCode::RequestOutOfRange)
        );
        assert!(!download.in_progress);
    }

    #[test]
    fn test_truncated_and_oversized_fields() {
        let mut download = DownloadState::default();
        let mut req = request(0xF000_0000, 1);
        req.pop();
        assert_eq!(
            handle(&req, &region(), MAX_BLOCK, &mut download),
            Err(NegativeResponseCode::IncorrectMessageLengthOrFormat)
        );

        let mut req = request(0, 1);
        req.push(0x00);
        assert_eq!(
            handle(&req, &region(), MAX_BLOCK, &mut download),
            Err(NegativeResponseCode::IncorrectMessageLengthOrFormat)
        );
        assert!(!download.in_progress);
    }

    #[test]
    fn test_range_outside_region() {
        let mut download = DownloadState::default();
        for (address, size) in [
            (0xF000_0000, 1),
            (0, 0xF000_0000),
            (0x1FFF_FFFF, 2),
            (0xFFFF_FFFF, 0xFFFF_FFFF),
            (0x2000_0001, 0),
        ] {
            assert_eq!(
                handle(&request(address, size), &region(), MAX_BLOCK, &mut download),
                Err(NegativeResponseCode::RequestOutOfRange),
                "address 0x{:08X} size 0x{:08X}",
                address,
                size
            );
        }
        assert!(!download.in_progress);
    }

    #[test]
    fn test_zero_size_inside_region_accepted() {
        let mut download = DownloadState::default();
        let response = handle(&request(0, 0), &region(), MAX_BLOCK, &mut download).unwrap();
        assert_eq!(response, vec![0x40, 0x00, 0x00, 0x10, 0x00]);
        assert!(download.in_progress);
        assert_eq!(download.bytes_remaining, 0);
        assert!(download.is_complete());
    }

    #[test]
    fn test_respects_region_base() {
        let region = ApplicationRegion {
            base_address: 0x0800_4000,
            size: 0x1000,
        };
        let mut download = DownloadState::default();
        assert_eq!(
            handle(&request(0x0800_3FFF, 1), &region, MAX_BLOCK, &mut download),
            Err(NegativeResponseCode::RequestOutOfRange)
        );
        assert!(handle(&request(0x0800_4000, 0x1000), &region, MAX_BLOCK, &mut download).is_ok());
    }

    #[test]
    fn test_new_request_restarts_download() {
        let mut download = DownloadState::default();
        handle(&request(0x10, 8), &region(), MAX_BLOCK, &mut download).unwrap();
        download.advance(3, 4);
        handle(&request(0x80, 2), &region(), MAX_BLOCK, &mut download).unwrap();
        assert_eq!(download.write_address, 0x80);
        assert_eq!(download.bytes_remaining, 2);
        assert_eq!(download.expected_block_index, 0);
    }
}
