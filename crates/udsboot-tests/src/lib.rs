//! Integration tests for the UDS bootloader
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p udsboot-tests
//! ```
//!
//! # Test Structure
//!
//! - `protocol_test.rs` - byte-exact request streams through in-memory channels
//! - `tcp_e2e_test.rs` - a tester talking to the daemon TCP transport
//!
//! The helpers below build request streams and split response streams.

use std::io::Cursor;

use udsboot_core::{Bootloader, BootloaderConfig, MemoryFlash};

/// Application region used by the request streams: the whole lower 512 MiB
pub const APPLICATION_ADDRESS: u32 = 0x0000_0000;
pub const APPLICATION_SIZE: u32 = 0x2000_0000;

pub type TestBootloader = Bootloader<Cursor<Vec<u8>>, Vec<u8>, MemoryFlash>;

/// Frame a single request payload
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut bytes = (payload.len() as u32).to_be_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// Frame and concatenate several request payloads
pub fn frames(payloads: &[&[u8]]) -> Vec<u8> {
    payloads.iter().flat_map(|payload| frame(payload)).collect()
}

/// RequestDownload for `size` bytes at `address` with 4-byte fields
pub fn request_download(address: u32, size: u32) -> Vec<u8> {
    let mut request = vec![0x34, 0x00, 0x04, 0x04];
    request.extend_from_slice(&address.to_be_bytes());
    request.extend_from_slice(&size.to_be_bytes());
    request
}

/// TransferData carrying `data` as block `block_index`
pub fn transfer_data(block_index: u8, data: &[u8]) -> Vec<u8> {
    let mut request = vec![0x36, block_index];
    request.extend_from_slice(data);
    request
}

/// Engine over an in-memory request stream and the default test region
pub fn bootloader(input: Vec<u8>) -> TestBootloader {
    bootloader_with(
        input,
        BootloaderConfig::with_application(APPLICATION_ADDRESS, APPLICATION_SIZE),
    )
}

pub fn bootloader_with(input: Vec<u8>, config: BootloaderConfig) -> TestBootloader {
    let flash = MemoryFlash::new(config.application);
    Bootloader::new(Cursor::new(input), Vec::new(), flash, config)
}

/// Split a captured output stream into response payloads.
///
/// Panics on a truncated frame; a captured stream is always complete.
pub fn responses(output: &[u8]) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    let mut rest = output;
    while !rest.is_empty() {
        let length = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        payloads.push(rest[4..4 + length].to_vec());
        rest = &rest[4 + length..];
    }
    payloads
}
