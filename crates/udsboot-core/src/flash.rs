//! Flash driver interface
//!
//! The engine never touches memory directly. Every TransferData block is
//! handed to a [`FlashDriver`], and RequestTransferExit gives the driver a
//! chance to commit the image.

use std::io;

use thiserror::Error;

use crate::config::ApplicationRegion;

/// Value of an erased flash byte
pub const ERASED_BYTE: u8 = 0xFF;

#[derive(Debug, Error)]
pub enum FlashError {
    #[error("Write of {len} bytes at 0x{address:08X} is outside the application region")]
    OutOfBounds { address: u32, len: usize },

    #[error("Flash I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Flash driver error: {0}")]
    Driver(String),
}

/// Blocking flash programming interface
pub trait FlashDriver {
    /// Erase as needed and program `data` at `address`.
    ///
    /// The write either completes or returns an error; the engine only
    /// advances its download state after `Ok`.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Called by RequestTransferExit once the tester ends a download that
    /// started at `address` and wrote `written` bytes.
    fn finalize(&mut self, address: u32, written: u32) -> Result<(), FlashError> {
        let _ = (address, written);
        Ok(())
    }
}

impl<F: FlashDriver + ?Sized> FlashDriver for &mut F {
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).write(address, data)
    }

    fn finalize(&mut self, address: u32, written: u32) -> Result<(), FlashError> {
        (**self).finalize(address, written)
    }
}

impl<F: FlashDriver + ?Sized> FlashDriver for Box<F> {
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).write(address, data)
    }

    fn finalize(&mut self, address: u32, written: u32) -> Result<(), FlashError> {
        (**self).finalize(address, written)
    }
}

/// RAM-backed flash covering an application region.
///
/// Reads as erased until written. Storage grows with the highest address
/// written, so large regions cost nothing up front.
#[derive(Debug, Clone)]
pub struct MemoryFlash {
    region: ApplicationRegion,
    memory: Vec<u8>,
    finalized: Option<(u32, u32)>,
}

impl MemoryFlash {
    pub fn new(region: ApplicationRegion) -> Self {
        Self {
            region,
            memory: Vec::new(),
            finalized: None,
        }
    }

    pub fn region(&self) -> ApplicationRegion {
        self.region
    }

    /// Bytes from the region base up to the highest address written
    pub fn image(&self) -> &[u8] {
        &self.memory
    }

    /// Read `len` bytes at absolute `address`, if inside the region
    pub fn read(&self, address: u32, len: usize) -> Option<Vec<u8>> {
        let offset = self.offset(address, len)?;
        let mut data = vec![ERASED_BYTE; len];
        if offset < self.memory.len() {
            let available = (self.memory.len() - offset).min(len);
            data[..available].copy_from_slice(&self.memory[offset..offset + available]);
        }
        Some(data)
    }

    /// `(address, written)` of the last finalized download
    pub fn finalized(&self) -> Option<(u32, u32)> {
        self.finalized
    }

    fn offset(&self, address: u32, len: usize) -> Option<usize> {
        let len = u32::try_from(len).ok()?;
        if !self.region.contains(address, len) {
            return None;
        }
        Some((address - self.region.base_address) as usize)
    }
}

impl FlashDriver for MemoryFlash {
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        let offset = self
            .offset(address, data.len())
            .ok_or(FlashError::OutOfBounds {
                address,
                len: data.len(),
            })?;
        let end = offset + data.len();
        if self.memory.len() < end {
            self.memory.resize(end, ERASED_BYTE);
        }
        self.memory[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn finalize(&mut self, address: u32, written: u32) -> Result<(), FlashError> {
        self.finalized = Some((address, written));
        Ok(())
    }
}
