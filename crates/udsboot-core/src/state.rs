//! Session and download state
//!
//! Both machines are owned by a single [`Bootloader`](crate::Bootloader)
//! instance and only mutated after a request has been fully validated.

/// Active diagnostic session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Default session (0x01), active after start-up and reset
    #[default]
    Default,
    /// Programming session (0x02)
    Programming,
}

/// State of the firmware download in progress, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadState {
    /// Set by RequestDownload, cleared by RequestTransferExit or reset
    pub in_progress: bool,
    /// Address the next TransferData block is written to
    pub write_address: u32,
    /// Bytes still accepted before the declared size is reached
    pub bytes_remaining: u32,
    /// Block index carried by the last accepted TransferData request.
    /// Echoed only; gaps and repeats are not rejected.
    pub expected_block_index: u8,
    /// Address the download started at
    pub start_address: u32,
    /// Size declared by RequestDownload
    pub total_size: u32,
}

impl DownloadState {
    /// Start a download of `size` bytes at `address`.
    pub fn begin(&mut self, address: u32, size: u32) {
        *self = Self {
            in_progress: true,
            write_address: address,
            bytes_remaining: size,
            expected_block_index: 0,
            start_address: address,
            total_size: size,
        };
    }

    /// Account for `len` bytes of block `block_index` having been written.
    ///
    /// Callers validate `len <= bytes_remaining` first.
    pub fn advance(&mut self, block_index: u8, len: u32) {
        debug_assert!(len <= self.bytes_remaining);
        self.write_address = self.write_address.wrapping_add(len);
        self.bytes_remaining -= len;
        self.expected_block_index = block_index;
    }

    /// Bytes written since RequestDownload
    pub fn bytes_written(&self) -> u32 {
        self.total_size - self.bytes_remaining
    }

    /// Whether every declared byte has been written
    pub fn is_complete(&self) -> bool {
        self.in_progress && self.bytes_remaining == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
