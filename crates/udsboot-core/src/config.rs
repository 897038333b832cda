//! Bootloader engine configuration
//!
//! Addresses and sizes accept either integers or hex strings:
//!
//! ```toml
//! [application]
//! base_address = "0x08004000"
//! size = "0x0001C000"
//!
//! [transfer]
//! max_block_length = 4096
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maxNumberOfBlockLength advertised by RequestDownload
pub const DEFAULT_MAX_BLOCK_LENGTH: u32 = 4096;

/// Smallest accepted max_block_length: the fixed-size RequestDownload
/// request (4 header bytes, 4-byte address, 4-byte size) must fit in a frame
pub const MIN_MAX_BLOCK_LENGTH: u32 = 12;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Application region is empty")]
    EmptyRegion,

    #[error("Application region 0x{base:08X}+0x{size:08X} exceeds the 32-bit address space")]
    RegionOverflow { base: u32, size: u32 },

    #[error("max_block_length {0} is below the minimum of 12")]
    BlockLengthTooSmall(u32),
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootloaderConfig {
    /// Region firmware may be written to
    #[serde(default)]
    pub application: ApplicationRegion,

    /// Transfer limits
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl BootloaderConfig {
    /// Configuration for an application region at `base_address` spanning `size` bytes
    pub fn with_application(base_address: u32, size: u32) -> Self {
        Self {
            application: ApplicationRegion { base_address, size },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.application.validate()?;
        if self.transfer.max_block_length < MIN_MAX_BLOCK_LENGTH {
            return Err(ConfigError::BlockLengthTooSmall(
                self.transfer.max_block_length,
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Application Region
// =============================================================================

/// Memory range the bootloader is allowed to program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRegion {
    #[serde(default = "default_base_address", deserialize_with = "deserialize_hex_u32")]
    pub base_address: u32,

    #[serde(default = "default_region_size", deserialize_with = "deserialize_hex_u32")]
    pub size: u32,
}

fn default_base_address() -> u32 {
    0x0000_0000
}

fn default_region_size() -> u32 {
    0x2000_0000
}

impl Default for ApplicationRegion {
    fn default() -> Self {
        Self {
            base_address: default_base_address(),
            size: default_region_size(),
        }
    }
}

impl ApplicationRegion {
    /// Whether `[address, address + size)` lies entirely inside the region.
    ///
    /// Computed in 64 bits so wrap-around requests cannot sneak through.
    pub fn contains(&self, address: u32, size: u32) -> bool {
        let start = u64::from(address);
        let end = start + u64::from(size);
        let region_start = u64::from(self.base_address);
        let region_end = region_start + u64::from(self.size);

        start >= region_start && end <= region_end
    }

    /// Exclusive end address
    pub fn end(&self) -> u64 {
        u64::from(self.base_address) + u64::from(self.size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::EmptyRegion);
        }
        if self.end() > u64::from(u32::MAX) + 1 {
            return Err(ConfigError::RegionOverflow {
                base: self.base_address,
                size: self.size,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Transfer Configuration
// =============================================================================

/// Transfer configuration for UDS 0x34/0x36
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// maxNumberOfBlockLength: the largest TransferData request accepted,
    /// including its sid and block index. Also bounds every request frame;
    /// responses are not limited by it.
    #[serde(default = "default_max_block_length")]
    pub max_block_length: u32,
}

fn default_max_block_length() -> u32 {
    DEFAULT_MAX_BLOCK_LENGTH
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_block_length: default_max_block_length(),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Deserialize a hex u32 (supports "0x08000000" or 134217728)
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Hex(String),
        Int(u32),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Hex(s) => {
            let s = s.trim();
            let digits = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .unwrap_or(s);
            u32::from_str_radix(&digits.replace('_', ""), 16)
                .map_err(|e| D::Error::custom(format!("invalid hex value '{}': {}", s, e)))
        }
    }
}
