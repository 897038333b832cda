//! Daemon configuration
//!
//! ```toml
//! [bootloader.application]
//! base_address = "0x08004000"
//! size = "0x0001C000"
//!
//! [bootloader.transfer]
//! max_block_length = 4096
//!
//! [transport]
//! type = "serial"
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [flash]
//! type = "file"
//! path = "app.bin"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use udsboot_core::BootloaderConfig;

#[derive(Debug, Error)]
pub enum DaemonConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid bootloader configuration: {0}")]
    Invalid(#[from] udsboot_core::ConfigError),
}

/// Complete daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Engine configuration
    #[serde(default)]
    pub bootloader: BootloaderConfig,

    /// How testers reach the bootloader
    #[serde(default)]
    pub transport: TransportConfig,

    /// Where firmware is programmed
    #[serde(default)]
    pub flash: FlashBackend,
}

impl DaemonConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DaemonConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DaemonConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| DaemonConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DaemonConfigError> {
        self.bootloader.validate()?;
        Ok(())
    }
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Byte channel the engine is served over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// TCP listener, one tester connection at a time
    Tcp {
        #[serde(default = "default_listen")]
        listen: String,
    },
    /// Serial port
    Serial {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
}

fn default_listen() -> String {
    "127.0.0.1:13400".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Tcp {
            listen: default_listen(),
        }
    }
}

impl TransportConfig {
    pub fn serial(port: impl Into<String>, baud_rate: Option<u32>) -> Self {
        Self::Serial {
            port: port.into(),
            baud_rate: baud_rate.unwrap_or_else(default_baud_rate),
        }
    }
}

// =============================================================================
// Flash Configuration
// =============================================================================

/// Flash backend the engine programs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlashBackend {
    /// Volatile in-memory image, lost on exit
    #[default]
    Memory,
    /// Image file; offset 0 corresponds to the application base address
    File { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(config.bootloader, BootloaderConfig::default());
        assert_eq!(
            config.transport,
            TransportConfig::Tcp {
                listen: "127.0.0.1:13400".to_string()
            }
        );
        assert_eq!(config.flash, FlashBackend::Memory);
    }

    #[test]
    fn test_parse_serial_file_config() {
        let toml = r#"
[bootloader.application]
base_address = "0x08004000"
size = 114688

[bootloader.transfer]
max_block_length = 1026

[transport]
type = "serial"
port = "/dev/ttyUSB0"

[flash]
type = "file"
path = "/tmp/app.bin"
"#;
        let config: DaemonConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bootloader.application.base_address, 0x0800_4000);
        assert_eq!(config.bootloader.application.size, 0x0001_C000);
        assert_eq!(config.bootloader.transfer.max_block_length, 1026);
        assert_eq!(
            config.transport,
            TransportConfig::Serial {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: 115_200
            }
        );
        assert_eq!(
            config.flash,
            FlashBackend::File {
                path: PathBuf::from("/tmp/app.bin")
            }
        );
    }

    #[test]
    fn test_load_rejects_invalid_region() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bootloader.application]\nsize = 0").unwrap();

        let err = DaemonConfig::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            DaemonConfigError::Invalid(udsboot_core::ConfigError::EmptyRegion)
        ));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transport]\ntype = \"carrier-pigeon\"").unwrap();

        let err = DaemonConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, DaemonConfigError::Parse { .. }));
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config: DaemonConfig =
            toml::from_str(include_str!("../../../config/udsbootd.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.bootloader.application.base_address, 0x0800_4000);
        assert_eq!(
            config.transport,
            TransportConfig::Tcp {
                listen: "0.0.0.0:13400".to_string()
            }
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = DaemonConfig::load("/nonexistent/udsbootd.toml").unwrap_err();
        assert!(matches!(err, DaemonConfigError::Read { .. }));
    }
}
