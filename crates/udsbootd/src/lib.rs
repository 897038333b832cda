//! udsbootd - UDS bootloader daemon library
//!
//! Hosts a [`udsboot_core::Bootloader`] behind a TCP listener or a serial
//! port and programs firmware into a memory or file-backed image.
//!
//! # Modules
//!
//! - [`config`] - daemon configuration (engine, transport, flash backend)
//! - [`flash`] - file-backed flash image
//! - [`transport`] - TCP and serial serving loops

pub mod config;
pub mod flash;
pub mod transport;

pub use config::{DaemonConfig, FlashBackend, TransportConfig};
pub use flash::FileFlash;
pub use transport::{serve_serial, serve_stream, serve_tcp, ShutdownReader, TransportError};
