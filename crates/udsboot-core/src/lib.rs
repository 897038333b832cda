//! udsboot-core - UDS bootloader protocol engine
//!
//! This crate implements the request/response engine of a flashing
//! bootloader. Requests arrive as length-prefixed frames on a blocking byte
//! channel, are dispatched to one of five diagnostic services, and are
//! answered with exactly one positive or negative response frame.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Bootloader                           │
//! │                                                             │
//! │  input ──► FrameCodec ──► dispatch(ServiceId) ──► handler   │
//! │                                                    │        │
//! │            ┌──────────────┐  ┌───────────────┐     │        │
//! │            │ SessionState │  │ DownloadState │ ◄───┤        │
//! │            └──────────────┘  └───────────────┘     │        │
//! │                                                    ▼        │
//! │                                             FlashDriver     │
//! │                                                    │        │
//! │  output ◄── FrameCodec ◄── Response ◄──────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`frame`] - length-prefixed wire framing with bounded buffers
//! - [`response`] - positive/negative response payloads
//! - [`nrc`] - negative response codes
//! - [`service`] - service identifiers and protocol constants
//! - [`state`] - session and download state machines
//! - [`flash`] - flash driver interface and an in-memory driver
//! - [`config`] - engine configuration (application region, transfer limits)
//! - [`engine`] - the dispatcher tying it all together

/// Version reported through data identifier 0xF000
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod engine;
pub mod error;
pub mod flash;
pub mod frame;
pub mod nrc;
pub mod response;
pub mod service;
mod services;
pub mod state;

pub use config::{ApplicationRegion, BootloaderConfig, ConfigError, TransferConfig};
pub use engine::{Bootloader, RESPONSE_CAPACITY};
pub use error::BootloaderError;
pub use flash::{FlashDriver, FlashError, MemoryFlash};
pub use frame::{FrameCodec, FrameError};
pub use nrc::NegativeResponseCode;
pub use response::Response;
pub use service::ServiceId;
pub use state::{DownloadState, SessionState};
