//! yolink-core: Shared library for the YoLink cloud event agent
//!
//! This crate provides:
//! - Validated configuration records (credentials, device list)
//! - The signed vendor REST client (token exchange, device enablement)
//! - Device taxonomy and the registry used to label incoming events
//! - Event decoding for raw broker payloads

pub mod auth;
pub mod config;
pub mod device;
pub mod event;

pub use auth::{AuthClient, AuthError, Session};
pub use config::{Config, ConfigError, Credentials, DeviceEntry, ForwardConfig};
pub use device::{DeviceKind, DeviceRecord, DeviceRegistry};
pub use event::{DecodeError, Event};

/// Port the vendor cloud broker listens on when the API response
/// does not name one.
pub const DEFAULT_BROKER_PORT: u16 = 8003;

/// Default port for the optional downstream broker.
pub const DEFAULT_FORWARD_PORT: u16 = 1883;
