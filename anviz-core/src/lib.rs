//! # anviz-core
//!
//! Core protocol implementation for Anviz biometric time clocks.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - Checksum calculation
//! - Command and status definitions
//! - Fixed-layout payload tables and typed field decoding

pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod fields;
pub mod frame;
pub mod layout;
pub mod status;

pub use command::Command;
pub use error::{Error, Result, Violation};
pub use frame::{Request, Response, ResponseHeader, encode_request, validate_response_header};
pub use status::Status;

/// Default device port
pub const DEFAULT_PORT: u16 = 5010;
