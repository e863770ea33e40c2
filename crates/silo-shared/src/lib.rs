//! # silo-shared
//!
//! Types shared by every Silo crate: the domain model for uploads and
//! channel messages, and the [`ChannelPlatform`] boundary behind which the
//! external messaging platform lives.
//!
//! The crate also ships an [`memory::InMemoryChannel`] implementation of the
//! boundary, used by tests and for running a node without platform
//! credentials.

pub mod constants;
pub mod memory;
pub mod platform;
pub mod types;

pub use platform::{ChannelPlatform, PlatformError};
pub use types::*;
