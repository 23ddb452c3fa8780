//! Typed binding for `libverifyx.so`, the RAM/storage/network exercise
//! engine.
//!
//! Strings returned by this engine are caller-owned: the binding copies
//! each one into a Rust `String` and immediately releases the native
//! buffer through the engine's `str_del` destructor. The service handle
//! itself is released through `service_del` exactly once, when dropped.

mod bindings;
mod error;
mod service;

pub use error::{Result, VerifyxError};
pub use service::{Service, VerifyX};
