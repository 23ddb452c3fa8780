//! Typed binding for `libdmcompverify.so`, the GPU matrix-multiplication
//! challenge engine.
//!
//! The binding performs no business logic: it resolves the engine's entry
//! points once at load time, marshals integer and byte-buffer arguments,
//! and guarantees that every native verifier handle is freed exactly once.
//! Strings returned by the engine are owned by the verifier handle; they
//! are copied into Rust `String`s before the handle is released.

mod bindings;
mod error;
mod verifier;

pub use error::{DmCompVerifyError, Result};
pub use verifier::{DmCompVerify, Verifier};
