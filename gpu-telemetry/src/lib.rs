//! GPU fingerprint collection over NVML.
//!
//! This crate is the read-only telemetry surface of the preflight pipeline:
//! it queries device count, model names, UUIDs and (optionally) per-device
//! utilization and memory through `nvml-wrapper`. A machine without working
//! GPUs yields "no data" rather than an error, so callers can decide for
//! themselves whether an absent fingerprint is fatal.

mod collector;
mod fingerprint;

pub use collector::{collect, CollectOptions};
pub use fingerprint::{Fingerprint, GpuDetail, MachineInfo};
