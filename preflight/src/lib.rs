//! Preflight validation for fleet admission.
//!
//! A compute node claiming specific GPU/RAM/storage/network capacity must
//! prove, not declare, that the claimed resources exist and are idle. Each
//! check here is self-contained: it gathers its own data on the local
//! machine and validates it, and the runner executes the checks in order,
//! stopping at the first failure.

pub mod check;
pub mod checks;
pub mod constants;
pub mod runner;
pub mod suppress;

pub use check::{CheckResult, CheckStatus, PreflightCheck};
pub use runner::{run_checks, Verdict};
