//! The three admission checks, run in this order: GPU configuration,
//! GPU matrix multiplication, RAM/storage/network.

mod gpu_check;
mod matrix_check;
mod verifyx_check;

pub use gpu_check::GpuCheck;
pub use matrix_check::{MatrixCheck, MatrixCheckError};
pub use verifyx_check::{VerifyxCheck, VerifyxCheckError, VerifyxConfig};
