/// GPU models eligible for fleet admission.
///
/// The names must match NVML's reported device names exactly. The first
/// five entries are shown to the operator when an unsupported model is
/// rejected.
pub const SUPPORTED_GPU_MODELS: &[&str] = &[
    "NVIDIA H200",
    "NVIDIA H100 80GB HBM3",
    "NVIDIA H100 PCIe",
    "NVIDIA A100-SXM4-80GB",
    "NVIDIA A100 80GB PCIe",
    "NVIDIA L40S",
    "NVIDIA RTX A6000",
    "NVIDIA GeForce RTX 4090",
    "NVIDIA GeForce RTX 3090",
];

/// Maximum number of GPUs a single node may claim.
pub const MAX_GPU_COUNT: u32 = 8;

/// A GPU at or above this compute utilization (percent) is considered busy.
pub const GPU_UTILIZATION_LIMIT: u32 = 10;

/// A GPU above this memory utilization (percent) is considered busy.
pub const GPU_MEMORY_UTILIZATION_LIMIT: u32 = 10;

/// Default path of the matrix-multiplication challenge engine.
pub const DMCOMPVERIFY_LIB_PATH: &str = "/usr/lib/libdmcompverify.so";

/// Default path of the RAM/storage/network exercise engine.
pub const VERIFYX_LIB_PATH: &str = "/usr/lib/libverifyx.so";

/// Percentage of system RAM the verifyx engine allocates during its test.
pub const MEMORY_ALLOCATION_PERCENTAGE: u32 = 80;

/// Minimum amount of RAM the verifyx engine must exercise, in GiB.
pub const MEMORY_MIN_TEST_GB: u32 = 4;

/// Upper bound on the RAM the verifyx engine exercises, in GiB.
pub const MEMORY_MAX_TEST_GB: u32 = 64;

/// Minimum free storage required before the throughput test runs, in GiB.
pub const STORAGE_MIN_AVAILABLE_GB: u32 = 100;

/// Amount of data written and read back for the storage throughput test,
/// in GiB.
pub const STORAGE_THROUGHPUT_TEST_GB: u32 = 1;

/// Timeout honored by the engine's network download test, in seconds.
pub const NETWORK_TIMEOUT_SECONDS: u32 = 60;
