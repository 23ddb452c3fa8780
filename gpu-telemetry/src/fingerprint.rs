use serde::{Deserialize, Serialize};

/// Telemetry detail for a single device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuDetail {
    /// NVML device index.
    pub index: u32,
    /// Device model name.
    pub name: String,
    /// Device UUID.
    pub uuid: String,
    /// Compute utilization, in percent.
    pub utilization: u32,
    /// Memory-bandwidth utilization, in percent.
    pub memory_utilization: u32,
    /// Total device memory, in MiB.
    pub memory_total_mb: u64,
}

/// Aggregated device identity/telemetry snapshot for one machine.
///
/// The UUID list crosses the FFI boundary as a comma-joined string, which is
/// what the native challenge engines hash; `uuids` is an alias of
/// `gpu_uuids` kept for engine compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Number of devices reported by the driver.
    pub gpu_count: u32,
    /// Model name of the first device.
    pub gpu_model: String,
    /// Comma-joined UUIDs of all devices, in index order.
    pub gpu_uuids: String,
    /// Alias of `gpu_uuids`.
    pub uuids: String,
    /// Per-device utilization details, populated on request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_details: Option<Vec<GpuDetail>>,
    /// Total memory of the first device in MiB, populated on request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_memory_mb: Option<u64>,
}

impl Fingerprint {
    /// Splits the joined UUID string back into individual UUIDs. An empty
    /// string yields an empty list.
    pub fn uuid_list(&self) -> Vec<&str> {
        self.gpu_uuids
            .split(',')
            .filter(|uuid| !uuid.is_empty())
            .collect()
    }

    /// Reduced identity view fed to the matrix challenge engine.
    pub fn machine_info(&self) -> MachineInfo<'_> {
        MachineInfo {
            gpu_count: self.gpu_count,
            gpu_model: &self.gpu_model,
            uuids: &self.gpu_uuids,
        }
    }
}

/// The subset of the fingerprint the matrix engine binds into its cipher.
///
/// Fields are declared in alphabetical order so the serialized JSON matches
/// the key order the engine expects.
#[derive(Debug, Serialize)]
pub struct MachineInfo<'a> {
    pub gpu_count: u32,
    pub gpu_model: &'a str,
    pub uuids: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(uuids: &str) -> Fingerprint {
        Fingerprint {
            gpu_count: 2,
            gpu_model: "NVIDIA H100 80GB HBM3".to_string(),
            gpu_uuids: uuids.to_string(),
            uuids: uuids.to_string(),
            gpu_details: None,
            gpu_memory_mb: Some(81559),
        }
    }

    #[test]
    fn uuid_list_splits_joined_string() {
        let fingerprint = fingerprint("GPU-aaa,GPU-bbb");
        assert_eq!(fingerprint.uuid_list(), vec!["GPU-aaa", "GPU-bbb"]);
    }

    #[test]
    fn uuid_list_is_empty_for_empty_string() {
        assert!(fingerprint("").uuid_list().is_empty());
    }

    #[test]
    fn machine_info_serializes_with_sorted_keys() {
        let fingerprint = fingerprint("GPU-aaa,GPU-bbb");
        let json = serde_json::to_string(&fingerprint.machine_info()).unwrap();
        assert_eq!(
            json,
            r#"{"gpu_count":2,"gpu_model":"NVIDIA H100 80GB HBM3","uuids":"GPU-aaa,GPU-bbb"}"#
        );
    }

    #[test]
    fn fingerprint_omits_absent_optional_fields() {
        let mut fingerprint = fingerprint("GPU-aaa");
        fingerprint.gpu_memory_mb = None;
        let json = serde_json::to_string(&fingerprint).unwrap();
        assert!(!json.contains("gpu_details"));
        assert!(!json.contains("gpu_memory_mb"));
    }
}
