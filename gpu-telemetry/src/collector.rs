use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use tracing::debug;

use crate::fingerprint::{Fingerprint, GpuDetail};

/// Controls which optional fingerprint fields are populated.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectOptions {
    /// Populate `gpu_details` with per-device utilization and memory.
    pub include_utilization: bool,
    /// Populate `gpu_memory_mb` with the first device's total memory.
    pub include_memory: bool,
}

/// Takes a fingerprint snapshot of the local machine.
///
/// Returns `None` when no devices are present or the driver cannot be
/// queried at all. Individual per-device detail reads that fail are
/// defaulted to zero rather than discarding the whole snapshot.
pub fn collect(options: CollectOptions) -> Option<Fingerprint> {
    match try_collect(options) {
        Ok(fingerprint) => fingerprint,
        Err(e) => {
            debug!("Failed to get GPU info: {e}");
            None
        }
    }
}

fn try_collect(options: CollectOptions) -> Result<Option<Fingerprint>, NvmlError> {
    let nvml = Nvml::init()?;
    let device_count = nvml.device_count()?;
    if device_count == 0 {
        return Ok(None);
    }

    let first = nvml.device_by_index(0)?;
    let gpu_model = first.name()?;
    let gpu_memory_mb = if options.include_memory {
        Some(
            first
                .memory_info()
                .map(|memory| memory.total / (1024 * 1024))
                .unwrap_or(0),
        )
    } else {
        None
    };

    let mut uuids = Vec::with_capacity(device_count as usize);
    let mut details = Vec::with_capacity(device_count as usize);
    for index in 0..device_count {
        let device = nvml.device_by_index(index)?;
        let uuid = device.uuid()?;
        if options.include_utilization {
            let (utilization, memory_utilization) = device
                .utilization_rates()
                .map(|rates| (rates.gpu, rates.memory))
                .unwrap_or((0, 0));
            let memory_total_mb = device
                .memory_info()
                .map(|memory| memory.total / (1024 * 1024))
                .unwrap_or(0);
            details.push(GpuDetail {
                index,
                name: device.name().unwrap_or_else(|_| gpu_model.clone()),
                uuid: uuid.clone(),
                utilization,
                memory_utilization,
                memory_total_mb,
            });
        }
        uuids.push(uuid);
    }

    let joined = uuids.join(",");
    Ok(Some(Fingerprint {
        gpu_count: device_count,
        gpu_model,
        gpu_uuids: joined.clone(),
        uuids: joined,
        gpu_details: options.include_utilization.then_some(details),
        gpu_memory_mb,
    }))
}
