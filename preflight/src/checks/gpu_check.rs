use std::collections::HashSet;

use async_trait::async_trait;
use gpu_telemetry::{collect, CollectOptions, Fingerprint};
use tracing::debug;

use crate::check::{CheckResult, PreflightCheck};
use crate::constants::{
    GPU_MEMORY_UTILIZATION_LIMIT, GPU_UTILIZATION_LIMIT, MAX_GPU_COUNT, SUPPORTED_GPU_MODELS,
};

const NAME: &str = "GPU Configuration";

/// Validates GPU configuration and availability, without touching a native
/// engine: supported model, count within limits, devices idle, UUIDs
/// present and unique.
#[derive(Debug, Default)]
pub struct GpuCheck;

impl GpuCheck {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PreflightCheck for GpuCheck {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> CheckResult {
        debug!("Getting GPU information...");
        let fingerprint = collect(CollectOptions {
            include_utilization: true,
            include_memory: false,
        });
        evaluate(fingerprint.as_ref())
    }
}

/// Ordered gates over the fingerprint; the first failing gate wins and the
/// remaining gates are not evaluated.
fn evaluate(fingerprint: Option<&Fingerprint>) -> CheckResult {
    let Some(fingerprint) = fingerprint else {
        return CheckResult::failed(
            NAME,
            "No GPUs detected. Ensure NVIDIA GPUs are installed and drivers are properly configured",
        );
    };

    let gpu_count = fingerprint.gpu_count;
    let gpu_model = fingerprint.gpu_model.as_str();
    debug!("GPU model: {gpu_model}, count: {gpu_count}");

    if !SUPPORTED_GPU_MODELS.contains(&gpu_model) {
        let sample = SUPPORTED_GPU_MODELS
            .iter()
            .take(5)
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        return CheckResult::failed(
            NAME,
            format!("GPU model '{gpu_model}' is not supported. Supported models: {sample}..."),
        );
    }

    if gpu_count > MAX_GPU_COUNT {
        return CheckResult::failed(
            NAME,
            format!("GPU count ({gpu_count}) exceeds maximum allowed ({MAX_GPU_COUNT})"),
        );
    }

    let details = fingerprint.gpu_details.as_deref().unwrap_or_default();
    if details.len() != gpu_count as usize {
        return CheckResult::failed(
            NAME,
            format!(
                "GPU count mismatch: reported {gpu_count} but detected {} GPUs",
                details.len()
            ),
        );
    }

    let busy = details
        .iter()
        .filter(|detail| {
            detail.utilization >= GPU_UTILIZATION_LIMIT
                || detail.memory_utilization > GPU_MEMORY_UTILIZATION_LIMIT
        })
        .count();
    if busy > 0 {
        return CheckResult::failed(
            NAME,
            format!(
                "GPUs must be idle. {busy} GPU(s) have high utilization \
                 (>={GPU_UTILIZATION_LIMIT}%). Stop running processes"
            ),
        );
    }

    let uuids = fingerprint.uuid_list();
    if uuids.is_empty() {
        return CheckResult::failed(
            NAME,
            "GPU UUIDs not detected. This is required for GPU tracking",
        );
    }

    let unique: HashSet<&str> = uuids.iter().copied().collect();
    if unique.len() != uuids.len() {
        return CheckResult::failed(
            NAME,
            "Duplicate GPU UUIDs detected. Each GPU must have a unique UUID",
        );
    }

    CheckResult::passed(NAME, format!("GPU validation passed: {gpu_count}x {gpu_model}"))
}
