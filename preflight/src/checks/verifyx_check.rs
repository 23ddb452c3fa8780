use async_trait::async_trait;
use gpu_telemetry::{collect, CollectOptions, Fingerprint};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use verifyx::VerifyX;

use crate::check::{preview, CheckResult, PreflightCheck};
use crate::constants::{
    MEMORY_ALLOCATION_PERCENTAGE, MEMORY_MAX_TEST_GB, MEMORY_MIN_TEST_GB, NETWORK_TIMEOUT_SECONDS,
    STORAGE_MIN_AVAILABLE_GB, STORAGE_THROUGHPUT_TEST_GB, VERIFYX_LIB_PATH,
};
use crate::suppress::OutputSuppression;

const NAME: &str = "VerifyX (RAM/Storage/Network)";

type Result<T> = std::result::Result<T, VerifyxCheckError>;

#[derive(Debug, thiserror::Error)]
pub enum VerifyxCheckError {
    #[error("No GPUs detected for verifyx test")]
    NoGpu,

    #[error("Cannot load VerifyX library at {path}: {source}")]
    LibraryLoad {
        path: String,
        source: verifyx::VerifyxError,
    },

    #[error("Library returned non-zero from generate_challenge")]
    ChallengeGeneration,

    #[error("Failed to get cipher text from VerifyX challenge")]
    CipherFetch,

    #[error("VerifyX tests failed to execute")]
    Execution,

    #[error("VerifyX verify() returned no data")]
    Verification,

    #[error("Unexpected error: {0}")]
    Engine(#[from] verifyx::VerifyxError),

    #[error("Unexpected error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Io(#[from] std::io::Error),
}

/// Test-size knobs passed opaquely to the verifyx engine. The engine, not
/// this orchestrator, interprets them; the network timeout in particular is
/// honored inside native code only.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyxConfig {
    pub memory_allocation_percentage: u32,
    pub memory_min_test_gb: u32,
    pub memory_max_test_gb: u32,
    pub storage_min_available_gb: u32,
    pub storage_throughput_test_gb: u32,
    pub network_timeout_seconds: u32,
}

impl Default for VerifyxConfig {
    fn default() -> Self {
        Self {
            memory_allocation_percentage: MEMORY_ALLOCATION_PERCENTAGE,
            memory_min_test_gb: MEMORY_MIN_TEST_GB,
            memory_max_test_gb: MEMORY_MAX_TEST_GB,
            storage_min_available_gb: STORAGE_MIN_AVAILABLE_GB,
            storage_throughput_test_gb: STORAGE_THROUGHPUT_TEST_GB,
            network_timeout_seconds: NETWORK_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Serialize)]
struct ChallengeInput<'a> {
    seed: u64,
    machine_info: &'a Fingerprint,
    config: &'a VerifyxConfig,
}

#[derive(Debug, Default, Deserialize)]
struct VerificationReport {
    #[serde(default)]
    response_data: ResponseData,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseData {
    #[serde(default)]
    network_execution: ExecutionOutcome,
    #[serde(default)]
    memory_execution: ExecutionOutcome,
    #[serde(default)]
    storage_execution: StorageOutcome,
}

#[derive(Debug, Default, Deserialize)]
struct ExecutionOutcome {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageOutcome {
    #[serde(default)]
    error: Option<String>,
}

/// Proves RAM, storage and network capability: the engine allocates and
/// touches RAM, measures storage throughput, and times a network download,
/// then its verify call reports per-resource outcomes. All failing
/// resources are reported together so an operator sees every failing
/// dimension at once.
pub struct VerifyxCheck {
    lib_path: String,
    config: VerifyxConfig,
    verbose: bool,
}

impl VerifyxCheck {
    pub fn new(verbose: bool) -> Self {
        Self::with_library(VERIFYX_LIB_PATH, VerifyxConfig::default(), verbose)
    }

    pub fn with_library(
        lib_path: impl Into<String>,
        config: VerifyxConfig,
        verbose: bool,
    ) -> Self {
        Self {
            lib_path: lib_path.into(),
            config,
            verbose,
        }
    }

    /// Runs the protocol and returns the list of failing resources; an
    /// empty list means every resource passed.
    fn try_run(&self) -> Result<Vec<String>> {
        let fingerprint = collect(CollectOptions {
            include_utilization: false,
            include_memory: true,
        })
        .ok_or(VerifyxCheckError::NoGpu)?;

        debug!("Loading VerifyX library from {}", self.lib_path);
        let engine = VerifyX::load(&self.lib_path).map_err(|source| {
            VerifyxCheckError::LibraryLoad {
                path: self.lib_path.clone(),
                source,
            }
        })?;
        debug!("VerifyX library loaded successfully");
        let service = engine.new_service();

        let seed: u64 = rand::thread_rng().gen();
        debug!("Generated seed: {seed}");
        let input = ChallengeInput {
            seed,
            machine_info: &fingerprint,
            config: &self.config,
        };
        let input_json = serde_json::to_string(&input)?;
        debug!("generate_challenge input: {input_json}");
        if !service.generate_challenge(&input_json)? {
            return Err(VerifyxCheckError::ChallengeGeneration);
        }

        let cipher_text = {
            let _quiet = OutputSuppression::new(self.verbose)?;
            service.cipher_text()?
        }
        .ok_or(VerifyxCheckError::CipherFetch)?;

        let raw_report = {
            let _quiet = OutputSuppression::new(self.verbose)?;
            debug!(
                "Executing VerifyX tests with cipher preview: {}",
                preview(&cipher_text, 50)
            );
            let result_cipher = service
                .execute(&cipher_text, seed)?
                .ok_or(VerifyxCheckError::Execution)?;
            service.verify(&result_cipher, seed)?
        }
        .ok_or(VerifyxCheckError::Verification)?;

        let report: VerificationReport =
            serde_json::from_str(&raw_report).map_err(|_| VerifyxCheckError::Verification)?;
        debug!("Verification result: {raw_report}");
        Ok(collect_errors(&report))
    }
}

#[async_trait]
impl PreflightCheck for VerifyxCheck {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> CheckResult {
        match self.try_run() {
            Ok(errors) if errors.is_empty() => {
                CheckResult::passed(NAME, "RAM, storage, and network validation passed")
            }
            Ok(errors) => {
                debug!("VerifyX validation failed: {errors:?}");
                CheckResult::failed(
                    NAME,
                    format!("VerifyX validation failed: {}", errors.join("; ")),
                )
            }
            Err(e) => {
                error!("VerifyX failed: {e}");
                CheckResult::failed(NAME, e.to_string())
            }
        }
    }
}

/// Aggregates every failing sub-report into human-readable reasons. Unlike
/// the telemetry gates this does not short-circuit: an operator needs all
/// failing dimensions visible at once.
fn collect_errors(report: &VerificationReport) -> Vec<String> {
    let data = &report.response_data;
    let mut errors = Vec::new();

    if !data.network_execution.success {
        errors.push(format!(
            "Network: {}",
            data.network_execution
                .error
                .as_deref()
                .unwrap_or("Network test failed")
        ));
    }
    if !data.memory_execution.success {
        errors.push(format!(
            "RAM: {}",
            data.memory_execution
                .error
                .as_deref()
                .unwrap_or("Memory test failed")
        ));
    }
    if let Some(error) = &data.storage_execution.error {
        errors.push(format!("Storage: {error}"));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(report: &str) -> VerificationReport {
        serde_json::from_str(report).unwrap()
    }

    #[test]
    fn all_passing_report_yields_no_errors() {
        let report = parse(
            r#"{"response_data": {
                "network_execution": {"success": true},
                "memory_execution": {"success": true},
                "storage_execution": {}
            }}"#,
        );
        assert!(collect_errors(&report).is_empty());
    }

    #[test]
    fn every_failing_resource_is_reported_together() {
        let report = parse(
            r#"{"response_data": {
                "network_execution": {"success": false, "error": "download timed out"},
                "memory_execution": {"success": false, "error": "allocation failed at 12 GiB"},
                "storage_execution": {"error": "throughput below threshold"}
            }}"#,
        );
        let errors = collect_errors(&report);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], "Network: download timed out");
        assert_eq!(errors[1], "RAM: allocation failed at 12 GiB");
        assert_eq!(errors[2], "Storage: throughput below threshold");
    }

    #[test]
    fn missing_error_details_fall_back_to_generic_reasons() {
        let report = parse(
            r#"{"response_data": {
                "network_execution": {"success": false},
                "memory_execution": {"success": true},
                "storage_execution": {}
            }}"#,
        );
        let errors = collect_errors(&report);
        assert_eq!(errors, vec!["Network: Network test failed".to_string()]);
    }

    #[test]
    fn absent_response_data_counts_as_failed_resources() {
        // An empty report defaults every success flag to false.
        let report = parse("{}");
        let errors = collect_errors(&report);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Network:"));
        assert!(errors[1].starts_with("RAM:"));
    }

    #[test]
    fn challenge_input_embeds_seed_fingerprint_and_config() {
        let fingerprint = Fingerprint {
            gpu_count: 1,
            gpu_model: "NVIDIA H100 80GB HBM3".to_string(),
            gpu_uuids: "GPU-aaa".to_string(),
            uuids: "GPU-aaa".to_string(),
            gpu_details: None,
            gpu_memory_mb: Some(81559),
        };
        let config = VerifyxConfig::default();
        let input = ChallengeInput {
            seed: 42,
            machine_info: &fingerprint,
            config: &config,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&input).unwrap()).unwrap();
        assert_eq!(json["seed"], 42);
        assert_eq!(json["machine_info"]["gpu_count"], 1);
        assert_eq!(
            json["config"]["memory_allocation_percentage"],
            MEMORY_ALLOCATION_PERCENTAGE
        );
        assert_eq!(json["config"]["network_timeout_seconds"], NETWORK_TIMEOUT_SECONDS);
    }
}
