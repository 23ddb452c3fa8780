use std::ops::RangeInclusive;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dmcompverify::DmCompVerify;
use gpu_telemetry::{collect, CollectOptions, Fingerprint};
use rand::Rng;
use tracing::{debug, error};
use uuid::Uuid;

use crate::check::{preview, CheckResult, PreflightCheck};
use crate::constants::DMCOMPVERIFY_LIB_PATH;
use crate::suppress::OutputSuppression;

const NAME: &str = "GPU Matrix Multiplication";

/// Band from which the randomized matrix dimension N is drawn.
const DIM_N_RANGE: RangeInclusive<i64> = 1900..=2000;

/// Upper bound on the derived dimension K.
const DIM_K_CAP: i64 = 8192;

/// Memory held back from the sizing budget, in MiB.
const MEMORY_SAFETY_RESERVATION_MB: u64 = 2 * 1024;

/// Width of one matrix element (double precision), in bytes.
const ELEMENT_SIZE_BYTES: f64 = 8.0;

/// Dimension the generation-side verifier is created with before the real
/// dimensions are applied; generation itself is cheap.
const PLACEHOLDER_DIM: i64 = 10;

/// How many characters of a correlation token appear in failure messages.
const TOKEN_PREVIEW_LEN: usize = 8;

type Result<T> = std::result::Result<T, MatrixCheckError>;

#[derive(Debug, thiserror::Error)]
pub enum MatrixCheckError {
    #[error("No GPUs detected for matrix multiplication test")]
    NoGpu,

    #[error("Cannot load matrix validation library at {path}: {source}")]
    LibraryLoad {
        path: String,
        source: dmcompverify::DmCompVerifyError,
    },

    #[error(
        "Calculated dim_k={dim_k} is not positive for dim_n={dim_n} and gpu_memory_mb={gpu_memory_mb}"
    )]
    Dimension {
        dim_k: i64,
        dim_n: i64,
        gpu_memory_mb: u64,
    },

    #[error("Failed to generate cipher text using {path}")]
    ChallengeGeneration { path: String },

    #[error("GPU matrix computation completed but failed to extract UUID")]
    Execution,

    #[error(
        "GPU computation produced incorrect result - UUID mismatch (expected: {expected}..., got: {got}...)"
    )]
    UuidMismatch { expected: String, got: String },

    #[error("Matrix validation encountered unexpected error: {0}")]
    Engine(#[from] dmcompverify::DmCompVerifyError),

    #[error("Matrix validation encountered unexpected error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Matrix validation encountered unexpected error: {0}")]
    Io(#[from] std::io::Error),
}

/// Narrow view of the challenge engine: wide enough for the protocol,
/// and for exercising it without the native library in tests.
trait ChallengeEngine {
    type Verifier<'a>: ChallengeVerifier
    where
        Self: 'a;

    fn new_verifier(&self, dim_n: i64, dim_k: i64) -> Self::Verifier<'_>;
}

trait ChallengeVerifier {
    fn set_dimension(&self, dim_n: i64, dim_k: i64);
    fn generate_challenge(&self, seed: i64, machine_info: &str, token: &str)
        -> dmcompverify::Result<()>;
    fn cipher_text(&self) -> dmcompverify::Result<Option<String>>;
    fn process_challenge_result(&self, seed: i64, cipher_text: &str) -> dmcompverify::Result<()>;
    fn returned_uuid(&self) -> dmcompverify::Result<Option<String>>;
}

impl ChallengeEngine for DmCompVerify {
    type Verifier<'a>
        = dmcompverify::Verifier<'a>
    where
        Self: 'a;

    fn new_verifier(&self, dim_n: i64, dim_k: i64) -> Self::Verifier<'_> {
        DmCompVerify::new_verifier(self, dim_n, dim_k)
    }
}

impl ChallengeVerifier for dmcompverify::Verifier<'_> {
    fn set_dimension(&self, dim_n: i64, dim_k: i64) {
        dmcompverify::Verifier::set_dimension(self, dim_n, dim_k);
    }

    fn generate_challenge(
        &self,
        seed: i64,
        machine_info: &str,
        token: &str,
    ) -> dmcompverify::Result<()> {
        dmcompverify::Verifier::generate_challenge(self, seed, machine_info, token)
    }

    fn cipher_text(&self) -> dmcompverify::Result<Option<String>> {
        dmcompverify::Verifier::cipher_text(self)
    }

    fn process_challenge_result(&self, seed: i64, cipher_text: &str) -> dmcompverify::Result<()> {
        dmcompverify::Verifier::process_challenge_result(self, seed, cipher_text)
    }

    fn returned_uuid(&self) -> dmcompverify::Result<Option<String>> {
        dmcompverify::Verifier::returned_uuid(self)
    }
}

/// Sizing inputs chosen for one attestation cycle.
#[derive(Debug)]
struct ChallengeParameters {
    dim_n: i64,
    dim_k: i64,
    seed: i64,
    token: String,
}

/// Proves GPU compute capability, not just GPU presence: the engine binds
/// the machine fingerprint and a fresh correlation token into a cipher,
/// the cipher is decrypted through a GPU matrix multiplication sized to
/// the claimed device memory, and the recovered token must match the one
/// sent.
pub struct MatrixCheck {
    lib_path: String,
    verbose: bool,
}

impl MatrixCheck {
    pub fn new(verbose: bool) -> Self {
        Self::with_library(DMCOMPVERIFY_LIB_PATH, verbose)
    }

    pub fn with_library(lib_path: impl Into<String>, verbose: bool) -> Self {
        Self {
            lib_path: lib_path.into(),
            verbose,
        }
    }

    fn try_run(&self) -> Result<()> {
        let fingerprint = collect(CollectOptions {
            include_utilization: false,
            include_memory: true,
        })
        .ok_or(MatrixCheckError::NoGpu)?;

        debug!("Loading matrix validation library from {}", self.lib_path);
        let engine = DmCompVerify::load(&self.lib_path).map_err(|source| {
            MatrixCheckError::LibraryLoad {
                path: self.lib_path.clone(),
                source,
            }
        })?;
        debug!("Matrix validation library loaded successfully");

        run_protocol(&engine, &fingerprint, &self.lib_path, self.verbose)
    }
}

#[async_trait]
impl PreflightCheck for MatrixCheck {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self) -> CheckResult {
        match self.try_run() {
            Ok(()) => CheckResult::passed(
                NAME,
                "GPU compute capability verified via matrix multiplication",
            ),
            Err(e) => {
                error!("Matrix validation failed: {e}");
                CheckResult::failed(NAME, e.to_string())
            }
        }
    }
}

/// The generate → execute → verify cycle. Each step is fatal on a negative
/// result; the native handles opened along the way are freed on every exit
/// path by their drop guards.
fn run_protocol<E: ChallengeEngine>(
    engine: &E,
    fingerprint: &Fingerprint,
    lib_path: &str,
    verbose: bool,
) -> Result<()> {
    let params = choose_parameters(fingerprint.gpu_memory_mb.unwrap_or(0))?;
    let machine_info = serde_json::to_string(&fingerprint.machine_info())?;
    let cipher_text = generate_cipher_text(engine, &params, &machine_info, lib_path, verbose)?;
    let returned_uuid = execute_challenge(engine, &params, &cipher_text, verbose)?;
    debug!("Returned UUID: {returned_uuid}");
    verify_token(&params.token, &returned_uuid)
}

/// Chooses dimensions, seed and correlation token for one cycle.
fn choose_parameters(gpu_memory_mb: u64) -> Result<ChallengeParameters> {
    let dim_n = rand::thread_rng().gen_range(DIM_N_RANGE);
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default();
    let token = Uuid::new_v4().to_string();
    let dim_k = calculate_max_dim_k(gpu_memory_mb, dim_n);
    if dim_k <= 0 {
        return Err(MatrixCheckError::Dimension {
            dim_k,
            dim_n,
            gpu_memory_mb,
        });
    }
    debug!("Chosen params: dim_n={dim_n} dim_k={dim_k} seed={seed} uuid={token}");
    Ok(ChallengeParameters {
        dim_n,
        dim_k,
        seed,
        token,
    })
}

/// Sizes dimension K so the proof-of-work cost scales with the claimed
/// device memory: two dim_n x (dim_n + dim_k) matrices must fit in the
/// claimed memory minus a 2 GiB reservation.
///
/// The mixed float/floor arithmetic is what the native engine uses to size
/// its own buffers; generation and execution must agree with it exactly.
fn calculate_max_dim_k(gpu_memory_mb: u64, dim_n: i64) -> i64 {
    let adjusted_mb = gpu_memory_mb.saturating_sub(MEMORY_SAFETY_RESERVATION_MB);
    let max_memory = adjusted_mb as f64 * 1024.0 * 1024.0;
    if max_memory <= 0.0 {
        return 0;
    }
    let max_elements = (max_memory / ELEMENT_SIZE_BYTES).floor();
    let dim_k = (max_elements / (2 * dim_n) as f64).floor() as i64 - dim_n;
    dim_k.clamp(1, DIM_K_CAP)
}

/// Generation side: a placeholder-sized verifier is re-dimensioned to the
/// real workload and asked to bind (seed, machine info, token) into a
/// cipher.
fn generate_cipher_text<E: ChallengeEngine>(
    engine: &E,
    params: &ChallengeParameters,
    machine_info: &str,
    lib_path: &str,
    verbose: bool,
) -> Result<String> {
    let cipher_text = {
        let _quiet = OutputSuppression::new(verbose)?;
        let verifier = engine.new_verifier(PLACEHOLDER_DIM, PLACEHOLDER_DIM);
        verifier.set_dimension(params.dim_n, params.dim_k);
        verifier.generate_challenge(params.seed, machine_info, &params.token)?;
        verifier.cipher_text()?
    };
    let cipher_text = cipher_text.ok_or_else(|| MatrixCheckError::ChallengeGeneration {
        path: lib_path.to_string(),
    })?;
    debug!("Cipher text generated (preview): {}", preview(&cipher_text, 50));
    Ok(cipher_text)
}

/// Execution side: a verifier created at the real dimensions performs the
/// GPU matrix multiplication and yields the recovered token.
fn execute_challenge<E: ChallengeEngine>(
    engine: &E,
    params: &ChallengeParameters,
    cipher_text: &str,
    verbose: bool,
) -> Result<String> {
    let returned_uuid = {
        let _quiet = OutputSuppression::new(verbose)?;
        let verifier = engine.new_verifier(params.dim_n, params.dim_k);
        verifier.process_challenge_result(params.seed, cipher_text)?;
        verifier.returned_uuid()?
    };
    returned_uuid.ok_or(MatrixCheckError::Execution)
}

fn verify_token(expected: &str, returned: &str) -> Result<()> {
    if returned != expected {
        return Err(MatrixCheckError::UuidMismatch {
            expected: preview(expected, TOKEN_PREVIEW_LEN).to_string(),
            got: preview(returned, TOKEN_PREVIEW_LEN).to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct EngineState {
        created: Cell<usize>,
        freed: Cell<usize>,
        last_token: RefCell<Option<String>>,
    }

    /// In-memory engine: binds the token into a fake cipher on generate and
    /// echoes it back on execute, unless configured to misbehave.
    struct FakeEngine {
        state: Rc<EngineState>,
        produce_cipher: bool,
        produce_uuid: bool,
        uuid_override: Option<String>,
    }

    impl FakeEngine {
        fn well_behaved() -> Self {
            Self {
                state: Rc::new(EngineState::default()),
                produce_cipher: true,
                produce_uuid: true,
                uuid_override: None,
            }
        }
    }

    struct FakeVerifier {
        state: Rc<EngineState>,
        produce_cipher: bool,
        produce_uuid: bool,
        uuid_override: Option<String>,
    }

    impl ChallengeEngine for FakeEngine {
        type Verifier<'a>
            = FakeVerifier
        where
            Self: 'a;

        fn new_verifier(&self, _dim_n: i64, _dim_k: i64) -> FakeVerifier {
            self.state.created.set(self.state.created.get() + 1);
            FakeVerifier {
                state: self.state.clone(),
                produce_cipher: self.produce_cipher,
                produce_uuid: self.produce_uuid,
                uuid_override: self.uuid_override.clone(),
            }
        }
    }

    impl ChallengeVerifier for FakeVerifier {
        fn set_dimension(&self, _dim_n: i64, _dim_k: i64) {}

        fn generate_challenge(
            &self,
            _seed: i64,
            _machine_info: &str,
            token: &str,
        ) -> dmcompverify::Result<()> {
            *self.state.last_token.borrow_mut() = Some(token.to_string());
            Ok(())
        }

        fn cipher_text(&self) -> dmcompverify::Result<Option<String>> {
            Ok(self.produce_cipher.then(|| "fake-cipher".to_string()))
        }

        fn process_challenge_result(
            &self,
            _seed: i64,
            _cipher_text: &str,
        ) -> dmcompverify::Result<()> {
            Ok(())
        }

        fn returned_uuid(&self) -> dmcompverify::Result<Option<String>> {
            if !self.produce_uuid {
                return Ok(None);
            }
            if let Some(uuid) = &self.uuid_override {
                return Ok(Some(uuid.clone()));
            }
            Ok(self.state.last_token.borrow().clone())
        }
    }

    impl Drop for FakeVerifier {
        fn drop(&mut self) {
            self.state.freed.set(self.state.freed.get() + 1);
        }
    }

    fn fingerprint(gpu_memory_mb: u64) -> Fingerprint {
        Fingerprint {
            gpu_count: 1,
            gpu_model: "NVIDIA H100 80GB HBM3".to_string(),
            gpu_uuids: "GPU-aaa".to_string(),
            uuids: "GPU-aaa".to_string(),
            gpu_details: None,
            gpu_memory_mb: Some(gpu_memory_mb),
        }
    }

    #[test]
    fn round_trip_token_passes_and_balances_handles() {
        let engine = FakeEngine::well_behaved();
        let result = run_protocol(&engine, &fingerprint(81559), "lib.so", true);
        assert!(result.is_ok());
        assert_eq!(engine.state.created.get(), 2);
        assert_eq!(engine.state.freed.get(), 2);
    }

    #[test]
    fn mismatched_token_fails_with_both_previews() {
        let engine = FakeEngine {
            uuid_override: Some("11111111-2222-3333-4444-555555555555".to_string()),
            ..FakeEngine::well_behaved()
        };
        let err = run_protocol(&engine, &fingerprint(81559), "lib.so", true).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("UUID mismatch"));
        assert!(message.contains("got: 11111111..."));
        // The expected preview is the first 8 chars of the generated token.
        let expected = engine.state.last_token.borrow().clone().unwrap();
        assert!(message.contains(&format!("expected: {}...", &expected[..8])));
        assert_eq!(engine.state.created.get(), engine.state.freed.get());
    }

    #[test]
    fn empty_cipher_is_a_challenge_generation_error() {
        let engine = FakeEngine {
            produce_cipher: false,
            ..FakeEngine::well_behaved()
        };
        let err = run_protocol(&engine, &fingerprint(81559), "lib.so", true).unwrap_err();
        assert!(matches!(err, MatrixCheckError::ChallengeGeneration { .. }));
        // Only the generation-side verifier was created, and it was freed.
        assert_eq!(engine.state.created.get(), 1);
        assert_eq!(engine.state.freed.get(), 1);
    }

    #[test]
    fn failed_execution_still_frees_every_handle() {
        let engine = FakeEngine {
            produce_uuid: false,
            ..FakeEngine::well_behaved()
        };
        let err = run_protocol(&engine, &fingerprint(81559), "lib.so", true).unwrap_err();
        assert!(matches!(err, MatrixCheckError::Execution));
        assert_eq!(engine.state.created.get(), 2);
        assert_eq!(engine.state.freed.get(), 2);
    }

    #[test]
    fn dim_k_is_nondecreasing_in_claimed_memory() {
        let dim_n = 2000;
        let mut previous = 0;
        for gpu_memory_mb in (2100..6000).step_by(100) {
            let dim_k = calculate_max_dim_k(gpu_memory_mb, dim_n);
            assert!(dim_k >= previous, "dim_k regressed at {gpu_memory_mb} MiB");
            assert!((1..=DIM_K_CAP).contains(&dim_k));
            previous = dim_k;
        }
    }

    #[test]
    fn dim_k_reaches_the_cap_for_large_memory() {
        assert_eq!(calculate_max_dim_k(81559, 1950), DIM_K_CAP);
    }

    #[test]
    fn dim_k_sits_in_band_for_mid_sized_memory() {
        // 2200 MiB leaves a 152 MiB budget: 19_922_944 elements,
        // floor(19_922_944 / 4000) - 2000 = 2980.
        assert_eq!(calculate_max_dim_k(2200, 2000), 2980);
    }

    #[test]
    fn memory_below_reservation_fails_parameter_selection() {
        assert_eq!(calculate_max_dim_k(2048, 1950), 0);
        let err = choose_parameters(1024).unwrap_err();
        assert!(matches!(err, MatrixCheckError::Dimension { .. }));
    }
}
