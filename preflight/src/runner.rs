use serde::Serialize;
use tracing::debug;

use crate::check::{CheckStatus, PreflightCheck};

/// Final verdict of a preflight run, emitted as one JSON object on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Executes the checks one at a time, in order, each to completion.
///
/// The first Failed result stops the run; remaining checks are never
/// invoked and exactly one failing reason is surfaced, prefixed with the
/// check's name. Checks never run concurrently: they exercise the
/// machine's single shared GPU/RAM/storage/network resource, and
/// concurrent exercise would corrupt the timing-sensitive measurements.
pub async fn run_checks(checks: &[Box<dyn PreflightCheck + Send + Sync>]) -> Verdict {
    for check in checks {
        debug!("Running check: {}", check.name());
        let result = check.run().await;
        match result.status {
            CheckStatus::Passed => {
                debug!("✓ {}: PASSED - {}", result.name, result.message);
            }
            CheckStatus::Failed => {
                debug!("✗ {}: FAILED - {}", result.name, result.message);
                return Verdict {
                    passed: false,
                    message: Some(format!("{}: {}", result.name, result.message)),
                };
            }
        }
    }
    Verdict {
        passed: true,
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::check::CheckResult;

    struct StaticCheck {
        name: &'static str,
        pass: bool,
        invoked: Arc<AtomicBool>,
    }

    impl StaticCheck {
        fn new(name: &'static str, pass: bool) -> (Box<dyn PreflightCheck + Send + Sync>, Arc<AtomicBool>) {
            let invoked = Arc::new(AtomicBool::new(false));
            let check = Box::new(Self {
                name,
                pass,
                invoked: invoked.clone(),
            });
            (check, invoked)
        }
    }

    #[async_trait]
    impl PreflightCheck for StaticCheck {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> CheckResult {
            self.invoked.store(true, Ordering::SeqCst);
            if self.pass {
                CheckResult::passed(self.name, "ok")
            } else {
                CheckResult::failed(self.name, "broken")
            }
        }
    }

    #[tokio::test]
    async fn all_passing_checks_yield_a_clean_verdict() {
        let (a, _) = StaticCheck::new("A", true);
        let (b, _) = StaticCheck::new("B", true);
        let verdict = run_checks(&[a, b]).await;
        assert!(verdict.passed);
        assert_eq!(verdict.message, None);
        assert_eq!(serde_json::to_string(&verdict).unwrap(), r#"{"passed":true}"#);
    }

    #[tokio::test]
    async fn first_failure_short_circuits_remaining_checks() {
        let (a, a_invoked) = StaticCheck::new("A", true);
        let (b, b_invoked) = StaticCheck::new("B", false);
        let (c, c_invoked) = StaticCheck::new("C", true);
        let verdict = run_checks(&[a, b, c]).await;
        assert!(!verdict.passed);
        assert_eq!(verdict.message.as_deref(), Some("B: broken"));
        assert!(a_invoked.load(Ordering::SeqCst));
        assert!(b_invoked.load(Ordering::SeqCst));
        assert!(!c_invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failing_verdict_serializes_with_message() {
        let (a, _) = StaticCheck::new("A", false);
        let verdict = run_checks(&[a]).await;
        let json = serde_json::to_string(&verdict).unwrap();
        assert_eq!(json, r#"{"passed":false,"message":"A: broken"}"#);
    }
}
