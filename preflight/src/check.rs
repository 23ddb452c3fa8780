use async_trait::async_trait;

/// Status of a validation check. A check is synchronous-to-completion;
/// there is no partial or pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Passed,
    Failed,
}

/// Result of a single validation check. Produced exactly once per check
/// invocation and never mutated after creation.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

impl CheckResult {
    pub fn passed(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Passed,
            message: message.into(),
        }
    }

    pub fn failed(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Failed,
            message: message.into(),
        }
    }
}

/// A self-contained preflight validation capability.
///
/// Every error, domain or unexpected, is converted into a Failed
/// `CheckResult` inside `run`; the runner never sees anything else.
#[async_trait]
pub trait PreflightCheck {
    /// The name of this check, used to prefix its failure message.
    fn name(&self) -> &str;

    /// Runs the validation check to completion.
    async fn run(&self) -> CheckResult;
}

/// Truncates `s` to at most `max` characters, for log and error previews.
pub(crate) fn preview(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((index, _)) => &s[..index],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_strings() {
        assert_eq!(preview("0123456789", 8), "01234567");
        assert_eq!(preview("short", 8), "short");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("ééééé", 3), "ééé");
    }
}
