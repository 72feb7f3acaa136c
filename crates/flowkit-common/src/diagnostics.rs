/// How bad a diagnostic is.
///
/// Structural errors are surfaced inline in the emitted document so the
/// failure is visible at the corresponding position; validation errors
/// make the offending block compile to nothing. Neither aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A single best-effort compile diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Block type the diagnostic was raised for.
    pub block: String,
    pub message: String,
}

impl Diagnostic {
    pub fn error(block: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            block: block.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(block: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            block: block.to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}[{}]: {}", tag, self.block, self.message)
    }
}
