use flowkit_common::diagnostics::Diagnostic;
use flowkit_registry::registry::ScriptRegistry;
use serde_json::Value;

/// Per-run compiler state threaded through all compiler functions.
///
/// Created fresh for every compilation and discarded at the end; the
/// script registry is the only shared input and stays read-only for the
/// duration of the run.
pub struct CompilationContext<'a> {
    pub registry: &'a ScriptRegistry,
    /// Behaviour names in first-seen order.
    pub behaviours: Vec<String>,
    /// Name of the behaviour flagged as default, if any.
    pub default_behaviour: Option<String>,
    /// Global variable declarations found outside any behaviour.
    pub globals: Vec<(String, Value)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CompilationContext<'a> {
    pub fn new(registry: &'a ScriptRegistry) -> Self {
        Self {
            registry,
            behaviours: Vec::new(),
            default_behaviour: None,
            globals: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Record a structural error and return the message that replaces
    /// the failing fragment inline.
    pub fn structural_error(&mut self, block: &str, message: impl Into<String>) -> String {
        let message = message.into();
        tracing::warn!(block, %message, "structural error");
        self.diagnostics.push(Diagnostic::error(block, message.clone()));
        message
    }

    /// Record a validation failure; the offending block compiles to
    /// nothing.
    pub fn validation_warning(&mut self, block: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(block, %message, "validation failure");
        self.diagnostics.push(Diagnostic::warning(block, message));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
