use flowkit_common::diagnostics::Diagnostic;
use flowkit_common::errors::FlowError;
use flowkit_ir::program::Program;
use flowkit_registry::registry::ScriptRegistry;
use flowkit_tree::block::{BlockNode, flatten_chain, parse_forest};

use crate::assembler::assemble;
use crate::context::CompilationContext;

/// The result of a successful compilation run.
///
/// A run succeeds whenever the emitted document is well formed; block
/// level failures are carried as diagnostics and inline fragments
/// rather than failing the run (best-effort compilation).
pub struct CompileOutput {
    pub program: Program,
    /// Pretty-printed document text, re-parse checked.
    pub document: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Compile a block forest against a script registry.
///
/// The forest is normalized first, so builder-made trees and raw
/// editor saves with `next` chains both work. The serialized document
/// is parsed back before being returned; a malformed document fails
/// the whole run with [`FlowError::Document`] and nothing is emitted.
pub fn compile(
    roots: Vec<BlockNode>,
    registry: &ScriptRegistry,
) -> Result<CompileOutput, FlowError> {
    let roots = flatten_chain(roots);
    let mut ctx = CompilationContext::new(registry);
    let program = assemble(&mut ctx, &roots);
    tracing::debug!(
        behaviours = program.behaviours.len(),
        diagnostics = ctx.diagnostics().len(),
        "assembled program"
    );

    let document = program.to_json_pretty();
    serde_json::from_str::<serde_json::Value>(&document).map_err(|e| FlowError::Document {
        message: format!("emitted document does not parse: {e}"),
    })?;

    Ok(CompileOutput {
        program,
        document,
        diagnostics: ctx.into_diagnostics(),
    })
}

/// Convenience entry: parse the editor's JSON save text and compile.
pub fn compile_source(
    text: &str,
    registry: &ScriptRegistry,
) -> Result<CompileOutput, FlowError> {
    let roots = parse_forest(text)?;
    compile(roots, registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_source_round_trips() {
        let registry = ScriptRegistry::new();
        let source = r#"[{
            "type": "behaviour_behaviour",
            "fields": { "NAME": "main", "IS_DEFAULT": "TRUE" },
            "statements": {
                "ACTIONS": [{
                    "type": "behaviour_action",
                    "statements": {
                        "ACTIONLETS": [{
                            "type": "text_primitive",
                            "values": {
                                "VALUE": { "type": "text", "fields": { "TEXT": "hi" } }
                            }
                        }]
                    }
                }]
            }
        }]"#;
        let out = compile_source(source, &registry).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out.document).unwrap();
        assert_eq!(parsed["default"], "main");
        assert_eq!(
            parsed["behaviours"][0]["actions"][0],
            serde_json::json!([["text", "hi"]])
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_compile_rejects_malformed_source() {
        let registry = ScriptRegistry::new();
        assert!(compile_source("[{", &registry).is_err());
    }
}
