use flowkit_ir::actionlet::{Actionlet, JumpTarget};
use flowkit_ir::program::{Action, Behaviour, Program};
use flowkit_tree::block::BlockNode;

use crate::actionlet::compile_chain;
use crate::context::CompilationContext;
use crate::control;
use crate::expr::{self, ExprToken, Order};

const INIT_BEHAVIOUR: &str = "__init__";

/// Compile an ordered action-level block list into actions. `base_idx`
/// is the position of the first emitted action within the enclosing
/// behaviour, so loops nested at any depth compute absolute jump
/// targets.
pub fn compile_actions(
    ctx: &mut CompilationContext<'_>,
    blocks: &[BlockNode],
    base_idx: usize,
    in_loop: bool,
) -> Vec<Action> {
    let mut actions: Vec<Action> = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        let has_following = i + 1 < blocks.len();
        match block.kind.as_str() {
            "behaviour_action" => {
                // A commented action contributes a separate comment
                // action before its own, so indices shift by one.
                if let Some(text) = &block.comment {
                    actions.push(Action(vec![
                        Actionlet::Comment(text.clone()),
                        Actionlet::PlayBehaviour(JumpTarget::Next),
                    ]));
                }
                let mut group = compile_chain(ctx, block.statement_slot("ACTIONLETS"));
                if block.field_bool("PLAY_NEXT") && (has_following || in_loop) {
                    group.push(Actionlet::PlayBehaviour(JumpTarget::Next));
                }
                actions.push(Action(group));
            }
            "controls_if" | "controls_ifelse" => {
                if let Some(compare) = control::lower_if(ctx, block) {
                    actions.push(Action(vec![compare]));
                }
            }
            kind if control::is_loop(kind) => {
                let from_idx = base_idx + actions.len();
                actions.extend(control::lower_loop(ctx, block, from_idx, has_following));
            }
            other => {
                let message =
                    ctx.structural_error(other, "Invalid, parent must be behaviour block.");
                actions.push(Action(vec![Actionlet::Inline(message)]));
            }
        }
    }
    actions
}

/// Walk root blocks in source order and assemble the final program.
///
/// Behaviour roots become named action lists; root-level variable
/// assignments become global declarations folded into a synthesized
/// `__init__` behaviour; loose primitive roots are kept as a bare
/// action list for the degenerate no-behaviour document.
pub fn assemble(ctx: &mut CompilationContext<'_>, roots: &[BlockNode]) -> Program {
    let mut behaviours: Vec<Behaviour> = Vec::new();
    let mut loose_actions: Vec<Action> = Vec::new();

    for root in roots {
        match root.kind.as_str() {
            "behaviour_behaviour" => {
                let name = root
                    .field_str("NAME")
                    .filter(|n| !n.is_empty())
                    .unwrap_or("default_behaviour")
                    .to_string();
                if root.field_bool("IS_DEFAULT") {
                    ctx.default_behaviour = Some(name.clone());
                }
                // Uniqueness is an editor contract; a collision still
                // compiles but jump targets become ambiguous.
                if ctx.behaviours.contains(&name) {
                    ctx.validation_warning(
                        "behaviour_behaviour",
                        format!("duplicate behaviour name '{name}'"),
                    );
                }
                ctx.behaviours.push(name.clone());
                tracing::debug!(behaviour = %name, "compiling behaviour");
                let actions = compile_actions(ctx, root.statement_slot("ACTIONS"), 0, false);
                behaviours.push(Behaviour { name, actions });
            }
            "variables_set" => {
                let var = expr::variable_name(root.field_str("VAR").unwrap_or(""));
                let token =
                    expr::value_or(ctx, root, "VALUE", Order::None, ExprToken::number(0));
                match token {
                    ExprToken::Calc(_) => {
                        ctx.validation_warning(
                            "variables_set",
                            "a global declaration needs a literal value",
                        );
                    }
                    other => ctx.globals.push((var, other.to_value())),
                }
            }
            "behaviour_action" => {
                let message = ctx.structural_error("behaviour_action", "Orphan action block");
                loose_actions.push(Action(vec![Actionlet::Inline(message)]));
            }
            kind if control::is_loop(kind) => {
                let message = ctx.structural_error(
                    kind,
                    "control block must sit inside a behaviour",
                );
                loose_actions.push(Action(vec![Actionlet::Inline(message)]));
            }
            _ => {
                // Degenerate compatibility mode: loose primitives at
                // the root compile to a bare action list.
                let group = compile_chain(ctx, std::slice::from_ref(root));
                if !group.is_empty() {
                    loose_actions.push(Action(group));
                }
            }
        }
    }

    synthesize_init(ctx, &mut behaviours);
    Program {
        default: ctx.default_behaviour.clone(),
        behaviours,
        loose_actions,
    }
}

/// When globals were declared and at least one behaviour exists,
/// prepend an `__init__` behaviour that seeds them and hands off to
/// the declared default; `__init__` becomes the effective default.
fn synthesize_init(ctx: &mut CompilationContext<'_>, behaviours: &mut Vec<Behaviour>) {
    if ctx.globals.is_empty() || behaviours.is_empty() {
        return;
    }
    let mut group = vec![Actionlet::Knowledge(std::mem::take(&mut ctx.globals))];
    if let Some(default) = &ctx.default_behaviour {
        group.push(Actionlet::PlayBehaviour(JumpTarget::Behaviour {
            name: default.clone(),
            index: None,
        }));
    }
    behaviours.insert(
        0,
        Behaviour {
            name: INIT_BEHAVIOUR.to_string(),
            actions: vec![Action(group)],
        },
    );
    ctx.default_behaviour = Some(INIT_BEHAVIOUR.to_string());
}
