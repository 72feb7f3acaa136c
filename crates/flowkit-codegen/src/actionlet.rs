use flowkit_ir::actionlet::{Actionlet, JumpTarget, chain_value, list_value};
use flowkit_registry::registry::ArgType;
use flowkit_tree::block::BlockNode;
use serde_json::Value;

use crate::context::CompilationContext;
use crate::control;
use crate::expr::{self, ExprToken, Order};

/// Compile an ordered statement list into a flat actionlet sequence.
///
/// Used for `behaviour_action` bodies, compare branches, workflow
/// interaction slots, custom action arguments and key/action stores. A
/// commented block contributes a `comment` actionlet before its own
/// output.
pub fn compile_chain(ctx: &mut CompilationContext<'_>, blocks: &[BlockNode]) -> Vec<Actionlet> {
    let mut out = Vec::new();
    for block in blocks {
        if let Some(text) = &block.comment {
            out.push(Actionlet::Comment(text.clone()));
        }
        out.extend(compile_statement(ctx, block));
    }
    out
}

/// Compile one primitive statement block into zero or more actionlets.
pub fn compile_statement(ctx: &mut CompilationContext<'_>, block: &BlockNode) -> Vec<Actionlet> {
    match block.kind.as_str() {
        "text_primitive" => {
            let token = expr::value_or(ctx, block, "VALUE", Order::None, ExprToken::empty_string());
            vec![Actionlet::Text(token.to_value())]
        }
        "respond_primitive" => compile_respond(ctx, block),
        "delay_primitive" => {
            let token = expr::value_or(ctx, block, "VALUE", Order::None, ExprToken::number(0));
            vec![Actionlet::Delay(token.to_value())]
        }
        "bot_interaction_primitive" => compile_interaction(ctx, block),
        "custom_primitive" => compile_custom(ctx, block),
        "play_behaviour_primitive" => {
            vec![Actionlet::PlayBehaviour(behaviour_target(block))]
        }
        "select_behaviour_primitive" => {
            vec![Actionlet::SelectBehaviour(behaviour_target(block))]
        }
        "play_next_primitive" => vec![Actionlet::PlayBehaviour(JumpTarget::Next)],
        "variables_set" => compile_assignment(ctx, block),
        "math_change" => compile_change(ctx, block),
        "behaviour_chained_action" => {
            let group = compile_chain(ctx, block.statement_slot("ACTIONLETS"));
            vec![Actionlet::Chained(group)]
        }
        "controls_if" | "controls_ifelse" => match control::lower_if(ctx, block) {
            Some(compare) => vec![compare],
            None => Vec::new(),
        },
        other => {
            let message =
                ctx.structural_error(other, format!("Unknown statement block '{other}'."));
            vec![Actionlet::Inline(message)]
        }
    }
}

/// `respond_primitive`. A connected payload must be a dictionary and
/// takes precedence over the message; with neither connected the block
/// compiles to nothing.
fn compile_respond(ctx: &mut CompilationContext<'_>, block: &BlockNode) -> Vec<Actionlet> {
    let status = expr::value_or(ctx, block, "STATUS", Order::None, ExprToken::number(200));
    let message = expr::compile_value(ctx, block, "MESG", Order::None)
        .map(|(token, _)| token)
        .filter(|token| !token.is_empty_string());
    let payload = expr::compile_value(ctx, block, "PAYLOAD", Order::None)
        .map(|(token, _)| token)
        .filter(|token| !token.is_empty_string());

    let payload = match payload {
        Some(ExprToken::Literal(Value::Object(map))) => Some(map),
        Some(_) => {
            ctx.validation_warning("respond_primitive", "payload is not a dictionary");
            return Vec::new();
        }
        None => None,
    };
    if payload.is_none() && message.is_none() {
        return Vec::new();
    }
    vec![Actionlet::HttpResponse {
        status: status.to_value(),
        message: message.map(|t| t.to_value()),
        payload,
    }]
}

fn compile_interaction(ctx: &mut CompilationContext<'_>, block: &BlockNode) -> Vec<Actionlet> {
    let slot = |ctx: &mut CompilationContext<'_>, name: &str| {
        let blocks = block.statement_slot(name);
        if blocks.is_empty() {
            None
        } else {
            Some(compile_chain(ctx, blocks))
        }
    };
    let engagement = slot(ctx, "ENGAGEMENT");
    let disengagement = slot(ctx, "DISENGAGEMENT");
    let userdata = slot(ctx, "USERDATA");
    if engagement.is_none() && disengagement.is_none() && userdata.is_none() {
        return Vec::new();
    }
    vec![Actionlet::WorkflowInteraction {
        engagement,
        disengagement,
        userdata,
    }]
}

/// `custom_primitive`. The registry descriptor drives the argument
/// slots: `ARG<i>` is a statement slot for `action` arguments and a
/// value slot otherwise. Arguments left at their empty default are
/// omitted; with none remaining the call serializes as the bare script
/// name.
fn compile_custom(ctx: &mut CompilationContext<'_>, block: &BlockNode) -> Vec<Actionlet> {
    let Some(script) = block.field_str("SCRIPTS").map(str::to_string) else {
        ctx.validation_warning("custom_primitive", "no script selected");
        return Vec::new();
    };
    let Some(descriptor) = ctx.registry.get(&script).cloned() else {
        ctx.validation_warning(
            "custom_primitive",
            format!("script '{script}' is not in the registry"),
        );
        return Vec::new();
    };

    let mut args: Vec<(String, Value)> = Vec::new();
    for (i, arg) in descriptor.args.iter().enumerate() {
        let slot = format!("ARG{i}");
        let value = match arg.ty {
            ArgType::Action => {
                let body = block.statement_slot(&slot);
                if body.is_empty() {
                    continue;
                }
                let chain = compile_chain(ctx, body);
                // Arguments named `...actions` hold a list of separate
                // actions; everything else is one merged chain.
                if arg.name.ends_with("actions") {
                    list_value(&chain)
                } else {
                    chain_value(&chain)
                }
            }
            _ => {
                let Some((token, _)) = expr::compile_value(ctx, block, &slot, Order::None) else {
                    continue;
                };
                if token.is_empty_string() {
                    continue;
                }
                token.to_value()
            }
        };
        args.push((arg.name.clone(), value));
    }
    vec![Actionlet::Custom { script, args }]
}

fn behaviour_target(block: &BlockNode) -> JumpTarget {
    let name = block.field_str("BEHAVIOURS").unwrap_or("");
    let index = block.field_i64("ACTION_INDEX").unwrap_or(0).max(0) as usize;
    if name.is_empty() {
        JumpTarget::Index(index)
    } else {
        JumpTarget::Behaviour {
            name: name.to_string(),
            index: Some(index),
        }
    }
}

/// `variables_set`. An arithmetic value compiles to a `calculate`
/// actionlet; anything else stores a literal through `knowledge`.
fn compile_assignment(ctx: &mut CompilationContext<'_>, block: &BlockNode) -> Vec<Actionlet> {
    let var = expr::variable_name(block.field_str("VAR").unwrap_or(""));
    let token = expr::value_or(ctx, block, "VALUE", Order::None, ExprToken::number(0));
    match token {
        ExprToken::Calc(expr) => vec![Actionlet::Calculate { var, expr }],
        other => vec![Actionlet::Knowledge(vec![(var, other.to_value())])],
    }
}

/// `math_change`. The delta must be a literal number; its sign picks
/// the emitted operator.
fn compile_change(ctx: &mut CompilationContext<'_>, block: &BlockNode) -> Vec<Actionlet> {
    let var = expr::variable_name(block.field_str("VAR").unwrap_or(""));
    let token = expr::value_or(ctx, block, "DELTA", Order::Additive, ExprToken::number(0));
    let Some(delta) = token.as_literal_int() else {
        ctx.validation_warning("math_change", "delta must be a literal number");
        return Vec::new();
    };
    let op = if delta >= 0 { "+" } else { "-" };
    vec![Actionlet::Calculate {
        var: var.clone(),
        expr: format!("{var} {op} {}", delta.abs()),
    }]
}
