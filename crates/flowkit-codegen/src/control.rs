use flowkit_ir::actionlet::{Actionlet, CompareOp, Comparison, JumpTarget};
use flowkit_ir::program::Action;
use flowkit_tree::block::BlockNode;
use serde_json::json;

use crate::actionlet::compile_chain;
use crate::assembler::compile_actions;
use crate::context::CompilationContext;
use crate::expr::{self, Order};

const COUNTER_VAR: &str = "__COUNT__";

/// Lower an `if [elseif]* [else]` block to one nested `compare`
/// actionlet: each condition wraps the next as its false branch, the
/// final false branch being the `else` body when present.
pub fn lower_if(ctx: &mut CompilationContext<'_>, block: &BlockNode) -> Option<Actionlet> {
    let mut arms: Vec<(expr::Condition, Vec<Actionlet>)> = Vec::new();
    let mut n = 0;
    loop {
        let slot = format!("IF{n}");
        if block.value_slot(&slot).is_none() {
            break;
        }
        let Some(condition) = expr::compile_condition(ctx, block, &slot) else {
            n += 1;
            continue;
        };
        let body = compile_chain(ctx, block.statement_slot(&format!("DO{n}")));
        arms.push((condition, body));
        n += 1;
    }
    if arms.is_empty() {
        ctx.validation_warning(&block.kind, "conditional has no usable condition");
        return None;
    }

    let mut false_branch = block
        .statements
        .contains_key("ELSE")
        .then(|| compile_chain(ctx, block.statement_slot("ELSE")));
    for (condition, body) in arms.into_iter().rev() {
        let compare = Actionlet::Compare(Box::new(
            condition.into_comparison(Some(body), false_branch.take()),
        ));
        false_branch = Some(vec![compare]);
    }
    false_branch.map(|mut chain| chain.remove(0))
}

/// Lower a loop block to a flat action sequence inserted at `from_idx`
/// in the enclosing behaviour. `has_following` is whether another
/// action-level block follows the loop.
pub fn lower_loop(
    ctx: &mut CompilationContext<'_>,
    block: &BlockNode,
    from_idx: usize,
    has_following: bool,
) -> Vec<Action> {
    match block.kind.as_str() {
        "controls_repeat" | "controls_repeat_ext" => {
            lower_repeat(ctx, block, from_idx, has_following)
        }
        "controls_for" => lower_for(ctx, block, from_idx, has_following),
        "controls_whileUntil" => lower_while_until(ctx, block, from_idx, has_following),
        _ => Vec::new(),
    }
}

pub fn is_loop(kind: &str) -> bool {
    matches!(
        kind,
        "controls_repeat" | "controls_repeat_ext" | "controls_for" | "controls_whileUntil"
    )
}

/// Whether execution falls through past the loop when it finishes:
/// the body's last block asked to continue and something follows the
/// loop.
fn continue_after(block: &BlockNode, has_following: bool) -> bool {
    has_following
        && block
            .statement_slot("DO")
            .last()
            .is_some_and(|last| last.field_bool("PLAY_NEXT"))
}

/// `repeat N`: a seed action sets a hidden counter to 1, the body
/// follows, and a trailing compare increments the counter and jumps
/// back to the first body action while it is below N.
fn lower_repeat(
    ctx: &mut CompilationContext<'_>,
    block: &BlockNode,
    from_idx: usize,
    has_following: bool,
) -> Vec<Action> {
    let times = match repeat_count(ctx, block) {
        Some(n) => n,
        None => {
            ctx.validation_warning(&block.kind, "repeat count must be a literal number");
            return Vec::new();
        }
    };
    let continues = continue_after(block, has_following);
    let body = compile_actions(ctx, block.statement_slot("DO"), from_idx + 1, true);

    let seed = Action(vec![
        Actionlet::Knowledge(vec![(COUNTER_VAR.to_string(), json!(1))]),
        Actionlet::PlayBehaviour(JumpTarget::Next),
    ]);
    let test = Comparison {
        operand1: COUNTER_VAR.to_string(),
        operand2: times.to_string(),
        operator: CompareOp::Lt,
        true_action: Some(vec![
            Actionlet::Calculate {
                var: COUNTER_VAR.to_string(),
                expr: format!("{COUNTER_VAR} + 1"),
            },
            Actionlet::PlayBehaviour(JumpTarget::Index(from_idx + 1)),
        ]),
        false_action: continues.then(|| vec![Actionlet::PlayBehaviour(JumpTarget::Next)]),
    };

    let mut out = vec![seed];
    out.extend(body);
    out.push(Action(vec![Actionlet::Compare(Box::new(test))]));
    out
}

/// The repeat count comes from an inline `TIMES` field or a connected
/// `TIMES` value slot; either way it must resolve to a literal number.
fn repeat_count(ctx: &mut CompilationContext<'_>, block: &BlockNode) -> Option<i64> {
    if let Some(n) = block.field_i64("TIMES") {
        return Some(n);
    }
    expr::compile_value(ctx, block, "TIMES", Order::None)
        .and_then(|(token, _)| token.as_literal_int())
}

/// `for var = from to by step`: seeds the variable, runs the body,
/// then a trailing action increments by `step` and loops back while
/// `var <= to`. Bounds must be literal and span at least one step.
fn lower_for(
    ctx: &mut CompilationContext<'_>,
    block: &BlockNode,
    from_idx: usize,
    has_following: bool,
) -> Vec<Action> {
    let var = expr::variable_name(block.field_str("VAR").unwrap_or(""));
    let bound = |ctx: &mut CompilationContext<'_>, slot: &str, default: i64| {
        match block.value_slot(slot) {
            None => Some(default),
            Some(_) => expr::compile_value(ctx, block, slot, Order::None)
                .and_then(|(token, _)| token.as_literal_int()),
        }
    };
    let (from, to, step) = match (
        bound(ctx, "FROM", 0),
        bound(ctx, "TO", 0),
        bound(ctx, "BY", 1),
    ) {
        (Some(f), Some(t), Some(s)) => (f, t, s),
        _ => {
            ctx.validation_warning(&block.kind, "loop bounds must be literal numbers");
            return Vec::new();
        }
    };
    if to - from < step {
        ctx.validation_warning(
            &block.kind,
            format!("bounds {from}..{to} never span a step of {step}"),
        );
        return Vec::new();
    }
    let continues = continue_after(block, has_following);
    let body = compile_actions(ctx, block.statement_slot("DO"), from_idx + 1, true);

    let seed = Action(vec![
        Actionlet::Knowledge(vec![(var.clone(), json!(from))]),
        Actionlet::PlayBehaviour(JumpTarget::Next),
    ]);
    let test = Comparison {
        operand1: var.clone(),
        operand2: to.to_string(),
        operator: CompareOp::Lte,
        true_action: Some(vec![Actionlet::PlayBehaviour(JumpTarget::Index(from_idx + 1))]),
        false_action: continues.then(|| vec![Actionlet::PlayBehaviour(JumpTarget::Next)]),
    };

    let mut out = vec![seed];
    out.extend(body);
    out.push(Action(vec![
        Actionlet::Calculate {
            var: var.clone(),
            expr: format!("{var} + {step}"),
        },
        Actionlet::Compare(Box::new(test)),
    ]));
    out
}

/// `while` (pre-test) and `until` (post-test) share a condition but
/// lower differently. `until` runs the body then re-tests, jumping
/// back to `from_idx` while the condition is false. `while` leads with
/// a test whose exit jump skips one past the trailing re-test; the
/// exit index uses the emitted body action count, so bodies whose
/// blocks lower to several actions stay addressed correctly.
fn lower_while_until(
    ctx: &mut CompilationContext<'_>,
    block: &BlockNode,
    from_idx: usize,
    has_following: bool,
) -> Vec<Action> {
    let Some(condition) = expr::compile_condition(ctx, block, "BOOL") else {
        ctx.validation_warning(&block.kind, "loop has no usable condition");
        return Vec::new();
    };
    let until = block.field_str("MODE") == Some("UNTIL");
    let continues = continue_after(block, has_following);
    // Post-test bodies start at the loop's own index, pre-test bodies
    // one after the leading test.
    let body_base = if until { from_idx } else { from_idx + 1 };
    let body = compile_actions(ctx, block.statement_slot("DO"), body_base, true);
    let jump = |target: JumpTarget| vec![Actionlet::PlayBehaviour(target)];

    if until {
        let test = condition.into_comparison(
            continues.then(|| jump(JumpTarget::Next)),
            Some(jump(JumpTarget::Index(from_idx))),
        );
        let mut out = body;
        out.push(Action(vec![Actionlet::Compare(Box::new(test))]));
        return out;
    }

    let exit_idx = from_idx + body.len() + 2;
    let pre_test = condition.clone().into_comparison(
        Some(jump(JumpTarget::Next)),
        continues.then(|| jump(JumpTarget::Index(exit_idx))),
    );
    let re_test = condition.into_comparison(
        Some(jump(JumpTarget::Index(from_idx + 1))),
        continues.then(|| jump(JumpTarget::Next)),
    );
    let mut out = vec![Action(vec![Actionlet::Compare(Box::new(pre_test))])];
    out.extend(body);
    out.push(Action(vec![Actionlet::Compare(Box::new(re_test))]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowkit_registry::registry::ScriptRegistry;

    fn num(n: i64) -> BlockNode {
        BlockNode::new("math_number").field("NUM", n)
    }

    fn say(s: &str) -> BlockNode {
        BlockNode::new("text_primitive")
            .value("VALUE", BlockNode::new("text").field("TEXT", s))
    }

    fn action(blocks: Vec<BlockNode>) -> BlockNode {
        BlockNode::new("behaviour_action").statement("ACTIONLETS", blocks)
    }

    fn compare(actionlet: &Actionlet) -> &Comparison {
        match actionlet {
            Actionlet::Compare(c) => c,
            other => panic!("expected a compare actionlet, got {other:?}"),
        }
    }

    #[test]
    fn test_if_elseif_else_nests_by_condition_count() {
        let registry = ScriptRegistry::new();
        let mut ctx = CompilationContext::new(&registry);
        let cond = |n: i64| {
            BlockNode::new("logic_compare")
                .field("OP", "EQ")
                .value("A", BlockNode::new("variables_get").field("VAR", "x"))
                .value("B", num(n))
        };
        let block = BlockNode::new("controls_if")
            .value("IF0", cond(1))
            .statement("DO0", vec![say("one")])
            .value("IF1", cond(2))
            .statement("DO1", vec![say("two")])
            .statement("ELSE", vec![say("other")]);

        let out = lower_if(&mut ctx, &block).unwrap();
        let outer = compare(&out);
        assert_eq!(outer.operand2, "1");
        assert_eq!(
            outer.true_action.as_deref(),
            Some(&[Actionlet::Text(json!("one"))][..])
        );
        let inner = compare(&outer.false_action.as_ref().unwrap()[0]);
        assert_eq!(inner.operand2, "2");
        assert_eq!(
            inner.false_action.as_deref(),
            Some(&[Actionlet::Text(json!("other"))][..])
        );
    }

    #[test]
    fn test_if_without_else_has_no_false_branch() {
        let registry = ScriptRegistry::new();
        let mut ctx = CompilationContext::new(&registry);
        let cond = BlockNode::new("logic_compare")
            .field("OP", "GT")
            .value("A", BlockNode::new("variables_get").field("VAR", "x"))
            .value("B", num(0));
        let block = BlockNode::new("controls_if")
            .value("IF0", cond)
            .statement("DO0", vec![say("pos")]);
        let out = lower_if(&mut ctx, &block).unwrap();
        assert!(compare(&out).false_action.is_none());
    }

    #[test]
    fn test_repeat_shape_and_loop_back_target() {
        let registry = ScriptRegistry::new();
        let mut ctx = CompilationContext::new(&registry);
        let block = BlockNode::new("controls_repeat_ext")
            .field("TIMES", 3)
            .statement("DO", vec![action(vec![say("tick")])]);
        let out = lower_loop(&mut ctx, &block, 0, false);
        assert_eq!(out.len(), 3);

        // Seed action: counter starts at 1, then advance.
        assert_eq!(
            out[0].0[0],
            Actionlet::Knowledge(vec![("__COUNT__".to_string(), json!(1))])
        );
        assert_eq!(out[0].0[1], Actionlet::PlayBehaviour(JumpTarget::Next));

        // Trailing compare loops back to the seed's successor.
        let test = compare(&out[2].0[0]);
        assert_eq!(test.operand1, "__COUNT__");
        assert_eq!(test.operand2, "3");
        assert_eq!(test.operator, CompareOp::Lt);
        let back = test.true_action.as_ref().unwrap();
        assert_eq!(back[1], Actionlet::PlayBehaviour(JumpTarget::Index(1)));
        assert!(test.false_action.is_none());
    }

    #[test]
    fn test_repeat_rejects_dynamic_count() {
        let registry = ScriptRegistry::new();
        let mut ctx = CompilationContext::new(&registry);
        let block = BlockNode::new("controls_repeat_ext")
            .value(
                "TIMES",
                BlockNode::new("variables_get").field("VAR", "n"),
            )
            .statement("DO", vec![action(vec![say("tick")])]);
        assert!(lower_loop(&mut ctx, &block, 0, false).is_empty());
        assert!(!ctx.diagnostics().is_empty());
    }

    #[test]
    fn test_for_rejects_bounds_below_step() {
        let registry = ScriptRegistry::new();
        let mut ctx = CompilationContext::new(&registry);
        let block = BlockNode::new("controls_for")
            .field("VAR", "x")
            .value("FROM", num(0))
            .value("TO", num(1))
            .value("BY", num(5))
            .statement("DO", vec![action(vec![say("tick")])]);
        assert!(lower_loop(&mut ctx, &block, 0, false).is_empty());
    }

    #[test]
    fn test_for_increments_and_tests_in_one_action() {
        let registry = ScriptRegistry::new();
        let mut ctx = CompilationContext::new(&registry);
        let block = BlockNode::new("controls_for")
            .field("VAR", "x")
            .value("FROM", num(0))
            .value("TO", num(10))
            .value("BY", num(2))
            .statement("DO", vec![action(vec![say("tick")])]);
        let out = lower_loop(&mut ctx, &block, 2, false);
        assert_eq!(out.len(), 3);

        let last = &out[2].0;
        assert_eq!(
            last[0],
            Actionlet::Calculate {
                var: "X".to_string(),
                expr: "X + 2".to_string(),
            }
        );
        let test = compare(&last[1]);
        assert_eq!(test.operator, CompareOp::Lte);
        assert_eq!(test.operand2, "10");
        assert_eq!(
            test.true_action.as_deref(),
            Some(&[Actionlet::PlayBehaviour(JumpTarget::Index(3))][..])
        );
    }

    #[test]
    fn test_until_retests_after_body() {
        let registry = ScriptRegistry::new();
        let mut ctx = CompilationContext::new(&registry);
        let cond = BlockNode::new("logic_compare")
            .field("OP", "EQ")
            .value("A", BlockNode::new("variables_get").field("VAR", "done"))
            .value("B", BlockNode::new("logic_boolean").field("BOOL", "TRUE"));
        let block = BlockNode::new("controls_whileUntil")
            .field("MODE", "UNTIL")
            .value("BOOL", cond)
            .statement("DO", vec![action(vec![say("work")])]);
        let out = lower_loop(&mut ctx, &block, 1, false);
        assert_eq!(out.len(), 2);
        let test = compare(&out[1].0[0]);
        assert_eq!(
            test.false_action.as_deref(),
            Some(&[Actionlet::PlayBehaviour(JumpTarget::Index(1))][..])
        );
        assert!(test.true_action.is_none());
    }

    #[test]
    fn test_while_exit_index_counts_emitted_actions() {
        let registry = ScriptRegistry::new();
        let mut ctx = CompilationContext::new(&registry);
        let cond = BlockNode::new("logic_compare")
            .field("OP", "LT")
            .value("A", BlockNode::new("variables_get").field("VAR", "i"))
            .value("B", num(5));
        // One body block that lowers to three actions: a nested repeat.
        let nested = BlockNode::new("controls_repeat_ext")
            .field("TIMES", 2)
            .statement("DO", vec![action(vec![say("inner")])]);
        let mut play_next = action(vec![say("last")]);
        play_next.fields.insert("PLAY_NEXT".to_string(), json!("TRUE"));
        let block = BlockNode::new("controls_whileUntil")
            .field("MODE", "WHILE")
            .value("BOOL", cond)
            .statement("DO", vec![nested, play_next]);

        let out = lower_loop(&mut ctx, &block, 0, true);
        // pre-test + 4 body actions (3 repeat + 1 action) + re-test
        assert_eq!(out.len(), 6);

        let pre = compare(&out[0].0[0]);
        assert_eq!(
            pre.true_action.as_deref(),
            Some(&[Actionlet::PlayBehaviour(JumpTarget::Next)][..])
        );
        // Exit lands one past the trailing re-test.
        assert_eq!(
            pre.false_action.as_deref(),
            Some(&[Actionlet::PlayBehaviour(JumpTarget::Index(6))][..])
        );

        // The nested repeat's loop-back is absolute within the
        // enclosing behaviour: its seed sits at index 1, body at 2.
        let inner = compare(&out[3].0[0]);
        let back = inner.true_action.as_ref().unwrap();
        assert_eq!(back[1], Actionlet::PlayBehaviour(JumpTarget::Index(2)));

        let re = compare(&out[5].0[0]);
        assert_eq!(
            re.true_action.as_deref(),
            Some(&[Actionlet::PlayBehaviour(JumpTarget::Index(1))][..])
        );
        assert_eq!(
            re.false_action.as_deref(),
            Some(&[Actionlet::PlayBehaviour(JumpTarget::Next)][..])
        );
    }
}
