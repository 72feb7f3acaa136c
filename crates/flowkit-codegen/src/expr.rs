use flowkit_ir::actionlet::{CompareOp, Comparison, chain_value};
use flowkit_tree::block::BlockNode;
use serde_json::{Map, Value, json};

use crate::actionlet::compile_chain;
use crate::context::CompilationContext;

/// Operator precedence level of a compiled expression production.
///
/// Precedence only decides defaulting for absent operands; the target
/// format has no parenthesization step, so nested arithmetic at mixed
/// precedences is accepted without grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Order {
    Atomic,
    Collection,
    FunctionCall,
    UnarySign,
    Exponentiation,
    Multiplicative,
    Additive,
    Relational,
    None,
}

/// A compiled value-slot expression.
///
/// `Calc` is a compiler-internal signal carrying raw infix arithmetic
/// text; it tells the consuming statement compiler to emit an
/// arithmetic-assignment actionlet and must never reach the emitted
/// document unresolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprToken {
    Literal(Value),
    VarRef(String),
    Calc(String),
}

impl ExprToken {
    pub fn empty_string() -> Self {
        ExprToken::Literal(json!(""))
    }

    pub fn number(n: i64) -> Self {
        ExprToken::Literal(json!(n))
    }

    pub fn is_empty_string(&self) -> bool {
        matches!(self, ExprToken::Literal(Value::String(s)) if s.is_empty())
    }

    /// Render as raw infix/operand text: no quoting, variables by name.
    pub fn render(&self) -> String {
        match self {
            ExprToken::Literal(Value::String(s)) => s.clone(),
            ExprToken::Literal(v) => v.to_string(),
            ExprToken::VarRef(name) => name.clone(),
            ExprToken::Calc(expr) => expr.clone(),
        }
    }

    /// The document value for this token. Callers that can legally
    /// receive a `Calc` must consume it before getting here.
    pub fn to_value(&self) -> Value {
        match self {
            ExprToken::Literal(v) => v.clone(),
            // Variable references are always serialized as quoted name
            // tokens; the runtime resolves them against its knowledge.
            ExprToken::VarRef(name) => json!(name),
            ExprToken::Calc(expr) => json!(expr),
        }
    }

    /// Literal integer, when the token is a plain numeric literal.
    pub fn as_literal_int(&self) -> Option<i64> {
        match self {
            ExprToken::Literal(Value::Number(n)) => n.as_i64(),
            _ => None,
        }
    }
}

/// A compiled `logic_compare` condition, before branch attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub operand1: String,
    pub operand2: String,
    pub operator: CompareOp,
}

impl Condition {
    pub fn into_comparison(
        self,
        true_action: Option<Vec<flowkit_ir::actionlet::Actionlet>>,
        false_action: Option<Vec<flowkit_ir::actionlet::Actionlet>>,
    ) -> Comparison {
        Comparison {
            operand1: self.operand1,
            operand2: self.operand2,
            operator: self.operator,
            true_action,
            false_action,
        }
    }
}

/// Uppercased variable name, the form every emission site uses.
pub fn variable_name(raw: &str) -> String {
    raw.to_uppercase()
}

/// Compile the expression connected to a value slot, or `None` when
/// the slot is unconnected or fails to compile.
pub fn compile_value(
    ctx: &mut CompilationContext<'_>,
    parent: &BlockNode,
    slot: &str,
    order: Order,
) -> Option<(ExprToken, Order)> {
    let child = parent.value_slot(slot)?;
    compile_expr(ctx, child, order)
}

/// Compile a value slot, substituting the caller's documented default
/// when the slot is empty.
pub fn value_or(
    ctx: &mut CompilationContext<'_>,
    parent: &BlockNode,
    slot: &str,
    order: Order,
    default: ExprToken,
) -> ExprToken {
    compile_value(ctx, parent, slot, order)
        .map(|(token, _)| token)
        .unwrap_or(default)
}

fn compile_expr(
    ctx: &mut CompilationContext<'_>,
    block: &BlockNode,
    _order: Order,
) -> Option<(ExprToken, Order)> {
    match block.kind.as_str() {
        "math_number" => compile_number(ctx, block),
        "text" => {
            let text = block.field_str("TEXT").unwrap_or("");
            Some((ExprToken::Literal(json!(text)), Order::Atomic))
        }
        "logic_boolean" => {
            let value = block.field_bool("BOOL");
            Some((ExprToken::Literal(json!(value)), Order::Atomic))
        }
        "variables_get" => {
            let name = variable_name(block.field_str("VAR").unwrap_or(""));
            Some((ExprToken::VarRef(name), Order::Atomic))
        }
        "math_arithmetic" => compile_arithmetic(ctx, block),
        "text_join" => Some(compile_join(ctx, block)),
        "dictionary_create_empty" => {
            Some((ExprToken::Literal(json!({})), Order::Atomic))
        }
        "dictionary_create_with" => Some(compile_dictionary(ctx, block)),
        other => {
            ctx.validation_warning(other, "unsupported expression block");
            None
        }
    }
}

fn compile_number(
    ctx: &mut CompilationContext<'_>,
    block: &BlockNode,
) -> Option<(ExprToken, Order)> {
    let raw = block.field_value("NUM");
    let number = match raw {
        Some(Value::Number(n)) => Some(n.clone()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .ok()
            .map(serde_json::Number::from)
            .or_else(|| s.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64)),
        _ => None,
    };
    match number {
        Some(n) => {
            let order = if n.as_f64().unwrap_or(0.0) < 0.0 {
                Order::UnarySign
            } else {
                Order::Atomic
            };
            Some((ExprToken::Literal(Value::Number(n)), order))
        }
        None => {
            ctx.validation_warning("math_number", "NUM field is not a number");
            None
        }
    }
}

fn compile_arithmetic(
    ctx: &mut CompilationContext<'_>,
    block: &BlockNode,
) -> Option<(ExprToken, Order)> {
    let (symbol, order) = match block.field_str("OP") {
        Some("ADD") => ("+", Order::Additive),
        Some("MINUS") => ("-", Order::Additive),
        Some("MULTIPLY") => ("*", Order::Multiplicative),
        Some("DIVIDE") => ("/", Order::Multiplicative),
        Some("POWER") => ("**", Order::Exponentiation),
        other => {
            ctx.validation_warning(
                "math_arithmetic",
                format!("unknown operator {other:?}"),
            );
            return None;
        }
    };
    let lhs = value_or(ctx, block, "A", order, ExprToken::number(0));
    let rhs = value_or(ctx, block, "B", order, ExprToken::number(0));
    let expr = format!("{} {} {}", lhs.render(), symbol, rhs.render());
    Some((ExprToken::Calc(expr), order))
}

/// String concatenation. Variable elements become `{}` placeholders in
/// a format template with an ordered variable-name list alongside;
/// everything else is spliced in as literal text. An all-uppercase text
/// literal counts as a variable too, so names typed into a text block
/// still substitute.
fn compile_join(ctx: &mut CompilationContext<'_>, block: &BlockNode) -> (ExprToken, Order) {
    let count = item_slot_count(block);
    if count == 0 {
        return (ExprToken::empty_string(), Order::Atomic);
    }
    let mut template = String::new();
    let mut variables: Vec<String> = Vec::new();
    for i in 0..count {
        let slot = format!("ADD{i}");
        let element = value_or(ctx, block, &slot, Order::None, ExprToken::empty_string());
        match element {
            ExprToken::VarRef(name) => {
                template.push_str("{}");
                variables.push(name);
            }
            ExprToken::Literal(Value::String(s)) if is_variable_token(&s) => {
                template.push_str("{}");
                variables.push(s);
            }
            other => template.push_str(&other.render()),
        }
    }
    if variables.is_empty() {
        (ExprToken::Literal(json!(template)), Order::FunctionCall)
    } else {
        (
            ExprToken::Literal(json!([template, variables])),
            Order::FunctionCall,
        )
    }
}

/// A join element written as an all-uppercase alphabetic token refers
/// to a variable. Requiring a letter keeps numbers and punctuation as
/// plain text.
fn is_variable_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars().any(|c| c.is_ascii_alphabetic())
        && s == s.to_uppercase()
}

fn compile_dictionary(
    ctx: &mut CompilationContext<'_>,
    block: &BlockNode,
) -> (ExprToken, Order) {
    let mut entries = Map::new();
    for i in 0..item_slot_count(block) {
        let slot = format!("ADD{i}");
        let Some(item) = block.value_slot(&slot) else {
            continue;
        };
        match item.kind.as_str() {
            "key_value_store" => {
                let (key, value) = compile_key_value(ctx, item);
                entries.insert(key, value);
            }
            "key_action_store" => {
                let key = entry_key(ctx, item);
                let chain = compile_chain(ctx, item.statement_slot("ACTION"));
                entries.insert(key, chain_value(&chain));
            }
            other => {
                ctx.validation_warning(
                    other,
                    "dictionary items must be key/value or key/action stores",
                );
            }
        }
    }
    (ExprToken::Literal(Value::Object(entries)), Order::Collection)
}

fn entry_key(ctx: &mut CompilationContext<'_>, item: &BlockNode) -> String {
    value_or(ctx, item, "KEY", Order::None, ExprToken::empty_string()).render()
}

fn compile_key_value(ctx: &mut CompilationContext<'_>, item: &BlockNode) -> (String, Value) {
    let key = entry_key(ctx, item);
    let token = value_or(ctx, item, "VALUE", Order::None, ExprToken::empty_string());
    // Scalar values are stringified; dictionaries, lists and strings
    // pass through unchanged.
    let value = match token {
        ExprToken::Literal(v @ (Value::String(_) | Value::Object(_) | Value::Array(_))) => v,
        other => json!(other.render()),
    };
    (key, value)
}

/// Compile the condition block connected to a value slot into the
/// operand/operator triple of a `compare` actionlet. Operands are
/// always rendered as strings; absent operands default to `"0"`.
pub fn compile_condition(
    ctx: &mut CompilationContext<'_>,
    parent: &BlockNode,
    slot: &str,
) -> Option<Condition> {
    let child = parent.value_slot(slot)?;
    if child.kind != "logic_compare" {
        ctx.validation_warning(&child.kind, "expected a comparison block");
        return None;
    }
    let operator = match child
        .field_str("OP")
        .and_then(CompareOp::from_editor_tag)
    {
        Some(op) => op,
        None => {
            ctx.validation_warning("logic_compare", "unknown comparison operator");
            return None;
        }
    };
    let operand1 = value_or(ctx, child, "A", Order::Relational, ExprToken::number(0)).render();
    let operand2 = value_or(ctx, child, "B", Order::Relational, ExprToken::number(0)).render();
    Some(Condition {
        operand1,
        operand2,
        operator,
    })
}

/// Highest `ADD<i>` slot index plus one, scanning the connected slots.
fn item_slot_count(block: &BlockNode) -> usize {
    block
        .values
        .keys()
        .filter_map(|k| k.strip_prefix("ADD"))
        .filter_map(|i| i.parse::<usize>().ok())
        .map(|i| i + 1)
        .max()
        .unwrap_or(0)
}
