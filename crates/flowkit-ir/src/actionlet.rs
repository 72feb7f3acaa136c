use serde_json::{Map, Value, json};

/// Where a `play_behaviour`/`select_behaviour` actionlet jumps to.
///
/// Targets serialize as strings: `"next"` (the action immediately after
/// the current one), a bare action index relative to the current
/// behaviour (`"2"`), a behaviour name (`"main"`, entry at action 0) or
/// a cross-behaviour position (`"main:3"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    Next,
    Index(usize),
    Behaviour { name: String, index: Option<usize> },
}

impl JumpTarget {
    pub fn render(&self) -> String {
        match self {
            JumpTarget::Next => "next".to_string(),
            JumpTarget::Index(i) => i.to_string(),
            JumpTarget::Behaviour { name, index: None } => name.clone(),
            JumpTarget::Behaviour {
                name,
                index: Some(i),
            } => format!("{name}:{i}"),
        }
    }
}

/// Comparison operator of a `compare` actionlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }

    pub fn from_editor_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "EQ" => CompareOp::Eq,
            "NEQ" => CompareOp::Neq,
            "LT" => CompareOp::Lt,
            "LTE" => CompareOp::Lte,
            "GT" => CompareOp::Gt,
            "GTE" => CompareOp::Gte,
            _ => return None,
        })
    }
}

/// A compare-and-branch actionlet body.
///
/// Operands are always rendered as strings; the runtime resolves a
/// variable name against its knowledge store and falls back to the
/// literal text. Branches are chained actionlet sequences and either
/// key is omitted from the payload when absent. Conditionals stay
/// nested: an `if/elseif` chain is one `Comparison` whose false branch
/// holds the next `Comparison`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub operand1: String,
    pub operand2: String,
    pub operator: CompareOp,
    pub true_action: Option<Vec<Actionlet>>,
    pub false_action: Option<Vec<Actionlet>>,
}

impl Comparison {
    fn to_value(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("operand1".to_string(), json!(self.operand1));
        payload.insert("operand2".to_string(), json!(self.operand2));
        payload.insert(
            "comparison_operator".to_string(),
            json!(self.operator.symbol()),
        );
        if let Some(branch) = &self.true_action {
            payload.insert("true_action".to_string(), chain_value(branch));
        }
        if let Some(branch) = &self.false_action {
            payload.insert("false_action".to_string(), chain_value(branch));
        }
        Value::Object(payload)
    }
}

/// A single primitive operation in the emitted behaviour program.
///
/// Serializes as a two-element `[tag, payload]` array, except
/// `Inline`, which stands in for a fragment that failed structural
/// checks and serializes as the bare error string so the failure is
/// visible at its position in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Actionlet {
    Text(Value),
    HttpResponse {
        status: Value,
        message: Option<Value>,
        payload: Option<Map<String, Value>>,
    },
    Delay(Value),
    Knowledge(Vec<(String, Value)>),
    Calculate { var: String, expr: String },
    Compare(Box<Comparison>),
    PlayBehaviour(JumpTarget),
    SelectBehaviour(JumpTarget),
    Custom {
        script: String,
        args: Vec<(String, Value)>,
    },
    WorkflowInteraction {
        engagement: Option<Vec<Actionlet>>,
        disengagement: Option<Vec<Actionlet>>,
        userdata: Option<Vec<Actionlet>>,
    },
    Comment(String),
    /// A merged group of primitives executed as one atomic unit.
    /// Serializes as a single flat interleaved array.
    Chained(Vec<Actionlet>),
    /// Inline structural error, e.g. an orphaned action block.
    Inline(String),
}

impl Actionlet {
    pub fn tag(&self) -> &'static str {
        match self {
            Actionlet::Text(_) => "text",
            Actionlet::HttpResponse { .. } => "http_response",
            Actionlet::Delay(_) => "delay",
            Actionlet::Knowledge(_) => "knowledge",
            Actionlet::Calculate { .. } => "calculate",
            Actionlet::Compare(_) => "compare",
            Actionlet::PlayBehaviour(_) => "play_behaviour",
            Actionlet::SelectBehaviour(_) => "select_behaviour",
            Actionlet::Custom { .. } => "custom",
            Actionlet::WorkflowInteraction { .. } => "workflow_interaction",
            Actionlet::Comment(_) => "comment",
            Actionlet::Chained(_) | Actionlet::Inline(_) => "",
        }
    }

    fn payload(&self) -> Value {
        match self {
            Actionlet::Text(v) => v.clone(),
            Actionlet::HttpResponse {
                status,
                message,
                payload,
            } => {
                let mut body = Map::new();
                body.insert("status_code".to_string(), status.clone());
                if let Some(fields) = payload {
                    for (k, v) in fields {
                        body.insert(k.clone(), v.clone());
                    }
                } else if let Some(message) = message {
                    body.insert("message".to_string(), message.clone());
                }
                Value::Object(body)
            }
            Actionlet::Delay(v) => v.clone(),
            Actionlet::Knowledge(pairs) => {
                let mut map = Map::new();
                for (k, v) in pairs {
                    map.insert(k.clone(), v.clone());
                }
                Value::Object(map)
            }
            Actionlet::Calculate { var, expr } => json!([var, expr]),
            Actionlet::Compare(cmp) => cmp.to_value(),
            Actionlet::PlayBehaviour(target) | Actionlet::SelectBehaviour(target) => {
                json!(target.render())
            }
            Actionlet::Custom { script, args } => {
                if args.is_empty() {
                    json!(script)
                } else {
                    let mut map = Map::new();
                    for (k, v) in args {
                        map.insert(k.clone(), v.clone());
                    }
                    json!({ "name": script, "args": map })
                }
            }
            Actionlet::WorkflowInteraction {
                engagement,
                disengagement,
                userdata,
            } => {
                let mut map = Map::new();
                if let Some(chain) = engagement {
                    map.insert("engagement".to_string(), chain_value(chain));
                }
                if let Some(chain) = disengagement {
                    map.insert("disengagement".to_string(), chain_value(chain));
                }
                if let Some(chain) = userdata {
                    map.insert("userdata".to_string(), chain_value(chain));
                }
                Value::Object(map)
            }
            Actionlet::Comment(text) => json!(text),
            Actionlet::Chained(group) => chain_value(group),
            Actionlet::Inline(message) => json!(message),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Actionlet::Chained(group) => chain_value(group),
            Actionlet::Inline(message) => json!(message),
            _ => json!([self.tag(), self.payload()]),
        }
    }
}

/// Serialize a chained actionlet sequence: one flat array of
/// interleaved tags and payloads (`[t1, p1, t2, p2]`). Used for compare
/// branches, workflow interaction slots and non-list custom action
/// arguments.
pub fn chain_value(actionlets: &[Actionlet]) -> Value {
    let mut flat = Vec::with_capacity(actionlets.len() * 2);
    for actionlet in actionlets {
        match actionlet {
            Actionlet::Inline(message) => flat.push(json!(message)),
            Actionlet::Chained(group) => {
                if let Value::Array(inner) = chain_value(group) {
                    flat.extend(inner);
                }
            }
            _ => {
                flat.push(json!(actionlet.tag()));
                flat.push(actionlet.payload());
            }
        }
    }
    Value::Array(flat)
}

/// Serialize an actionlet sequence as a list of `[tag, payload]`
/// arrays, keeping group boundaries.
pub fn list_value(actionlets: &[Actionlet]) -> Value {
    Value::Array(actionlets.iter().map(Actionlet::to_value).collect())
}
