use std::collections::BTreeMap;

use flowkit_common::errors::FlowError;
use serde_json::Value;

/// One node in the block forest produced by the visual editor.
///
/// A node has a type tag, named scalar fields, named single-child value
/// slots (expression subtrees) and named multi-child statement slots
/// (ordered lists of statement blocks). The editor's save format links
/// statement siblings through a `next` pointer; [`BlockNode::normalize`]
/// flattens those chains into the owning statement list so all index
/// arithmetic downstream is plain array arithmetic.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct BlockNode {
    /// Block type tag, e.g. `"behaviour_action"` or `"text_primitive"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Named field values (dropdowns, checkboxes, text inputs).
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Named value slots, each holding at most one expression subtree.
    #[serde(default)]
    pub values: BTreeMap<String, BlockNode>,
    /// Named statement slots, each an ordered list of statement blocks.
    #[serde(default)]
    pub statements: BTreeMap<String, Vec<BlockNode>>,
    /// Next sibling in a statement chain (editor save format only).
    #[serde(default)]
    pub next: Option<Box<BlockNode>>,
    /// Optional comment the user attached to the block.
    #[serde(default)]
    pub comment: Option<String>,
}

impl BlockNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
            values: BTreeMap::new(),
            statements: BTreeMap::new(),
            next: None,
            comment: None,
        }
    }

    // =====================================================================
    // Builder API (used heavily by tests)
    // =====================================================================

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn value(mut self, slot: &str, child: BlockNode) -> Self {
        self.values.insert(slot.to_string(), child);
        self
    }

    pub fn statement(mut self, slot: &str, children: Vec<BlockNode>) -> Self {
        self.statements.insert(slot.to_string(), children);
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.comment = Some(text.to_string());
        self
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    /// Raw field value, if present.
    pub fn field_value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Checkbox fields may arrive as a bool or as the editor's
    /// `"TRUE"`/`"FALSE"` strings.
    pub fn field_bool(&self, name: &str) -> bool {
        match self.fields.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn field_i64(&self, name: &str) -> Option<i64> {
        match self.fields.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The expression subtree connected to a value slot, if any.
    pub fn value_slot(&self, slot: &str) -> Option<&BlockNode> {
        self.values.get(slot)
    }

    /// The ordered statement list for a slot (empty when unconnected).
    pub fn statement_slot(&self, slot: &str) -> &[BlockNode] {
        self.statements.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    // =====================================================================
    // Normalization
    // =====================================================================

    /// Flatten `next` sibling chains into their owning statement lists,
    /// recursively. After normalization no node carries a `next` link.
    pub fn normalize(&mut self) {
        for child in self.values.values_mut() {
            child.normalize();
        }
        for list in self.statements.values_mut() {
            *list = flatten_chain(std::mem::take(list));
        }
    }
}

/// Expand each block's `next` chain in place, preserving order, and
/// normalize every node.
pub fn flatten_chain(blocks: Vec<BlockNode>) -> Vec<BlockNode> {
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        let mut cursor = Some(Box::new(block));
        while let Some(mut node) = cursor {
            cursor = node.next.take();
            node.normalize();
            out.push(*node);
        }
    }
    out
}

/// Parse a block forest from the editor's JSON save format.
///
/// Accepts either an array of root blocks or a single root object.
/// Root-level `next` chains are flattened into the returned list.
pub fn parse_forest(text: &str) -> Result<Vec<BlockNode>, FlowError> {
    let value: Value = serde_json::from_str(text).map_err(|e| FlowError::Structural {
        message: format!("block tree is not valid JSON: {e}"),
    })?;
    let roots: Vec<BlockNode> = match value {
        Value::Array(_) => {
            serde_json::from_value(value).map_err(|e| FlowError::Structural {
                message: format!("malformed block forest: {e}"),
            })?
        }
        Value::Object(_) => {
            let root = serde_json::from_value(value).map_err(|e| FlowError::Structural {
                message: format!("malformed block node: {e}"),
            })?;
            vec![root]
        }
        _ => {
            return Err(FlowError::Structural {
                message: "block tree must be a JSON object or array".to_string(),
            });
        }
    };
    Ok(flatten_chain(roots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_accessors() {
        let block = BlockNode::new("behaviour_behaviour")
            .field("NAME", "main")
            .field("IS_DEFAULT", "TRUE")
            .field("ACTION_INDEX", 3);
        assert_eq!(block.field_str("NAME"), Some("main"));
        assert!(block.field_bool("IS_DEFAULT"));
        assert_eq!(block.field_i64("ACTION_INDEX"), Some(3));
        assert!(!block.field_bool("MISSING"));
    }

    #[test]
    fn test_statement_slot_default_empty() {
        let block = BlockNode::new("behaviour_action");
        assert!(block.statement_slot("ACTIONLETS").is_empty());
    }

    #[test]
    fn test_normalize_flattens_next_chain() {
        let chained = json!({
            "type": "behaviour_action",
            "statements": {
                "ACTIONLETS": [{
                    "type": "text_primitive",
                    "next": { "type": "play_next_primitive" }
                }]
            }
        });
        let mut block: BlockNode = serde_json::from_value(chained).unwrap();
        block.normalize();
        let actionlets = block.statement_slot("ACTIONLETS");
        assert_eq!(actionlets.len(), 2);
        assert_eq!(actionlets[0].kind, "text_primitive");
        assert!(actionlets[0].next.is_none());
        assert_eq!(actionlets[1].kind, "play_next_primitive");
    }

    #[test]
    fn test_parse_forest_accepts_single_object() {
        let roots = parse_forest(r#"{ "type": "behaviour_behaviour" }"#).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].kind, "behaviour_behaviour");
    }

    #[test]
    fn test_parse_forest_flattens_root_chain() {
        let roots = parse_forest(
            r#"[{ "type": "variables_set", "next": { "type": "behaviour_behaviour" } }]"#,
        )
        .unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[1].kind, "behaviour_behaviour");
    }

    #[test]
    fn test_parse_forest_rejects_scalar() {
        assert!(parse_forest("42").is_err());
    }
}
