use serde_json::{Map, Value, json};

use crate::actionlet::{Actionlet, list_value};

/// An atomically executed group of actionlets.
///
/// Serializes as an array of `[tag, payload]` arrays. An action that is
/// nothing but an inline structural error serializes as the bare error
/// string so the failure shows up at its position in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Action(pub Vec<Actionlet>);

impl Action {
    pub fn to_value(&self) -> Value {
        if let [Actionlet::Inline(message)] = self.0.as_slice() {
            return json!(message);
        }
        list_value(&self.0)
    }
}

/// A named, independently addressable sequence of actions.
#[derive(Debug, Clone, PartialEq)]
pub struct Behaviour {
    pub name: String,
    pub actions: Vec<Action>,
}

impl Behaviour {
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "actions": Value::Array(self.actions.iter().map(Action::to_value).collect()),
        })
    }
}

/// The compiled behaviour program document.
///
/// With at least one behaviour the document is
/// `{"default": name?, "behaviours": [...]}`. With none, loose
/// root-level fragments are emitted as a bare action list, preserved
/// for compatibility with older runtimes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub default: Option<String>,
    pub behaviours: Vec<Behaviour>,
    pub loose_actions: Vec<Action>,
}

impl Program {
    pub fn to_value(&self) -> Value {
        if self.behaviours.is_empty() {
            return Value::Array(self.loose_actions.iter().map(Action::to_value).collect());
        }
        let mut doc = Map::new();
        if let Some(default) = &self.default {
            doc.insert("default".to_string(), json!(default));
        }
        doc.insert(
            "behaviours".to_string(),
            Value::Array(self.behaviours.iter().map(Behaviour::to_value).collect()),
        );
        Value::Object(doc)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_value())
            .unwrap_or_else(|_| "null".to_string())
    }

    /// Look up a behaviour by name.
    pub fn behaviour(&self, name: &str) -> Option<&Behaviour> {
        self.behaviours.iter().find(|b| b.name == name)
    }
}
