use flowkit_common::errors::FlowError;

/// Declared type of a custom-script argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Number,
    Boolean,
    /// A statement slot compiled into a sub-action list.
    Action,
}

/// One declared argument of a custom script.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ArgDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ArgType,
}

/// Schema of one externally implemented script a `custom` actionlet
/// can call.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ScriptDescriptor {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgDescriptor>,
}

/// The custom-script schema registry.
///
/// Loaded once from static configuration before compilation begins and
/// read-only for the duration of every run. Order is declaration order
/// and drives argument serialization order.
#[derive(Debug, Clone, Default)]
pub struct ScriptRegistry {
    scripts: Vec<ScriptDescriptor>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON array of script descriptors:
    /// `[{"name": "invoke_llm", "args": [{"name": "prompt", "type": "string"}]}]`.
    pub fn from_json(text: &str) -> Result<Self, FlowError> {
        let scripts: Vec<ScriptDescriptor> =
            serde_json::from_str(text).map_err(|e| FlowError::Registry {
                message: format!("malformed script registry: {e}"),
            })?;
        let mut registry = Self { scripts: Vec::new() };
        for script in scripts {
            if registry.get(&script.name).is_some() {
                return Err(FlowError::Registry {
                    message: format!("duplicate script '{}'", script.name),
                });
            }
            registry.scripts.push(script);
        }
        Ok(registry)
    }

    /// Register a descriptor directly (test setup and embedding).
    pub fn insert(&mut self, script: ScriptDescriptor) {
        self.scripts.push(script);
    }

    pub fn get(&self, name: &str) -> Option<&ScriptDescriptor> {
        self.scripts.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptDescriptor> {
        self.scripts.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
