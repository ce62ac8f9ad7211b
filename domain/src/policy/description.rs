//! What the policy engine sees of a tool call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Argument keys checked, in order, when picking the primary argument.
const PRIMARY_ARG_KEYS: [&str; 6] = ["command", "path", "file_path", "pattern", "query", "url"];

/// Description of a tool call for policy evaluation and confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDescription {
    /// Canonical tool name
    pub name: String,
    /// Other names the tool is known by
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub args: Value,
}

impl ToolCallDescription {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            args,
        }
    }

    pub fn with_aliases(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// The canonical name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(|a| a.as_str()))
    }

    /// The string argument that argument-qualified rules are matched against.
    ///
    /// A bare string is its own primary argument. For objects, the first
    /// present well-known key wins, then the first string value in key order.
    pub fn primary_argument(&self) -> Option<&str> {
        match &self.args {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => PRIMARY_ARG_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
                .or_else(|| map.values().find_map(|v| v.as_str())),
            _ => None,
        }
    }
}
