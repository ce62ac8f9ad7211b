//! Tool Registry
//!
//! The [`ToolRegistry`] maps tool names (canonical and alias) to executable
//! [`Tool`]s. The scheduler resolves every requested name through it, and
//! builds the [`ToolCallDescription`] the policy engine sees, so rules
//! written against an alias still apply to the canonical tool.
//!
//! # Usage
//!
//! ```ignore
//! let mut registry = ToolRegistry::new();
//! registry.register(Arc::new(ShellTool::new(".")))?;
//!
//! let resolved = registry.resolve("run_shell_command").unwrap();
//! assert_eq!(resolved.canonical, "shell_exec");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use toolgate_domain::{ToolCallDescription, ToolSpec};

use crate::ports::tool::Tool;

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The name is already taken by a tool or an alias.
    #[error("Tool name '{0}' is already registered")]
    Duplicate(String),

    #[error("Cannot alias '{alias}' to unknown tool '{canonical}'")]
    UnknownTarget { alias: String, canonical: String },
}

/// A looked-up tool with its canonical name.
#[derive(Clone)]
pub struct ResolvedTool {
    pub canonical: String,
    pub tool: Arc<dyn Tool>,
}

/// Name → tool mapping with alias support.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    spec: ToolSpec,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its canonical name and every alias it declares.
    ///
    /// Nothing is registered if any of the names is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let canonical = tool.name().to_string();
        if self.is_taken(&canonical) {
            return Err(RegistryError::Duplicate(canonical));
        }
        if let Some(alias) = tool.aliases().iter().find(|a| self.is_taken(a)) {
            return Err(RegistryError::Duplicate(alias.to_string()));
        }

        self.spec.insert(tool.definition().clone());
        for alias in tool.aliases() {
            self.spec.insert_alias(*alias, canonical.as_str());
        }
        tracing::debug!(tool = %canonical, aliases = ?tool.aliases(), "Registered tool");
        self.tools.insert(canonical, tool);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self, RegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    /// Add an extra alias for an already registered tool.
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        canonical: &str,
    ) -> Result<(), RegistryError> {
        let alias = alias.into();
        if !self.tools.contains_key(canonical) {
            return Err(RegistryError::UnknownTarget {
                alias,
                canonical: canonical.to_string(),
            });
        }
        if self.is_taken(&alias) {
            return Err(RegistryError::Duplicate(alias));
        }
        self.spec.insert_alias(alias, canonical);
        Ok(())
    }

    fn is_taken(&self, name: &str) -> bool {
        self.spec.resolve(name).is_some()
    }

    /// Look up a tool by canonical name or alias.
    pub fn resolve(&self, name: &str) -> Option<ResolvedTool> {
        let canonical = self.spec.resolve(name)?;
        let tool = self.tools.get(canonical)?;
        Some(ResolvedTool {
            canonical: canonical.to_string(),
            tool: Arc::clone(tool),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Describe a call for the policy engine, listing every known name.
    pub fn describe(&self, canonical: &str, args: Value) -> ToolCallDescription {
        let aliases = self
            .spec
            .names_for(canonical)
            .into_iter()
            .filter(|n| n != canonical);
        ToolCallDescription::new(canonical, args).with_aliases(aliases)
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Canonical names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
