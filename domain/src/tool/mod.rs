//! Tool domain module
//!
//! A tool is an opaque capability the model can ask to invoke. The domain
//! only knows its declared schema ([`ToolDefinition`]) and the names it is
//! known by ([`ToolSpec`]); execution lives behind the application layer's
//! `Tool` port.
//!
//! ```text
//! ┌──────────────┐    ┌────────────────────┐
//! │ ToolSpec     │───▶│ ToolDefinition     │
//! │ (registry)   │    │ (name, params)     │
//! └──────┬───────┘    └────────────────────┘
//!        │
//!        └─ aliases: "ShellTool" → "shell_exec"
//! ```
//!
//! # Aliases and Policy
//!
//! A tool may be known by more than one name (an internal class name and a
//! public name, for instance). [`ToolSpec::names_for`] returns all of them so
//! the policy engine can check every rule against every name.

pub mod entities;
pub mod traits;

pub use entities::{ToolDefinition, ToolKind, ToolParameter, ToolSpec};
pub use traits::{DefaultToolValidator, ToolValidator};
