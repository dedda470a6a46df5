//! Stack operations and their path form.
//!
//! These types describe *which* stack a URL renders with. A stack is either a
//! named stack configured on the service, or an inline list of operations that
//! is rendered as a `dynamic/` stack:
//!
//! ```text
//! [resize(width=100), grayscale]  →  dynamic/resize-width-100--grayscale
//! ```
//!
//! Operation and option names are opaque here; the service validates them.

use crate::types::{StackOptions, Variables};
use serde::{Deserialize, Serialize};

/// Stack used when a URL is built with an empty stack name.
pub const DEFAULT_STACK: &str = "dynamic/noop";

/// Placeholder for an option whose value is unset.
const UNDEFINED_OPTION: &str = "__undefined__";

/// A single inline operation, e.g. `resize` with `width=100`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackOperation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Variables::is_empty")]
    pub options: Variables,
}

impl StackOperation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Variables::new(),
        }
    }

    pub fn option(
        mut self,
        name: impl Into<String>,
        value: impl Into<crate::types::VariableValue>,
    ) -> Self {
        self.options.insert(name, value);
        self
    }
}

/// Render operations as `name-k-v-k-v`, joined by `--`.
///
/// Unset option values render as `__undefined__`.
pub fn stringify_operations(operations: &[StackOperation]) -> String {
    operations
        .iter()
        .map(|op| {
            let mut part = op.name.clone();
            for (key, value) in op.options.iter() {
                part.push('-');
                part.push_str(key);
                part.push('-');
                if value.is_truthy() {
                    part.push_str(&value.to_string());
                } else {
                    part.push_str(UNDEFINED_OPTION);
                }
            }
            part
        })
        .collect::<Vec<_>>()
        .join("--")
}

/// Render stack options as `k-v-k-v`.
pub fn stringify_stack_options(options: &StackOptions) -> String {
    options
        .iter()
        .map(|(key, value)| format!("{key}-{value}"))
        .collect::<Vec<_>>()
        .join("-")
}

/// The stack a URL renders with.
#[derive(Debug, Clone, PartialEq)]
pub enum Stack {
    /// A stack configured on the service, referenced by name.
    Named(String),
    /// Inline operations, rendered as a `dynamic/` stack.
    Operations(Vec<StackOperation>),
}

impl Stack {
    /// Path form of the stack, falling back to [`DEFAULT_STACK`] when empty.
    pub fn to_path(&self) -> String {
        let path = match self {
            Stack::Named(name) => name.clone(),
            Stack::Operations(ops) => format!("dynamic/{}", stringify_operations(ops)),
        };
        if path.is_empty() {
            DEFAULT_STACK.to_string()
        } else {
            path
        }
    }
}

impl From<&str> for Stack {
    fn from(name: &str) -> Self {
        Stack::Named(name.to_string())
    }
}

impl From<String> for Stack {
    fn from(name: String) -> Self {
        Stack::Named(name)
    }
}

impl From<Vec<StackOperation>> for Stack {
    fn from(ops: Vec<StackOperation>) -> Self {
        Stack::Operations(ops)
    }
}

impl From<StackOperation> for Stack {
    fn from(op: StackOperation) -> Self {
        Stack::Operations(vec![op])
    }
}
