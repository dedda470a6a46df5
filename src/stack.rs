//! Stack string grammar: segments, subparts and tokens.
//!
//! A stack string is split at three levels:
//!
//! ```text
//! dynamic/resize-width-100--crop-width-50/v-foo-bar
//! └──┬──┘ └─────────────┬───────────────┘ └───┬───┘   segments  (split on `/`)
//!         └──────┬─────┘  └─────┬─────┘               subparts  (split on `--`)
//!          resize width 100  crop width 50  v foo bar  tokens    (split on `-`)
//! ```
//!
//! The first token of a subpart is its name, the rest are arguments. A subpart
//! named `v` or `variables` declares variables as alternating name/value
//! arguments (`v-foo-bar-baz-1` → `foo=bar`, `baz=1`); a trailing name with
//! no value is ignored.
//!
//! Rejoining a parsed tree drops empty subparts and empty segments, so
//! `a----b//c` renders back as `a--b/c`.

use crate::types::Variables;
use std::fmt;

const SEGMENT_SEPARATOR: &str = "/";
const SUBPART_SEPARATOR: &str = "--";
const TOKEN_SEPARATOR: &str = "-";

/// Subpart names that declare variables.
pub const VARIABLE_MARKERS: [&str; 2] = ["v", "variables"];

/// Variables found in a stack path, and the stack path without them.
#[derive(Debug, Clone, PartialEq)]
pub struct StackComponents {
    pub variables: Variables,
    pub stack_string: String,
}

/// One `-`-separated element of a segment, e.g. `resize-width-100`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subpart {
    pub name: String,
    pub args: Vec<String>,
}

impl Subpart {
    fn parse(text: &str) -> Self {
        let mut tokens = text.split(TOKEN_SEPARATOR).map(str::to_string);
        let name = tokens.next().unwrap_or_default();
        Self {
            name,
            args: tokens.collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.args.is_empty()
    }

    pub fn declares_variables(&self) -> bool {
        VARIABLE_MARKERS.contains(&self.name.as_str())
    }

    /// Name/value pairs of a variable declaration; an unpaired trailing name
    /// is dropped.
    pub fn variable_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.args
            .chunks_exact(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
    }
}

impl fmt::Display for Subpart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, "{TOKEN_SEPARATOR}{arg}")?;
        }
        Ok(())
    }
}

/// One `/`-separated element of a stack string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segment {
    pub subparts: Vec<Subpart>,
}

impl Segment {
    fn parse(text: &str) -> Self {
        Self {
            subparts: text.split(SUBPART_SEPARATOR).map(Subpart::parse).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subparts.iter().all(Subpart::is_empty)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for subpart in self.subparts.iter().filter(|s| !s.is_empty()) {
            if !first {
                f.write_str(SUBPART_SEPARATOR)?;
            }
            write!(f, "{subpart}")?;
            first = false;
        }
        Ok(())
    }
}

/// A stack string parsed into segments → subparts → tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackTree {
    pub segments: Vec<Segment>,
}

impl StackTree {
    pub fn parse(stack: &str) -> Self {
        Self {
            segments: stack.split(SEGMENT_SEPARATOR).map(Segment::parse).collect(),
        }
    }

    /// Remove every variable declaration, returning the declared variables.
    ///
    /// Later declarations overwrite earlier ones with the same name.
    pub fn take_variables(&mut self) -> Variables {
        let mut variables = Variables::new();
        for segment in &mut self.segments {
            segment.subparts.retain(|subpart| {
                if !subpart.declares_variables() {
                    return true;
                }
                for (name, value) in subpart.variable_pairs() {
                    tracing::trace!(name, value, "stack variable");
                    variables.insert(name, value);
                }
                false
            });
        }
        variables
    }

    /// Append a `v-name-value...` segment built from already-stringified pairs.
    ///
    /// Does nothing when `pairs` is empty.
    pub fn push_variables<'a>(&mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let args: Vec<String> = pairs
            .into_iter()
            .flat_map(|(name, value)| [name.to_string(), value.to_string()])
            .collect();
        if args.is_empty() {
            return;
        }
        self.segments.push(Segment {
            subparts: vec![Subpart {
                name: VARIABLE_MARKERS[0].to_string(),
                args,
            }],
        });
    }
}

impl fmt::Display for StackTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in self.segments.iter().filter(|s| !s.is_empty()) {
            if !first {
                f.write_str(SEGMENT_SEPARATOR)?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

/// Split a stack path into its embedded variables and the residual stack string.
pub fn decode_stack_variables(stack_path: &str) -> StackComponents {
    let mut tree = StackTree::parse(stack_path);
    let variables = tree.take_variables();
    StackComponents {
        variables,
        stack_string: tree.to_string(),
    }
}
