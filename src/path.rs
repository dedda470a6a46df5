//! Render path decomposition.
//!
//! A render path has the shape `/<stack>/<id>[/<filename>].<format>`, where the
//! identifier slot holds either a content hash or a dash-wrapped token:
//!
//! ```text
//! /dynamic/resize-width-100/v-foo-bar/c421f4e8cefe0fd3aab22832f51e85bacda0a47a/foo.jpg
//!  └──────────── stack ─────────────┘ └────────────── hash ──────────────────┘ └┬┘ └┬┘
//!                                                                      filename ┘   └ format
//! /mystack/-some/opaque/path-.png
//!          └─ wrapped token ─┘
//! ```
//!
//! Four patterns are tried in priority order (hash with filename, hash, token
//! with filename, token). The first pattern that matches decides the result:
//! if its stack capture is empty, the path is not a render path.
//!
//! ## Stack capture
//!
//! `(?P<stack>.*(?:[^-]|--)|-*)`: the stack either ends in a non-dash, ends in
//! a `--` separator, or consists only of dashes. This keeps a single trailing
//! dash out of the stack so it can open a wrapped token.

use regex::Regex;
use std::sync::LazyLock;

const STACK: &str = r"(?P<stack>.*(?:[^-]|--)|-*)";
const HASH: &str = r"(?P<hash>[0-9a-f]{6,40})";
const WRAPPED: &str = r"(?P<hash>-.+-)";
const FILENAME: &str = r"(?P<filename>[^/^.]+)";
const FORMAT: &str = r"(?P<format>.{2,4})";

/// Structural parts of a render path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathComponents {
    /// Everything before the identifier slot, without leading or trailing slash.
    pub stack: String,
    /// Hex content hash (6–40 chars) or a dash-wrapped token.
    pub hash: String,
    pub filename: Option<String>,
    /// File extension, 2–4 characters.
    pub format: String,
}

impl PathComponents {
    /// Render path for these components with `stack` replaced.
    ///
    /// An empty stack yields `/<hash>...` with no empty leading segment.
    pub fn to_path_with_stack(&self, stack: &str) -> String {
        let mut path = String::from("/");
        if !stack.is_empty() {
            path.push_str(stack);
            path.push('/');
        }
        path.push_str(&self.hash);
        if let Some(filename) = &self.filename {
            path.push('/');
            path.push_str(filename);
        }
        path.push('.');
        path.push_str(&self.format);
        path
    }
}

/// One compiled structural pattern.
struct PathPattern {
    name: &'static str,
    regex: Regex,
}

impl PathPattern {
    fn new(name: &'static str, pattern: String) -> Self {
        Self {
            name,
            regex: Regex::new(&pattern).expect("render path pattern must compile"),
        }
    }
}

static PATTERNS: LazyLock<[PathPattern; 4]> = LazyLock::new(|| {
    [
        PathPattern::new(
            "hash-filename",
            format!(r"/{STACK}/{HASH}/{FILENAME}\.{FORMAT}"),
        ),
        PathPattern::new("hash", format!(r"/{STACK}/{HASH}\.{FORMAT}")),
        PathPattern::new(
            "wrapped-filename",
            format!(r"/{STACK}/{WRAPPED}/{FILENAME}\.{FORMAT}"),
        ),
        PathPattern::new("wrapped", format!(r"/{STACK}/{WRAPPED}\.{FORMAT}")),
    ]
});

/// Decompose a URL path into its render components.
///
/// Returns `None` when no pattern matches or the first matching pattern
/// captured an empty stack. Callers pass such URLs through unchanged.
pub fn parse_path(path: &str) -> Option<PathComponents> {
    let (pattern, caps) = PATTERNS
        .iter()
        .find_map(|p| p.regex.captures(path).map(|caps| (p, caps)))?;

    let stack = caps.name("stack").map(|m| m.as_str()).unwrap_or_default();
    if stack.is_empty() {
        tracing::debug!(path, pattern = pattern.name, "render path has an empty stack");
        return None;
    }

    tracing::trace!(path, pattern = pattern.name, "matched render path");
    Some(PathComponents {
        stack: stack.to_string(),
        hash: caps["hash"].to_string(),
        filename: caps.name("filename").map(|m| m.as_str().to_string()),
        format: caps["format"].to_string(),
    })
}
