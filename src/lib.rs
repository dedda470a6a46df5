//! # rokka-render
//!
//! Builds and rewrites render URLs for the rokka image delivery service. A
//! render URL carries everything in its path and query string: the stack of
//! processing operations, the image hash, and user-supplied template
//! variables.
//!
//! ```text
//! https://myorg.rokka.io/dynamic/resize-width-100/v-foo-bar/c421f4e8…a47a/foo.jpg?v={"baz":"hello-world"}
//!
//!   stack          dynamic/resize-width-100
//!   compact vars   v-foo-bar                 (foo = bar)
//!   hash           c421f4e8…a47a
//!   filename       foo
//!   format         jpg
//!   JSON vars      v={"baz":"hello-world"}
//! ```
//!
//! # Architecture: Four-Stage Codec
//!
//! ```text
//! 1. Match    URL path      →  stack, hash, filename, format     (path)
//! 2. Decode   stack path    →  variables + residual stack        (stack)
//! 3. Merge    path, query, caller variables → one map            (variables)
//! 4. Encode   variables     →  compact path segment + `v` JSON   (variables)
//! ```
//!
//! Each stage is a pure function from strings and maps to strings and maps;
//! [`render`] strings them together into URLs.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`path`] | Prioritized render path patterns → [`path::PathComponents`] |
//! | [`stack`] | Segment/subpart/token grammar of stack strings, variable declarations |
//! | [`variables`] | Source precedence and the compact/JSON bucket split |
//! | [`operations`] | Inline stack operations and stack options in path form |
//! | [`render`] | URL composition: `get_url`, `get_url_from_url`, `add_stack_variables` |
//! | [`types`] | [`Variables`] and [`VariableValue`] |
//! | [`config`] | `render.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Two Variable Encodings
//!
//! Short, plain values are written into the path (`v-foo-bar`) so the URL
//! stays readable and cache keys stay stable. Anything that would collide
//! with the path grammar (`-`, `/`) or URL syntax (`?`, `#`, `%`, ...) or is
//! longer than 20 characters goes into the JSON `v` query parameter instead.
//!
//! ## Pass-Through on Unknown URLs
//!
//! A URL whose path does not look like a render path is returned unchanged.
//! Only an unparseable absolute URL or a malformed JSON `v` parameter is an
//! error.

pub mod config;
pub mod operations;
pub mod output;
pub mod path;
pub mod render;
pub mod stack;
pub mod types;
pub mod variables;

pub use operations::{Stack, StackOperation};
pub use path::{PathComponents, parse_path};
pub use render::{
    RenderError, UrlFromUrlOptions, UrlOptions, add_stack_variables, get_url, get_url_from_url,
};
pub use stack::{StackComponents, decode_stack_variables};
pub use types::{StackOptions, VariableValue, Variables};
pub use variables::{EncodedVariables, encode_variables, merge_variables};

#[cfg(test)]
pub(crate) mod test_helpers;
