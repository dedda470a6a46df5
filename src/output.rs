//! CLI output formatting.
//!
//! Each command has a `format_*` function returning `Vec<String>` for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure.
//!
//! ## Parse
//!
//! ```text
//! Stack: dynamic/resize-width-100
//! Hash: c421f4e8cefe0fd3aab22832f51e85bacda0a47a
//! Filename: foo
//! Format: jpg
//! Path variables
//!     foo = bar (compact)
//! Query variables
//!     baz = hello-world (json)
//! ```

use crate::render::RenderUrl;
use crate::types::Variables;
use crate::variables::{Bucket, classify};

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn bucket_label(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::Compact => "compact",
        Bucket::Json => "json",
    }
}

/// One line per variable, annotated with the bucket it would be encoded to.
fn variable_lines(title: &str, vars: &Variables) -> Vec<String> {
    let mut lines = vec![title.to_string()];
    if vars.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
        return lines;
    }
    for (name, value) in vars.iter() {
        let text = value.to_string();
        lines.push(format!(
            "{}{} = {} ({})",
            indent(1),
            name,
            text,
            bucket_label(classify(&text))
        ));
    }
    lines
}

/// Format the decomposition of a render URL.
pub fn format_render_url(render: &RenderUrl) -> Vec<String> {
    let c = &render.components;
    let mut lines = vec![
        format!("Stack: {}", render.stack_string),
        format!("Hash: {}", c.hash),
    ];
    if let Some(filename) = &c.filename {
        lines.push(format!("Filename: {filename}"));
    }
    lines.push(format!("Format: {}", c.format));
    lines.extend(variable_lines("Path variables", &render.path_variables));
    lines.extend(variable_lines("Query variables", &render.query_variables));
    lines
}

pub fn print_render_url(render: &RenderUrl) {
    for line in format_render_url(render) {
        println!("{line}");
    }
}

/// Format the result for a URL that is not a render URL.
pub fn format_not_render_url(url: &str) -> Vec<String> {
    vec![format!("Not a render URL: {url}")]
}

pub fn print_not_render_url(url: &str) {
    for line in format_not_render_url(url) {
        println!("{line}");
    }
}
