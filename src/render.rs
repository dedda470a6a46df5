//! Render URL composition.
//!
//! Ties the codec stages together:
//!
//! ```text
//! url ─► parse_path ─► decode_stack_variables ─► merge_variables ─► encode_variables ─► url
//!        (path.rs)     (stack.rs)                 (variables.rs)     (variables.rs)
//! ```
//!
//! URLs whose path is not a render path are returned unchanged; that is not an
//! error. A malformed JSON `v` query parameter is.
//!
//! ## Query encoding
//!
//! The `v` parameter is written with `application/x-www-form-urlencoded`
//! rules, so `{"baz":"hello-world"}` becomes `%7B%22baz%22%3A%22hello-world%22%7D`.
//! [`remove_safe_url_from_query`] reverses the escapes that hurt readability
//! for demo URLs.

use crate::operations::{Stack, stringify_stack_options};
use crate::path::{PathComponents, parse_path};
use crate::stack::{StackComponents, decode_stack_variables};
use crate::types::{StackOptions, VariableValue, Variables};
use crate::variables::{encode_variables, merge_variables};
use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

/// Render host template used when none is configured.
pub const DEFAULT_RENDER_HOST: &str = "https://{organization}.rokka.io";

/// Placeholder substituted with the organization name in a render host.
pub const ORGANIZATION_PLACEHOLDER: &str = "{organization}";

/// Query parameter carrying the JSON variable bucket.
pub const VARIABLES_PARAM: &str = "v";

/// Percent-escapes reversed by [`remove_safe_url_from_query`].
const READABLE_ESCAPES: [(&str, &str); 6] = [
    ("%22", "\""),
    ("%20", " "),
    ("%2C", ","),
    ("%7B", "{"),
    ("%7D", "}"),
    ("%3A", ":"),
];

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid render URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid JSON in `v` query parameter: {0}")]
    QueryVariables(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Options for [`get_url`].
#[derive(Debug, Clone, Default)]
pub struct UrlOptions {
    pub filename: Option<String>,
    pub stack_options: StackOptions,
    pub variables: Variables,
    pub remove_safe_url_from_query: bool,
}

/// Options for [`get_url_from_url`].
///
/// Unset `filename` and `format` keep the values of the source URL.
#[derive(Debug, Clone)]
pub struct UrlFromUrlOptions {
    pub filename: Option<String>,
    pub format: Option<String>,
    pub stack_options: StackOptions,
    pub variables: Variables,
    pub remove_safe_url_from_query: bool,
    /// Drop the variables of the source URL (path and query). Defaults to `true`.
    pub clear_variables: bool,
}

impl Default for UrlFromUrlOptions {
    fn default() -> Self {
        Self {
            filename: None,
            format: None,
            stack_options: StackOptions::new(),
            variables: Variables::new(),
            remove_safe_url_from_query: false,
            clear_variables: true,
        }
    }
}

/// Build a render URL: `host/stack[/o-options]/hash[/filename].format`.
///
/// Caller variables, if any, are encoded with [`add_stack_variables`].
pub fn get_url(
    organization: &str,
    hash: &str,
    format: &str,
    stack: &Stack,
    options: &UrlOptions,
    render_host: &str,
) -> Result<String> {
    let host = render_host.replacen(ORGANIZATION_PLACEHOLDER, organization, 1);

    let mut stack_string = stack.to_path();
    let stack_options = stringify_stack_options(&options.stack_options);
    if !stack_options.is_empty() {
        stack_string = format!("{stack_string}/o-{stack_options}");
    }

    let id = match options.filename.as_deref() {
        Some(filename) if !filename.is_empty() => format!("{hash}/{filename}"),
        _ => hash.to_string(),
    };

    let url = format!("{host}/{stack_string}/{id}.{format}");
    if options.variables.is_empty() {
        return Ok(url);
    }
    add_stack_variables(
        &url,
        options.variables.clone(),
        options.remove_safe_url_from_query,
    )
}

/// Rebuild an existing render URL with a different stack.
///
/// Hash, filename and format are taken from `rokka_url` unless overridden. The
/// organization is the URL's hostname with the render host suffix stripped.
/// Other query parameters of the source URL are not carried over.
pub fn get_url_from_url(
    rokka_url: &str,
    stack: &Stack,
    options: UrlFromUrlOptions,
    render_host: &str,
) -> Result<String> {
    let url = Url::parse(rokka_url)?;
    let Some(components) = parse_path(url.path()) else {
        tracing::debug!(url = rokka_url, "not a render URL, returning it unchanged");
        return Ok(rokka_url.to_string());
    };

    let variables = if options.clear_variables {
        options.variables
    } else {
        let stack_vars = decode_path_stack(&components.stack).variables;
        merge_variables(stack_vars, query_variables(&url)?, options.variables, false)
    };

    let organization = organization_from_host(url.host_str().unwrap_or_default(), render_host);
    let url_options = UrlOptions {
        filename: options.filename.or(components.filename),
        stack_options: options.stack_options,
        variables,
        remove_safe_url_from_query: options.remove_safe_url_from_query,
    };
    get_url(
        &organization,
        &components.hash,
        options.format.as_deref().unwrap_or(&components.format),
        stack,
        &url_options,
        render_host,
    )
}

/// Merge `variables` into a render URL and re-encode all of its variables.
///
/// Path, query and caller variables are merged (caller wins), then split into
/// the compact path segment and the JSON `v` parameter. Other query parameters
/// keep their position.
pub fn add_stack_variables(
    url: &str,
    variables: Variables,
    remove_safe_url_from_query: bool,
) -> Result<String> {
    let mut parsed = Url::parse(url)?;
    let Some(components) = parse_path(parsed.path()) else {
        tracing::debug!(url, "not a render URL, returning it unchanged");
        return Ok(url.to_string());
    };

    let stack = decode_path_stack(&components.stack);
    let merged = merge_variables(stack.variables, query_variables(&parsed)?, variables, false);

    let mut stack_string = stack.stack_string;
    if !merged.is_empty() {
        let encoded = encode_variables(&stack_string, &Variables::new(), &merged);
        stack_string = encoded.stack_string;
        set_query_variables(&mut parsed, encoded.json.as_ref())?;
    }

    parsed.set_path(&components.to_path_with_stack(&stack_string));

    if remove_safe_url_from_query {
        Ok(self::remove_safe_url_from_query(parsed.as_str()))
    } else {
        Ok(parsed.into())
    }
}

/// Decomposed view of a render URL, as used by the `parse` command.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderUrl {
    pub components: PathComponents,
    /// Stack string with variable declarations removed.
    pub stack_string: String,
    pub path_variables: Variables,
    pub query_variables: Variables,
}

/// Decompose `url`, returning `None` if its path is not a render path.
pub fn inspect_url(url: &str) -> Result<Option<RenderUrl>> {
    let parsed = Url::parse(url)?;
    let Some(components) = parse_path(parsed.path()) else {
        return Ok(None);
    };
    let stack = decode_path_stack(&components.stack);
    Ok(Some(RenderUrl {
        components,
        stack_string: stack.stack_string,
        path_variables: stack.variables,
        query_variables: query_variables(&parsed)?,
    }))
}

/// Decode the stack of an escaped URL path.
///
/// Variable names and values are percent-decoded so that a non-ASCII compact
/// value written by [`Url::set_path`] reads back as the same text. The
/// residual stack string stays escaped; it goes straight back into the path.
fn decode_path_stack(stack: &str) -> StackComponents {
    let mut decoded = decode_stack_variables(stack);
    decoded.variables = decoded
        .variables
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                VariableValue::Text(text) => VariableValue::Text(percent_decoded(&text)),
                other => other,
            };
            (percent_decoded(&name), value)
        })
        .collect();
    decoded
}

/// Percent-decode `raw`, keeping it as is when the bytes are not UTF-8.
fn percent_decoded(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map_or_else(|_| raw.to_string(), |text| text.into_owned())
}

/// Decode the JSON `v` query parameter; absent means empty.
pub fn query_variables(url: &Url) -> Result<Variables> {
    match url.query_pairs().find(|(k, _)| k == VARIABLES_PARAM) {
        Some((_, raw)) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Variables::new()),
    }
}

/// Set or remove the `v` parameter, keeping the other parameters in order.
fn set_query_variables(url: &mut Url, json: Option<&Variables>) -> Result<()> {
    let value = json.map(serde_json::to_string).transpose()?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut placed = false;
    for (key, existing) in url.query_pairs().into_owned() {
        if key != VARIABLES_PARAM {
            pairs.push((key, existing));
        } else if !placed {
            placed = true;
            if let Some(v) = &value {
                pairs.push((key, v.clone()));
            }
        }
    }
    if let (false, Some(v)) = (placed, value) {
        pairs.push((VARIABLES_PARAM.to_string(), v));
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }
    Ok(())
}

/// Organization name: the hostname minus the render host's fixed part.
fn organization_from_host(hostname: &str, render_host: &str) -> String {
    let template_host = render_host
        .split_once("://")
        .map_or(render_host, |(_, rest)| rest);
    let template_host = template_host.split('/').next().unwrap_or_default();
    let suffix = template_host.replacen(ORGANIZATION_PLACEHOLDER, "", 1);
    if suffix.is_empty() {
        return hostname.to_string();
    }
    hostname.replacen(&suffix, "", 1)
}

/// Reverse selected percent-escapes in the query part of `url` for readability.
///
/// The path and fragment are left untouched.
pub fn remove_safe_url_from_query(url: &str) -> String {
    let Some(query_start) = url.find('?') else {
        return url.to_string();
    };
    let query_end = url[query_start..]
        .find('#')
        .map_or(url.len(), |i| query_start + i);

    let mut query = url[query_start..query_end].to_string();
    for (escape, plain) in READABLE_ESCAPES {
        query = query.replace(escape, plain);
    }
    format!("{}{}{}", &url[..query_start], query, &url[query_end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::StackOperation;
    use crate::test_helpers::HASH;

    fn base(path: &str) -> String {
        format!("https://myorg.rokka.io/{path}")
    }

    #[test]
    fn get_url_named_stack() {
        let url = get_url(
            "myorg",
            HASH,
            "png",
            &Stack::from("mystack"),
            &UrlOptions::default(),
            DEFAULT_RENDER_HOST,
        )
        .unwrap();
        assert_eq!(url, base(&format!("mystack/{HASH}.png")));
    }

    #[test]
    fn get_url_operations_options_and_filename() {
        let options = UrlOptions {
            filename: Some("bar".into()),
            stack_options: StackOptions::new().with("af", "1"),
            ..Default::default()
        };
        let stack = Stack::from(StackOperation::new("resize").option("width", "200"));
        let url = get_url("myorg", HASH, "jpg", &stack, &options, DEFAULT_RENDER_HOST).unwrap();
        assert_eq!(
            url,
            base(&format!("dynamic/resize-width-200/o-af-1/{HASH}/bar.jpg"))
        );
    }

    #[test]
    fn get_url_empty_filename_ignored() {
        let options = UrlOptions {
            filename: Some(String::new()),
            ..Default::default()
        };
        let url = get_url("o", HASH, "png", &Stack::from("s"), &options, DEFAULT_RENDER_HOST)
            .unwrap();
        assert_eq!(url, format!("https://o.rokka.io/s/{HASH}.png"));
    }

    #[test]
    fn get_url_custom_host() {
        let url = get_url(
            "acme",
            HASH,
            "png",
            &Stack::from("s"),
            &UrlOptions::default(),
            "http://localhost:8080/{organization}",
        )
        .unwrap();
        assert_eq!(url, format!("http://localhost:8080/acme/s/{HASH}.png"));
    }

    #[test]
    fn get_url_with_variables() {
        let options = UrlOptions {
            variables: Variables::new().with("foo", "bar"),
            ..Default::default()
        };
        let url = get_url("myorg", HASH, "png", &Stack::from("s"), &options, DEFAULT_RENDER_HOST)
            .unwrap();
        assert_eq!(url, base(&format!("s/v-foo-bar/{HASH}.png")));
    }

    #[test]
    fn from_url_replaces_stack() {
        let url = get_url_from_url(
            &base(&format!("dynamic/{HASH}.png")),
            &Stack::from("mystack"),
            UrlFromUrlOptions::default(),
            DEFAULT_RENDER_HOST,
        )
        .unwrap();
        assert_eq!(url, base(&format!("mystack/{HASH}.png")));
    }

    #[test]
    fn from_url_changes_format_keeps_filename() {
        let url = get_url_from_url(
            &base(&format!("dynamic/{HASH}/foo.png")),
            &Stack::from(StackOperation::new("resize").option("width", "100")),
            UrlFromUrlOptions {
                format: Some("jpg".into()),
                ..Default::default()
            },
            DEFAULT_RENDER_HOST,
        )
        .unwrap();
        assert_eq!(url, base(&format!("dynamic/resize-width-100/{HASH}/foo.jpg")));
    }

    #[test]
    fn from_url_clear_variables_by_default() {
        let source = base(&format!(
            r#"dynamic/resize-width-100/v-foo-bar/{HASH}/foo.jpg?v={{"baz":"hello-world"}}"#
        ));
        let url = get_url_from_url(
            &source,
            &Stack::from("newStack"),
            UrlFromUrlOptions {
                remove_safe_url_from_query: true,
                variables: Variables::new().with("hi", "ho"),
                ..Default::default()
            },
            DEFAULT_RENDER_HOST,
        )
        .unwrap();
        assert_eq!(url, base(&format!("newStack/v-hi-ho/{HASH}/foo.jpg")));
    }

    #[test]
    fn from_url_not_a_render_url() {
        let source = "https://myorg.rokka.io/about.html";
        let url = get_url_from_url(
            source,
            &Stack::from("s"),
            UrlFromUrlOptions::default(),
            DEFAULT_RENDER_HOST,
        )
        .unwrap();
        assert_eq!(url, source);
    }

    #[test]
    fn add_variables_not_a_render_url() {
        let source = "https://example.com/index.html?x=1";
        let url = add_stack_variables(source, Variables::new().with("a", "b"), false).unwrap();
        assert_eq!(url, source);
    }

    #[test]
    fn add_variables_invalid_url_is_error() {
        let err = add_stack_variables("not a url", Variables::new(), false).unwrap_err();
        assert!(matches!(err, RenderError::Url(_)));
    }

    #[test]
    fn add_variables_malformed_query_json_is_error() {
        let source = base(&format!("s/{HASH}.png?v={{broken"));
        let err = add_stack_variables(&source, Variables::new(), false).unwrap_err();
        assert!(matches!(err, RenderError::QueryVariables(_)));
    }

    #[test]
    fn add_variables_encoded_query() {
        let url = add_stack_variables(
            &base(&format!("s/{HASH}.png")),
            Variables::new().with("baz", "hello world"),
            false,
        )
        .unwrap();
        assert_eq!(
            url,
            base(&format!("s/{HASH}.png?v=%7B%22baz%22%3A%22hello+world%22%7D"))
        );
    }

    #[test]
    fn add_variables_keeps_other_query_params() {
        let url = add_stack_variables(
            &base(&format!("s/{HASH}.png?a=1&v=%7B%22x%22%3A%22y-z%22%7D&b=2")),
            Variables::new().with("foo", "bar"),
            true,
        )
        .unwrap();
        assert_eq!(
            url,
            base(&format!(r#"s/v-foo-bar/{HASH}.png?a=1&v={{"x":"y-z"}}&b=2"#))
        );
    }

    #[test]
    fn add_variables_drops_empty_query() {
        // The only JSON variable is overridden by a compact one.
        let url = add_stack_variables(
            &base(&format!("s/{HASH}.png?v=%7B%22x%22%3A%22y-z%22%7D")),
            Variables::new().with("x", "plain"),
            false,
        )
        .unwrap();
        assert_eq!(url, base(&format!("s/v-x-plain/{HASH}.png")));
    }

    #[test]
    fn add_no_variables_is_idempotent() {
        let source = base(&format!(
            r#"dynamic/resize-width-100/v-foo-bar/{HASH}/foo.jpg?v={{"baz":"hello-world"}}"#
        ));
        let once = add_stack_variables(&source, Variables::new(), true).unwrap();
        let twice = add_stack_variables(&once, Variables::new(), true).unwrap();
        assert_eq!(once, source);
        assert_eq!(twice, once);
    }

    #[test]
    fn add_non_ascii_compact_value_is_idempotent() {
        let source = base(&format!("s/{HASH}.png"));
        let once =
            add_stack_variables(&source, Variables::new().with("a", "grüß"), true).unwrap();
        assert_eq!(once, base(&format!("s/v-a-gr%C3%BC%C3%9F/{HASH}.png")));

        let twice = add_stack_variables(&once, Variables::new(), true).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn path_variables_are_percent_decoded() {
        let source = base(&format!("s-x%C3%A9/v-na%C3%AFve-gr%C3%BC%C3%9F/{HASH}.png"));
        let inspected = inspect_url(&source).unwrap().unwrap();
        assert_eq!(inspected.path_variables, Variables::new().with("naïve", "grüß"));
        assert_eq!(inspected.stack_string, "s-x%C3%A9");
    }

    #[test]
    fn from_url_keeps_non_ascii_compact_value() {
        let url = get_url_from_url(
            &base(&format!("s/v-a-gr%C3%BC%C3%9F/{HASH}.png")),
            &Stack::from("t"),
            UrlFromUrlOptions {
                clear_variables: false,
                ..Default::default()
            },
            DEFAULT_RENDER_HOST,
        )
        .unwrap();
        assert_eq!(url, base(&format!("t/v-a-gr%C3%BC%C3%9F/{HASH}.png")));
    }

    #[test]
    fn add_variables_wrapped_token() {
        let url = add_stack_variables(
            "https://myorg.rokka.io/mystack/-remote-/image.jpg",
            Variables::new().with("w", 100),
            false,
        )
        .unwrap();
        assert_eq!(url, "https://myorg.rokka.io/mystack/v-w-100/-remote-/image.jpg");
    }

    #[test]
    fn inspect_render_url() {
        let source = base(&format!(
            r#"dynamic/resize-width-100/v-foo-bar/{HASH}/foo.jpg?v={{"baz":"hello-world"}}"#
        ));
        let inspected = inspect_url(&source).unwrap().unwrap();
        assert_eq!(inspected.components.hash, HASH);
        assert_eq!(inspected.stack_string, "dynamic/resize-width-100");
        assert_eq!(inspected.path_variables, Variables::new().with("foo", "bar"));
        assert_eq!(
            inspected.query_variables,
            Variables::new().with("baz", "hello-world")
        );
        assert!(inspect_url("https://myorg.rokka.io/").unwrap().is_none());
    }

    #[test]
    fn organization_strips_render_host_suffix() {
        assert_eq!(organization_from_host("myorg.rokka.io", DEFAULT_RENDER_HOST), "myorg");
        assert_eq!(
            organization_from_host(
                "acme.images.example.com",
                "https://{organization}.images.example.com/"
            ),
            "acme"
        );
        assert_eq!(organization_from_host("localhost", "http://{organization}"), "localhost");
    }

    #[test]
    fn readable_query_leaves_path_alone() {
        let url = "https://h.io/a%20b/x.png?v=%7B%22a%22%3A%22b%2Cc%20d%22%7D#frag%22";
        assert_eq!(
            remove_safe_url_from_query(url),
            r#"https://h.io/a%20b/x.png?v={"a":"b,c d"}#frag%22"#
        );
    }

    #[test]
    fn readable_query_without_query() {
        let url = "https://h.io/a%20b/x.png";
        assert_eq!(remove_safe_url_from_query(url), url);
    }
}
