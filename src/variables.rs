//! Variable merging and the path/query encoding split.
//!
//! Variables reach a render URL from three sources, lowest priority first:
//!
//! 1. **Path**: `v-name-value` subparts in the stack string
//! 2. **Query**: a JSON object in the `v` query parameter
//! 3. **Caller**: values supplied when building the URL
//!
//! On the way out every variable lands in exactly one of two buckets:
//!
//! - **Compact**: short values without separator or URL-special characters are
//!   written into the path as one `v-name-value-name-value` segment.
//! - **JSON**: everything else goes into the `v` query parameter.
//!
//! A value goes to the JSON bucket if its text is longer than
//! [`MAX_COMPACT_LEN`] characters or contains any of [`UNSAFE_CHARS`].

use crate::stack::StackTree;
use crate::types::{VariableValue, Variables};

/// Longest value text that may still be written into the path.
pub const MAX_COMPACT_LEN: usize = 20;

/// Characters that force a value into the JSON bucket.
pub const UNSAFE_CHARS: [char; 12] = ['*', '$', '/', '\\', '-', '#', '%', '&', '?', ';', ' ', ':'];

/// Where an encoded variable ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Compact,
    Json,
}

/// Pick the bucket for a stringified value.
pub fn classify(text: &str) -> Bucket {
    if text.chars().count() > MAX_COMPACT_LEN || text.contains(UNSAFE_CHARS) {
        Bucket::Json
    } else {
        Bucket::Compact
    }
}

/// Unset values are skipped by the encoder, except `false`.
fn is_encodable(value: &VariableValue) -> bool {
    value.is_truthy() || matches!(value, VariableValue::Bool(false))
}

/// Combine the three variable sources; later sources win on collisions.
///
/// With `clear` set, path variables are left out entirely.
pub fn merge_variables(
    path: Variables,
    query: Variables,
    caller: Variables,
    clear: bool,
) -> Variables {
    let mut merged = if clear { Variables::new() } else { path };
    merged.overlay(query);
    merged.overlay(caller);
    merged
}

/// Result of [`encode_variables`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVariables {
    /// Stack string with the compact bucket appended as a `v-...` segment.
    pub stack_string: String,
    /// Contents of the `v` query parameter; `None` means remove the parameter.
    pub json: Option<Variables>,
}

/// Partition `variables` into the compact path segment and the JSON bucket.
///
/// `existing_json` is the JSON bucket already present on the target; JSON-bound
/// variables are shallow-merged over it. In the JSON bucket booleans are
/// stored as the strings `"true"`/`"false"`; numbers and text keep their type.
pub fn encode_variables(
    stack_string: &str,
    existing_json: &Variables,
    variables: &Variables,
) -> EncodedVariables {
    let mut compact: Vec<(&str, String)> = Vec::new();
    let mut json = existing_json.clone();

    for (name, value) in variables.iter().filter(|(_, v)| is_encodable(v)) {
        let text = value.to_string();
        match classify(&text) {
            Bucket::Compact => compact.push((name, text)),
            Bucket::Json => {
                tracing::debug!(name, value = %text, "variable routed to the query parameter");
                let stored = match value {
                    VariableValue::Bool(_) => VariableValue::Text(text),
                    other => other.clone(),
                };
                json.insert(name, stored);
            }
        }
    }

    let mut tree = StackTree::parse(stack_string);
    tree.push_variables(compact.iter().map(|(n, v)| (*n, v.as_str())));

    EncodedVariables {
        stack_string: tree.to_string(),
        json: (!json.is_empty()).then_some(json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::decode_stack_variables;

    #[test]
    fn classify_short_plain_values_compact() {
        assert_eq!(classify("bar"), Bucket::Compact);
        assert_eq!(classify("12345678901234567890"), Bucket::Compact);
        assert_eq!(classify("a.b_c,d"), Bucket::Compact);
    }

    #[test]
    fn classify_long_values_json() {
        assert_eq!(classify("123456789012345678901"), Bucket::Json);
    }

    #[test]
    fn classify_every_unsafe_char_json() {
        for c in UNSAFE_CHARS {
            assert_eq!(classify(&format!("a{c}b")), Bucket::Json, "char {c:?}");
        }
    }

    #[test]
    fn merge_precedence_caller_query_path() {
        let path = Variables::new().with("a", "path").with("b", "path").with("c", "path");
        let query = Variables::new().with("b", "query").with("c", "query");
        let caller = Variables::new().with("c", "caller");
        let merged = merge_variables(path, query, caller, false);
        assert_eq!(
            merged,
            Variables::new().with("a", "path").with("b", "query").with("c", "caller")
        );
    }

    #[test]
    fn merge_clear_skips_path() {
        let path = Variables::new().with("a", "path");
        let query = Variables::new().with("b", "query");
        let merged = merge_variables(path, query, Variables::new(), true);
        assert_eq!(merged, Variables::new().with("b", "query"));
    }

    #[test]
    fn encode_splits_buckets() {
        let vars = Variables::new().with("foo", "bar").with("baz", "hello-world");
        let encoded = encode_variables("dynamic/resize-width-100", &Variables::new(), &vars);
        assert_eq!(encoded.stack_string, "dynamic/resize-width-100/v-foo-bar");
        assert_eq!(encoded.json, Some(Variables::new().with("baz", "hello-world")));
    }

    #[test]
    fn encode_skips_unset_but_keeps_false() {
        let vars = Variables::new()
            .with("empty", "")
            .with("zero", 0)
            .with("off", false)
            .with("on", true);
        let encoded = encode_variables("s", &Variables::new(), &vars);
        assert_eq!(encoded.stack_string, "s/v-off-false-on-true");
        assert_eq!(encoded.json, None);
    }

    #[test]
    fn encode_json_bucket_keeps_number_type() {
        let vars = Variables::new()
            .with("neg", -5)
            .with("long", "a-very-long-value-that-overflows");
        let existing = Variables::new().with("keep", "me");
        let encoded = encode_variables("s", &existing, &vars);
        let json = encoded.json.unwrap();
        assert_eq!(json.get("neg"), Some(&VariableValue::from(-5)));
        assert_eq!(json.get("keep"), Some(&VariableValue::from("me")));
        assert_eq!(
            serde_json::to_string(&json).unwrap(),
            r#"{"keep":"me","neg":-5,"long":"a-very-long-value-that-overflows"}"#
        );
        assert_eq!(encoded.stack_string, "s");
    }

    #[test]
    fn encode_tiny_float_goes_to_json() {
        // Exponent text carries a `-`.
        let vars = Variables::new().with("f", 1e-7).with("g", 0.5);
        let encoded = encode_variables("s", &Variables::new(), &vars);
        assert_eq!(encoded.stack_string, "s/v-g-0.5");
        assert_eq!(encoded.json, Some(Variables::new().with("f", 1e-7)));
    }

    #[test]
    fn encode_compact_booleans_leave_existing_json_alone() {
        let existing = Variables::new().with("flag", "x");
        let vars = Variables::new().with("flag", true);
        let encoded = encode_variables("s", &existing, &vars);
        assert_eq!(encoded.stack_string, "s/v-flag-true");
        assert_eq!(encoded.json, Some(Variables::new().with("flag", "x")));
    }

    #[test]
    fn encode_merges_over_existing_json() {
        let existing = Variables::new().with("a", "old value").with("b", "kept value");
        let vars = Variables::new().with("a", "new value");
        let encoded = encode_variables("s", &existing, &vars);
        assert_eq!(
            encoded.json,
            Some(Variables::new().with("a", "new value").with("b", "kept value"))
        );
        assert_eq!(encoded.stack_string, "s");
    }

    #[test]
    fn encode_nothing_removes_query() {
        let encoded = encode_variables("mystack", &Variables::new(), &Variables::new());
        assert_eq!(encoded.stack_string, "mystack");
        assert_eq!(encoded.json, None);
    }

    #[test]
    fn encode_onto_empty_stack() {
        let vars = Variables::new().with("a", "b");
        let encoded = encode_variables("", &Variables::new(), &vars);
        assert_eq!(encoded.stack_string, "v-a-b");
    }

    #[test]
    fn compact_values_round_trip_through_path() {
        let vars = Variables::new()
            .with("w", 100)
            .with("name", "bar")
            .with("on", true)
            .with("ratio", 1.5);
        let residual = decode_stack_variables("dynamic/resize-width-100/v-old-x").stack_string;
        let encoded = encode_variables(&residual, &Variables::new(), &vars);
        assert!(encoded.json.is_none());
        let decoded = decode_stack_variables(&encoded.stack_string);
        assert_eq!(decoded.stack_string, "dynamic/resize-width-100");
        assert_eq!(
            decoded.variables,
            Variables::new()
                .with("w", "100")
                .with("name", "bar")
                .with("on", "true")
                .with("ratio", "1.5")
        );
    }

    #[test]
    fn every_value_lands_in_exactly_one_bucket() {
        let vars = Variables::new()
            .with("a", "plain")
            .with("b", "with space")
            .with("c", "x".repeat(21))
            .with("d", 42);
        let encoded = encode_variables("s", &Variables::new(), &vars);
        let json = encoded.json.unwrap();
        let path_vars = decode_stack_variables(&encoded.stack_string).variables;
        for (name, _) in vars.iter() {
            assert!(
                json.get(name).is_some() != path_vars.get(name).is_some(),
                "{name} must be in exactly one bucket"
            );
        }
    }
}
