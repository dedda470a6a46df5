//! Shared value types used across the codec stages.
//!
//! Variables travel through every stage (path decoding → merge → encoding),
//! so their representation lives here rather than in any one stage.
//!
//! ## Ordering
//!
//! [`Variables`] is semantically an unordered map: equality ignores order and
//! a name appears at most once. Insertion order is still remembered because it
//! decides the order of `-name-value` pairs in the compact path encoding and of
//! keys in the JSON query value. Overwriting an existing name keeps its
//! original position.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Largest integer an `f64` holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A single variable (or stack option) value: text, number or boolean.
///
/// Numbers read and print the way a browser does: `1e-7` rather than
/// `0.0000001`, and `-3` rather than `-3.0`, both as text and in JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl VariableValue {
    /// Whether the value counts as "set".
    ///
    /// Empty text and numeric zero are unset, and so is `false`. The variable
    /// encoder keeps `false` anyway; operation options render it as undefined.
    pub fn is_truthy(&self) -> bool {
        match self {
            VariableValue::Bool(b) => *b,
            VariableValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            VariableValue::Text(s) => !s.is_empty(),
        }
    }
}

/// Canonical text form: `true`/`false`, integral numbers without a fraction.
impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Bool(b) => write!(f, "{b}"),
            VariableValue::Number(n) if n.is_f64() => match n.as_f64() {
                Some(v) => f.write_str(&float_text(v)),
                None => write!(f, "{n}"),
            },
            VariableValue::Number(n) => write!(f, "{n}"),
            VariableValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for VariableValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            VariableValue::Bool(b) => serializer.serialize_bool(*b),
            VariableValue::Number(n) => match n.as_f64() {
                Some(v) if n.is_f64() && v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER => {
                    serializer.serialize_i64(v as i64)
                }
                _ => n.serialize(serializer),
            },
            VariableValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Shortest round-trip text of a finite float, switching to exponent form
/// below 1e-6 and from 1e21 up.
fn float_text(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let magnitude = v.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let text = format!("{v:e}");
        return match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => text,
        };
    }
    // f64's Display already drops a zero fraction (1.0 → "1")
    format!("{v}")
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::Text(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::Text(value)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        VariableValue::Bool(value)
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        VariableValue::Number(value.into())
    }
}

impl From<i32> for VariableValue {
    fn from(value: i32) -> Self {
        VariableValue::Number(value.into())
    }
}

impl From<u32> for VariableValue {
    fn from(value: u32) -> Self {
        VariableValue::Number(value.into())
    }
}

impl From<u64> for VariableValue {
    fn from(value: u64) -> Self {
        VariableValue::Number(value.into())
    }
}

/// Non-finite floats have no URL form; they become empty text and are dropped
/// by the encoder.
impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(VariableValue::Number)
            .unwrap_or_else(|| VariableValue::Text(String::new()))
    }
}

/// Name → value map with last-write-wins semantics.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    entries: Vec<(String, VariableValue)>,
}

/// Stack options share the ordered scalar-map shape of variables.
pub type StackOptions = Variables;

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, returning the previous value if there was one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<VariableValue>,
    ) -> Option<VariableValue> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<VariableValue> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Shallow override: every entry of `other` replaces or extends `self`.
    pub fn overlay(&mut self, other: Variables) {
        for (name, value) in other {
            self.insert(name, value);
        }
    }
}

impl PartialEq for Variables {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(n, v)| other.get(n) == Some(v))
    }
}

impl<K: Into<String>, V: Into<VariableValue>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        vars.extend(iter);
        vars
    }
}

impl<K: Into<String>, V: Into<VariableValue>> Extend<(K, V)> for Variables {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl IntoIterator for Variables {
    type Item = (String, VariableValue);
    type IntoIter = std::vec::IntoIter<(String, VariableValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Variables {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Deserializes a flat JSON object in document order.
///
/// `null` becomes empty text (unset). Arrays and nested objects are rejected.
impl<'de> Deserialize<'de> for Variables {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VariablesVisitor;

        impl<'de> Visitor<'de> for VariablesVisitor {
            type Value = Variables;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a flat object of string, number or boolean values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Variables, A::Error> {
                let mut vars = Variables::new();
                while let Some((name, value)) =
                    access.next_entry::<String, Option<VariableValue>>()?
                {
                    vars.insert(name, value.unwrap_or_else(|| VariableValue::Text(String::new())));
                }
                Ok(vars)
            }
        }

        deserializer.deserialize_map(VariablesVisitor)
    }
}
