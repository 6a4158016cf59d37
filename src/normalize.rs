//! Canonical annotation records and the flattening rules that produce them.
//!
//! The service hands back heterogeneous per-annotation shapes: a single
//! target or a list, a single body or a list, `@id`-wrapped references or
//! plain strings. Normalization flattens all of that into one canonical
//! record so the transforms downstream only handle one shape.

use serde_json::Value;
use tracing::debug;

/// One target of an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Object with a `source` and optional fragment selector value.
    Fragment {
        source: String,
        selector: Option<String>,
    },
    /// Bare string target: an already-resolved plain URI, no selector.
    Uri(String),
    /// Object without a `source`. Not a validated shape; kept verbatim so
    /// specific-resource output can pass it through unchanged.
    Opaque(Value),
}

impl Target {
    pub fn from_value(value: &Value) -> Target {
        match value {
            Value::String(uri) => Target::Uri(uri.clone()),
            Value::Object(object) => match object.get("source").and_then(Value::as_str) {
                Some(source) => Target::Fragment {
                    source: source.to_string(),
                    selector: object
                        .get("selector")
                        .and_then(|selector| selector.get("value"))
                        .and_then(Value::as_str)
                        .map(|value| value.to_string()),
                },
                None => Target::Opaque(value.clone()),
            },
            other => Target::Opaque(other.clone()),
        }
    }
}

/// Canonical internal annotation shape.
///
/// Built fresh for every transform, never mutated after creation.
#[derive(Debug, Clone)]
pub struct NormalizedAnnotation {
    pub id: String,
    pub targets: Vec<Target>,
    pub bodies: Vec<Value>,
    pub motivation: Option<String>,
    /// Whether `body` arrived as a single object rather than a list. The
    /// output record keeps the same cardinality.
    pub single_body: bool,
}

/// Caller-controlled normalization behaviour.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Replace top-level `{"@id": ...}` objects with the plain id string.
    pub flatten_ids: bool,
    /// Force the motivation to a fixed value (e.g. `oa:tagging`). A
    /// profile decision, not a universal rule.
    pub force_motivation: Option<String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            flatten_ids: true,
            force_motivation: None,
        }
    }
}

/// Flatten one raw annotation into the canonical shape.
///
/// Annotations missing `body` or `target` are not transformable and are
/// dropped silently (`None`), as is anything without a usable `id`.
pub fn normalize(item: &Value, options: &NormalizeOptions) -> Option<NormalizedAnnotation> {
    let object = item.as_object()?;
    if !object.contains_key("body") || !object.contains_key("target") {
        debug!("Dropping annotation without body and target");
        return None;
    }

    let flattened;
    let object = if options.flatten_ids {
        flattened = object
            .iter()
            .map(|(key, value)| (key.clone(), flatten_at_id(value)))
            .collect();
        &flattened
    } else {
        object
    };

    let id = object.get("id").and_then(Value::as_str).map(String::from);
    let id = match id {
        Some(id) => id,
        None => {
            debug!("Dropping annotation without an id");
            return None;
        }
    };

    let targets = match &object["target"] {
        Value::Array(list) => list.iter().map(Target::from_value).collect(),
        single => vec![Target::from_value(single)],
    };

    let (bodies, single_body) = match &object["body"] {
        Value::Array(list) => (list.clone(), false),
        single => (vec![single.clone()], true),
    };

    let motivation = options.force_motivation.clone().or_else(|| {
        object
            .get("motivation")
            .and_then(Value::as_str)
            .map(String::from)
    });

    Some(NormalizedAnnotation {
        id,
        targets,
        bodies,
        motivation,
        single_body,
    })
}

/// Replace an `{"@id": ...}` object with its plain id string.
///
/// Anything else passes through untouched, so flattening an
/// already-flattened value is a no-op.
fn flatten_at_id(value: &Value) -> Value {
    if let Some(id) = value.get("@id").and_then(Value::as_str) {
        return Value::String(id.to_string());
    }
    value.clone()
}
