//! Driver-initiated calls: events surfaced by serialized hooks come back here
//! as a node identity, a target name and a JSON payload.

use crate::engine::Engine;
use crate::error::{DispatchError, MarkupError};
use crate::schema::ErasedSchema;
use crate::tree::Uid;
use crate::value::type_name;
use log::warn;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::rc::Rc;

/// What a successful dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A method was invoked.
    Method,
    /// A field was set.
    Field,
    /// The component has no method or field by that name. Logged as a warning.
    Unhandled,
    /// The target name was empty.
    Ignored,
}

/// Payload of a field dispatch.
#[derive(Debug, Deserialize)]
struct FieldPayload {
    #[serde(rename = "Value")]
    value: String,
}

impl Engine {
    /// Calls `target` on the component behind node `id`.
    ///
    /// A method with no parameter ignores `payload`; a method with one
    /// parameter decodes it from the JSON `payload`. Otherwise `target` is a
    /// field name, possibly a dotted path into nested records and maps, and
    /// `payload` is `{"Value": "<text>"}`. Missing map entries are created,
    /// and so are absent records declared with
    /// [`Schema::optional_record`](crate::Schema::optional_record). String
    /// targets take the text as-is, others parse it as JSON.
    ///
    /// The state change surfaces with the next [`Engine::synchronize`].
    ///
    /// # Errors
    /// - [`DispatchError::NotMounted`] when no live node has identity `id`.
    /// - [`DispatchError::TooManyParameters`] for methods of arity above one.
    /// - [`DispatchError::Payload`] when the payload does not decode.
    /// - [`DispatchError::Path`] when a dotted path does not resolve.
    pub fn dispatch(&mut self, id: Uid, target: &str, payload: &str) -> Result<Dispatched, MarkupError> {
        if target.is_empty() {
            return Ok(Dispatched::Ignored);
        }
        let key = self
            .node_by_id(id)
            .ok_or_else(|| DispatchError::NotMounted { id: id.to_string() })?;
        let node = self.live(key)?;
        let handle = node
            .bound
            .filter(|&bound| self.is_mounted(bound))
            .unwrap_or(node.owner);
        let instance = self.instance_mut(handle)?;
        let schema = Rc::clone(&instance.schema);
        let component = instance.as_any_mut();

        if let Some(arity) = schema.method_arity(target) {
            if arity > 1 {
                return Err(DispatchError::TooManyParameters {
                    component: schema.type_name().to_string(),
                    method: target.to_string(),
                    arity,
                }
                .into());
            }
            if let Some(Err(source)) = schema.invoke(component, target, payload) {
                return Err(DispatchError::Payload {
                    target: target.to_string(),
                    source,
                }
                .into());
            }
            return Ok(Dispatched::Method);
        }

        let (field, path) = match target.split_once('.') {
            Some((field, path)) => (field, Some(path)),
            None => (target, None),
        };
        if schema.field_kind(field).is_none() {
            warn!(
                "{} does not have a method or a field named {}",
                schema.type_name(),
                target
            );
            return Ok(Dispatched::Unhandled);
        }

        let FieldPayload { value } =
            serde_json::from_str(payload).map_err(|source| DispatchError::Payload {
                target: target.to_string(),
                source,
            })?;
        let segments: Vec<&str> = path.map(|path| path.split('.').collect()).unwrap_or_default();
        set_path(&*schema, component, target, field, &segments, &value)?;
        Ok(Dispatched::Field)
    }
}

fn set_path(
    schema: &dyn ErasedSchema,
    component: &mut dyn Any,
    target: &str,
    field: &str,
    segments: &[&str],
    text: &str,
) -> Result<(), DispatchError> {
    let payload_error = |source| DispatchError::Payload {
        target: target.to_string(),
        source,
    };
    let path_error = |message: String| DispatchError::Path {
        target: target.to_string(),
        message,
    };
    let no_field = |name: &str| path_error(format!("no field named {name}"));

    let mut original = match schema.get(&*component, field) {
        Some(value) => value.map_err(payload_error)?,
        None => return Err(no_field(field)),
    };
    if original.is_null() && !segments.is_empty() {
        if let Some(blank) = schema.blank(field) {
            original = blank.map_err(payload_error)?;
        }
    }
    let mut scratch = original.clone();
    let existing = walk_mut(&mut scratch, segments).map_err(path_error)?;
    let candidates = candidates(existing, text).map_err(payload_error)?;

    let mut failure = None;
    for candidate in candidates {
        let mut updated = original.clone();
        *walk_mut(&mut updated, segments).map_err(path_error)? = candidate;
        match schema.set(component, field, updated) {
            Some(Ok(())) => {
                failure = None;
                break;
            }
            Some(Err(err)) => failure = Some(err),
            None => return Err(no_field(field)),
        }
    }
    if let Some(err) = failure {
        return Err(payload_error(err));
    }

    // Records silently drop keys they do not declare.
    if !segments.is_empty() {
        if let Some(Ok(after)) = schema.get(&*component, field) {
            if let Some(missing) = missing_segment(&after, segments) {
                return Err(no_field(missing));
            }
        }
    }
    Ok(())
}

/// Follows `segments` into `value`, turning nulls into objects and creating
/// missing entries on the way. Nested records created this way only
/// deserialize when their other fields are optional.
fn walk_mut<'v>(value: &'v mut Value, segments: &[&str]) -> Result<&'v mut Value, String> {
    let mut current = value;
    for segment in segments {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            other => return Err(format!("can't map {segment} into {}", type_name(other))),
        };
    }
    Ok(current)
}

/// Values to try for `text`, in order. Unknown (null) targets accept JSON
/// first and fall back to the raw text.
fn candidates(existing: &Value, text: &str) -> serde_json::Result<Vec<Value>> {
    match existing {
        Value::String(_) => Ok(vec![Value::String(text.to_string())]),
        Value::Null => {
            let mut values = Vec::with_capacity(2);
            if let Ok(parsed) = serde_json::from_str(text) {
                values.push(parsed);
            }
            values.push(Value::String(text.to_string()));
            Ok(values)
        }
        _ => Ok(vec![serde_json::from_str(text)?]),
    }
}

fn missing_segment<'a>(value: &Value, segments: &[&'a str]) -> Option<&'a str> {
    let mut current = value;
    for &segment in segments {
        current = match current.get(segment) {
            Some(next) => next,
            None => return Some(segment),
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_walk_creates_missing_entries() {
        let mut value = json!({ "a": null });
        *walk_mut(&mut value, &["a", "b"]).unwrap() = json!(1);
        assert_eq!(value, json!({ "a": { "b": 1 } }));
    }

    #[test]
    fn test_walk_rejects_scalars() {
        let mut value = json!(3);
        let err = walk_mut(&mut value, &["x"]).unwrap_err();
        assert_eq!(err, "can't map x into int");
    }

    #[test]
    fn test_candidates() {
        assert_eq!(candidates(&json!("old"), "42").unwrap(), vec![json!("42")]);
        assert_eq!(candidates(&json!(1), "42").unwrap(), vec![json!(42)]);
        assert_eq!(
            candidates(&json!(null), "42").unwrap(),
            vec![json!(42), json!("42")]
        );
        assert_eq!(candidates(&json!(null), "hi").unwrap(), vec![json!("hi")]);
        assert!(candidates(&json!(1), "hi").is_err());
    }

    #[test]
    fn test_missing_segment() {
        let value = json!({ "a": { "b": 1 } });
        assert_eq!(missing_segment(&value, &["a", "b"]), None);
        assert_eq!(missing_segment(&value, &["a", "c"]), Some("c"));
    }
}
