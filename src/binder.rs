//! Attribute binding: textual attribute values coerced into component fields.

use crate::ast::AttrList;
use crate::component::Component;
use crate::error::BindError;
use crate::schema::{ErasedSchema, FieldKind};
use log::warn;
use serde_json::Value;
use std::any::Any;

/// Binds `attributes` onto `component`, field by field, in document order.
///
/// Binding stops at the first failing attribute; attributes bound before it
/// keep their new value and the failing field keeps its previous one.
pub fn bind<C: Component>(component: &mut C, attributes: &AttrList) -> Result<(), BindError> {
    bind_erased(&C::schema(), component, attributes)
}

pub(crate) fn bind_erased(
    schema: &dyn ErasedSchema,
    component: &mut dyn Any,
    attributes: &AttrList,
) -> Result<(), BindError> {
    for attr in attributes {
        let Some(kind) = schema.field_kind(&attr.name) else {
            return Err(BindError::NoField {
                component: schema.type_name().to_string(),
                field: attr.name.clone(),
            });
        };
        let Some(value) = coerce(kind, &attr.name, &attr.value)? else {
            warn!(
                "in {}: field {} can't be bound from an attribute",
                schema.type_name(),
                attr.name
            );
            continue;
        };
        if let Some(Err(err)) = schema.set(component, &attr.name, value) {
            return Err(BindError::Rejected {
                field: attr.name.clone(),
                value: attr.value.clone(),
                reason: err.to_string(),
            });
        }
    }
    Ok(())
}

/// Converts attribute text to the JSON value stored into a field of `kind`.
/// `None` means the kind has no textual form.
pub(crate) fn coerce(kind: FieldKind, field: &str, text: &str) -> Result<Option<Value>, BindError> {
    let value = match kind {
        FieldKind::String => Value::String(text.to_string()),
        FieldKind::Bool => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => {
                return Err(BindError::InvalidBool {
                    field: field.to_string(),
                    value: text.to_string(),
                })
            }
        },
        FieldKind::Int => parse_int(text)
            .map(Value::from)
            .ok_or_else(|| BindError::InvalidInt {
                field: field.to_string(),
                value: text.to_string(),
            })?,
        FieldKind::Uint => parse_uint(text)
            .map(Value::from)
            .ok_or_else(|| BindError::InvalidUint {
                field: field.to_string(),
                value: text.to_string(),
            })?,
        FieldKind::Float => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| BindError::InvalidFloat {
                field: field.to_string(),
                value: text.to_string(),
            })?,
        FieldKind::Struct | FieldKind::Map | FieldKind::Other => return Ok(None),
    };
    Ok(Some(value))
}

/// Parses a signed integer, accepting `0x`, `0o` and `0b` prefixes and `_`
/// digit separators.
pub fn parse_int(text: &str) -> Option<i64> {
    let (negative, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = parse_uint_unsigned(rest)?;
    if negative {
        // i64::MIN has no positive counterpart.
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Parses an unsigned integer with the same syntax as [`parse_int`]. A `+`
/// sign is accepted, `-` is not.
pub fn parse_uint(text: &str) -> Option<u64> {
    parse_uint_unsigned(text.strip_prefix('+').unwrap_or(text))
}

fn parse_uint_unsigned(text: &str) -> Option<u64> {
    let lower = text.get(..2).map(str::to_ascii_lowercase);
    let (radix, digits) = match lower.as_deref() {
        Some("0x") => (16, &text[2..]),
        Some("0o") => (8, &text[2..]),
        Some("0b") => (2, &text[2..]),
        _ => (10, text),
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    if cleaned.starts_with(['+', '-']) {
        return None;
    }
    u64::from_str_radix(&cleaned, radix).ok()
}
