//! Structural checks run on a wire document before it is decoded.
//!
//! serde reports the first mismatch without saying where it is. Walking the
//! document first lets a rejection name the exact field path.

use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationErrorKind};
use crate::protocol::AgentRole;

type Check = Result<(), ValidationError>;

pub(crate) fn check_message(doc: &Value) -> Check {
    let obj = object(doc, "$")?;
    optional(obj, "$", "message_id", string)?;
    optional(obj, "$", "conversation_id", string)?;
    optional_nullable(obj, "$", "metadata", |v, p| object(v, p).map(|_| ()))?;

    let turns = required(obj, "$", "turns")?;
    each(turns, &field_path("$", "turns"), check_turn)
}

fn check_turn(doc: &Value, path: &str) -> Check {
    let obj = object(doc, path)?;
    optional(obj, path, "id", string)?;
    optional(obj, path, "timestamp", number)?;
    check_context(required(obj, path, "sender")?, &field_path(path, "sender"))?;
    check_context(required(obj, path, "recipient")?, &field_path(path, "recipient"))?;
    optional_nullable(obj, path, "tool_calls", |v, p| each(v, p, check_tool_call))?;
    optional_nullable(obj, path, "tool_responses", |v, p| each(v, p, check_tool_response))?;
    optional_nullable(obj, path, "text_content", string)
}

fn check_context(doc: &Value, path: &str) -> Check {
    let obj = object(doc, path)?;

    let name_path = field_path(path, "agent_name");
    let name = required(obj, path, "agent_name")?;
    string(name, &name_path)?;
    if name.as_str().is_some_and(|s| s.is_empty()) {
        return Err(ValidationError::new(name_path, ValidationErrorKind::Empty));
    }

    let role_path = field_path(path, "role");
    let role = required(obj, path, "role")?;
    string(role, &role_path)?;
    match role.as_str().and_then(AgentRole::parse) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new(
            role_path,
            ValidationErrorKind::UnknownRole(role.as_str().unwrap_or_default().to_string()),
        )),
    }
}

fn check_tool_call(doc: &Value, path: &str) -> Check {
    let obj = object(doc, path)?;
    string(required(obj, path, "tool_name")?, &field_path(path, "tool_name"))?;
    object(required(obj, path, "tool_input")?, &field_path(path, "tool_input"))?;
    optional(obj, path, "tool_call_id", string)
}

fn check_tool_response(doc: &Value, path: &str) -> Check {
    let obj = object(doc, path)?;
    string(required(obj, path, "tool_name")?, &field_path(path, "tool_name"))?;
    string(required(obj, path, "tool_call_id")?, &field_path(path, "tool_call_id"))?;
    // Any value is a valid output, null included, but the key must be there
    required(obj, path, "tool_output")?;
    optional(obj, path, "is_error", boolean)
}

fn field_path(parent: &str, key: &str) -> String {
    if parent == "$" {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn required<'a>(obj: &'a Map<String, Value>, path: &str, key: &str) -> Result<&'a Value, ValidationError> {
    obj.get(key)
        .ok_or_else(|| ValidationError::new(field_path(path, key), ValidationErrorKind::Missing))
}

/// Absent is fine; present (including null) must pass `check`
fn optional(obj: &Map<String, Value>, path: &str, key: &str, check: impl Fn(&Value, &str) -> Check) -> Check {
    match obj.get(key) {
        Some(v) => check(v, &field_path(path, key)),
        None => Ok(()),
    }
}

/// Absent and null both mean "unset"
fn optional_nullable(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    check: impl Fn(&Value, &str) -> Check,
) -> Check {
    match obj.get(key) {
        Some(Value::Null) | None => Ok(()),
        Some(v) => check(v, &field_path(path, key)),
    }
}

fn each(doc: &Value, path: &str, check: fn(&Value, &str) -> Check) -> Check {
    let items = doc
        .as_array()
        .ok_or_else(|| invalid_type(path, "array", doc))?;
    for (i, item) in items.iter().enumerate() {
        check(item, &format!("{}[{}]", path, i))?;
    }
    Ok(())
}

fn object<'a>(doc: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ValidationError> {
    doc.as_object()
        .ok_or_else(|| invalid_type(path, "object", doc))
}

fn string(doc: &Value, path: &str) -> Check {
    doc.is_string()
        .then_some(())
        .ok_or_else(|| invalid_type(path, "string", doc))
}

fn number(doc: &Value, path: &str) -> Check {
    doc.is_number()
        .then_some(())
        .ok_or_else(|| invalid_type(path, "number", doc))
}

fn boolean(doc: &Value, path: &str) -> Check {
    doc.is_boolean()
        .then_some(())
        .ok_or_else(|| invalid_type(path, "boolean", doc))
}

fn invalid_type(path: &str, expected: &'static str, found: &Value) -> ValidationError {
    ValidationError::new(
        path,
        ValidationErrorKind::InvalidType {
            expected,
            found: kind_of(found),
        },
    )
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
