//! Reading and writing the value tree by field path

use super::path::{FieldPath, Segment};
use crate::error::{FormError, Result};
use serde_json::{Map, Value};

/// Look up the value at `path`
pub fn get<'a>(root: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |current, segment| match segment {
            Segment::Key(key) => current.as_object()?.get(key),
            Segment::Index(index) => current.as_array()?.get(*index),
        })
}

/// Write `value` at `path`, creating intermediate groups as needed.
///
/// A list index may equal the list length (append) but not exceed it.
pub fn set(root: &mut Value, path: &FieldPath, value: Value) -> Result<()> {
    let mut current = root;
    let segments = path.segments();

    for (depth, segment) in segments.iter().enumerate() {
        let is_last = depth + 1 == segments.len();
        let next_is_index = matches!(segments.get(depth + 1), Some(Segment::Index(_)));

        current = match segment {
            Segment::Key(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                let object = current
                    .as_object_mut()
                    .ok_or_else(|| FormError::type_mismatch(path, "object"))?;
                if is_last {
                    object.insert(key.clone(), value);
                    return Ok(());
                }
                object.entry(key.clone()).or_insert_with(|| empty_container(next_is_index))
            }
            Segment::Index(index) => {
                if current.is_null() {
                    *current = Value::Array(Vec::new());
                }
                let array = current
                    .as_array_mut()
                    .ok_or_else(|| FormError::type_mismatch(path, "array"))?;
                let len = array.len();
                if *index > len {
                    return Err(FormError::IndexOutOfBounds {
                        path: path.to_string(),
                        index: *index,
                        len,
                    });
                }
                if *index == len {
                    array.push(empty_container(next_is_index));
                }
                if is_last {
                    array[*index] = value;
                    return Ok(());
                }
                &mut array[*index]
            }
        };
    }

    // Only reachable for an empty path, which FieldPath::parse never yields
    *current = value;
    Ok(())
}

/// Remove the value at `path`, returning it when present
pub fn remove(root: &mut Value, path: &FieldPath) -> Option<Value> {
    let (last, parent) = match path.parent() {
        Some(parent) => (path.segments().last()?, get_mut(root, &parent)?),
        None => (path.segments().first()?, root),
    };
    match last {
        Segment::Key(key) => parent.as_object_mut()?.remove(key),
        Segment::Index(index) => {
            let array = parent.as_array_mut()?;
            (*index < array.len()).then(|| array.remove(*index))
        }
    }
}

pub fn get_mut<'a>(root: &'a mut Value, path: &FieldPath) -> Option<&'a mut Value> {
    path.segments()
        .iter()
        .try_fold(root, |current, segment| match segment {
            Segment::Key(key) => current.as_object_mut()?.get_mut(key),
            Segment::Index(index) => current.as_array_mut()?.get_mut(*index),
        })
}

/// Emptiness as the `required` rule sees it
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Bool(checked)) => !checked,
        Some(Value::Number(_)) | Some(Value::Object(_)) => false,
    }
}

/// Text shown in an input for a stored value
pub fn display_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn empty_container(is_list: bool) -> Value {
    if is_list {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}
