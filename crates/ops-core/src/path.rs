//! Dotted parameter paths over untyped request documents.
//!
//! Meta-engines address scalars inside a solver request with expressions
//! like `jobs[J1].tasks[cut].duration`: a bracketed segment navigates a
//! list under `field` and selects the element whose id field matches the
//! bracket contents. The id field is found by probing a fixed table of
//! known id names, which keeps the resolver generic over all three request
//! families.
//!
//! Writes always target an owned document (scenario engines deep-copy the
//! base request first) and preserve the scalar's integer-ness: an integer
//! stays an integer (rounded, floored at 0), a float is rounded to two
//! decimals with the same floor.

use serde_json::Value;

use crate::{OpsError, OpsResult};

/// Id fields probed when resolving a bracketed segment, one per list kind.
pub const ID_FIELDS: [&str; 7] = [
    "job_id",
    "task_id",
    "machine_id",
    "location_id",
    "vehicle_id",
    "item_id",
    "bin_id",
];

/// One parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Plain object field access.
    Field(String),
    /// List access: `field[id]` selects the element whose id field equals `id`.
    Keyed { field: String, id: String },
}

/// Parse a dotted path into segments.
pub fn parse_path(path: &str) -> OpsResult<Vec<Segment>> {
    if path.is_empty() {
        return Err(OpsError::Path("empty parameter path".into()));
    }
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return Err(OpsError::Path(format!("empty segment in path '{path}'")));
        }
        match (part.find('['), part.rfind(']')) {
            (Some(open), Some(close)) if close == part.len() - 1 && open < close => {
                let field = &part[..open];
                let id = &part[open + 1..close];
                if field.is_empty() || id.is_empty() {
                    return Err(OpsError::Path(format!(
                        "malformed segment '{part}' in path '{path}'"
                    )));
                }
                segments.push(Segment::Keyed {
                    field: field.to_string(),
                    id: id.to_string(),
                });
            }
            (None, None) => segments.push(Segment::Field(part.to_string())),
            _ => {
                return Err(OpsError::Path(format!(
                    "malformed segment '{part}' in path '{path}'"
                )));
            }
        }
    }
    Ok(segments)
}

fn select_keyed<'a>(list: &'a Value, field: &str, id: &str) -> OpsResult<&'a Value> {
    let arr = list.as_array().ok_or_else(|| {
        OpsError::Path(format!("'{field}' is not a list, cannot select [{id}]"))
    })?;
    for item in arr {
        if let Some(obj) = item.as_object() {
            for id_field in ID_FIELDS {
                if obj.get(id_field).and_then(Value::as_str) == Some(id) {
                    return Ok(item);
                }
            }
        }
    }
    Err(OpsError::Path(format!("id '{id}' not found in '{field}'")))
}

fn select_keyed_mut<'a>(list: &'a mut Value, field: &str, id: &str) -> OpsResult<&'a mut Value> {
    let arr = list.as_array_mut().ok_or_else(|| {
        OpsError::Path(format!("'{field}' is not a list, cannot select [{id}]"))
    })?;
    for item in arr.iter_mut() {
        let matches = item.as_object().is_some_and(|obj| {
            ID_FIELDS
                .iter()
                .any(|id_field| obj.get(*id_field).and_then(Value::as_str) == Some(id))
        });
        if matches {
            return Ok(item);
        }
    }
    Err(OpsError::Path(format!("id '{id}' not found in '{field}'")))
}

/// Resolve a path to the value it addresses.
pub fn resolve<'a>(doc: &'a Value, path: &str) -> OpsResult<&'a Value> {
    let mut current = doc;
    for segment in parse_path(path)? {
        match segment {
            Segment::Field(field) => {
                current = current
                    .get(&field)
                    .ok_or_else(|| OpsError::Path(format!("field '{field}' not found")))?;
            }
            Segment::Keyed { field, id } => {
                let list = current
                    .get(&field)
                    .ok_or_else(|| OpsError::Path(format!("field '{field}' not found")))?;
                current = select_keyed(list, &field, &id)?;
            }
        }
    }
    Ok(current)
}

/// Resolve a path that must address a numeric scalar.
pub fn resolve_number(doc: &Value, path: &str) -> OpsResult<f64> {
    let value = resolve(doc, path)?;
    value
        .as_f64()
        .ok_or_else(|| OpsError::Path(format!("'{path}' does not address a numeric scalar")))
}

/// Whether the scalar addressed by `path` is an integer in the document.
pub fn is_integer(doc: &Value, path: &str) -> OpsResult<bool> {
    let value = resolve(doc, path)?;
    Ok(value.is_i64() || value.is_u64())
}

/// Coerce an update onto an existing scalar, preserving its integer-ness.
/// Integers round and floor at 0; floats round to 2 decimals with the same
/// floor.
pub fn coerce_like(original: &Value, update: f64) -> Value {
    if original.is_i64() || original.is_u64() {
        Value::from((update.round() as i64).max(0))
    } else {
        let rounded = ((update * 100.0).round() / 100.0).max(0.0);
        Value::from(rounded)
    }
}

/// Set the scalar addressed by `path` to `value`, preserving its type.
///
/// The terminal segment must be a plain field addressing an existing
/// numeric scalar; setting through a bracketed terminal is an error.
pub fn set_number(doc: &mut Value, path: &str, value: f64) -> OpsResult<()> {
    let segments = parse_path(path)?;
    let (last, prefix) = segments
        .split_last()
        .ok_or_else(|| OpsError::Path("empty parameter path".into()))?;
    let field = match last {
        Segment::Field(f) => f,
        Segment::Keyed { .. } => {
            return Err(OpsError::Path(format!(
                "cannot set a value on a list element directly ('{path}')"
            )));
        }
    };

    let mut current = doc;
    for segment in prefix {
        match segment {
            Segment::Field(f) => {
                current = current
                    .get_mut(f)
                    .ok_or_else(|| OpsError::Path(format!("field '{f}' not found")))?;
            }
            Segment::Keyed { field, id } => {
                let list = current
                    .get_mut(field)
                    .ok_or_else(|| OpsError::Path(format!("field '{field}' not found")))?;
                current = select_keyed_mut(list, field, id)?;
            }
        }
    }

    let slot = current
        .get_mut(field)
        .ok_or_else(|| OpsError::Path(format!("field '{field}' not found")))?;
    if !slot.is_number() {
        return Err(OpsError::Path(format!(
            "'{path}' does not address a numeric scalar"
        )));
    }
    *slot = coerce_like(slot, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "jobs": [
                {
                    "job_id": "J1",
                    "due_date": 20,
                    "tasks": [
                        {"task_id": "cut", "duration": 30},
                        {"task_id": "weld", "duration": 15.5}
                    ]
                }
            ],
            "machines": [{"machine_id": "M1", "availability_start": 0}]
        })
    }

    #[test]
    fn test_resolve_nested_keyed() {
        let d = doc();
        assert_eq!(
            resolve_number(&d, "jobs[J1].tasks[cut].duration").unwrap(),
            30.0
        );
        assert_eq!(resolve_number(&d, "jobs[J1].due_date").unwrap(), 20.0);
    }

    #[test]
    fn test_resolve_missing_id() {
        let d = doc();
        let err = resolve(&d, "jobs[J9].due_date").unwrap_err();
        assert!(err.to_string().contains("'J9' not found"));
    }

    #[test]
    fn test_set_preserves_integer_type() {
        let mut d = doc();
        set_number(&mut d, "jobs[J1].tasks[cut].duration", 41.6).unwrap();
        let v = resolve(&d, "jobs[J1].tasks[cut].duration").unwrap();
        assert!(v.is_i64());
        assert_eq!(v.as_i64().unwrap(), 42);
    }

    #[test]
    fn test_set_rounds_float_to_two_decimals() {
        let mut d = doc();
        set_number(&mut d, "jobs[J1].tasks[weld].duration", 17.126).unwrap();
        let v = resolve(&d, "jobs[J1].tasks[weld].duration").unwrap();
        assert_eq!(v.as_f64().unwrap(), 17.13);
    }

    #[test]
    fn test_set_floors_negative_at_zero() {
        let mut d = doc();
        set_number(&mut d, "jobs[J1].due_date", -5.0).unwrap();
        assert_eq!(resolve_number(&d, "jobs[J1].due_date").unwrap(), 0.0);
    }

    #[test]
    fn test_set_through_bracketed_terminal_rejected() {
        let mut d = doc();
        let err = set_number(&mut d, "jobs[J1].tasks[cut]", 1.0).unwrap_err();
        assert!(err.to_string().contains("list element"));
    }

    #[test]
    fn test_non_numeric_terminal_rejected() {
        let d = doc();
        assert!(resolve_number(&d, "jobs[J1].tasks[cut].task_id").is_err());
    }
}
