//! Logical property access over dynamic values.
//!
//! A logical property is a named member of a resolved value: an object key,
//! or an array index written as digits. Host records take part by deriving
//! `serde::Serialize` and converting with [`to_value`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::PathError;

/// Read and write named members of a value.
pub trait LogicalProperties {
    /// Look up a single member by name.
    fn logical_property(&self, name: &str) -> Option<Value>;

    /// Assign a single member by name. Returns false when the member cannot be set.
    fn set_logical_property(&mut self, name: &str, value: Value) -> bool;
}

impl LogicalProperties for Value {
    fn logical_property(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(map) => map.logical_property(name),
            Value::Array(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .cloned(),
            _ => None,
        }
    }

    fn set_logical_property(&mut self, name: &str, value: Value) -> bool {
        match self {
            Value::Object(map) => map.set_logical_property(name, value),
            Value::Array(items) => match name.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

impl LogicalProperties for Map<String, Value> {
    fn logical_property(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn set_logical_property(&mut self, name: &str, value: Value) -> bool {
        if name.is_empty() {
            return false;
        }
        self.insert(name.to_string(), value);
        true
    }
}

/// Convert any serializable record into a dynamic value.
///
/// Fails for records JSON cannot represent, such as maps with non-string keys.
pub fn to_value<T: Serialize + ?Sized>(record: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(record)
}

/// Walk `segments` starting from `root`.
pub fn resolve_path<S: AsRef<str>>(root: &Value, segments: &[S]) -> Result<Value, PathError> {
    let mut current = root.clone();
    for segment in segments {
        let segment = segment.as_ref();
        current = current
            .logical_property(segment)
            .ok_or_else(|| path_error(segment, segments))?;
    }
    Ok(current)
}

/// Walk to the parent of the last segment and assign it.
pub fn assign_path<S: AsRef<str>>(
    root: &mut Value,
    segments: &[S],
    value: Value,
) -> Result<(), PathError> {
    let Some((last, parents)) = segments.split_last() else {
        return Err(PathError {
            segment: String::new(),
            path: String::new(),
        });
    };

    let mut current = root;
    for segment in parents {
        let segment = segment.as_ref();
        current = child_mut(current, segment).ok_or_else(|| path_error(segment, segments))?;
    }

    if current.set_logical_property(last.as_ref(), value) {
        Ok(())
    } else {
        Err(path_error(last.as_ref(), segments))
    }
}

fn child_mut<'v>(value: &'v mut Value, name: &str) -> Option<&'v mut Value> {
    match value {
        Value::Object(map) => map.get_mut(name),
        Value::Array(items) => name.parse::<usize>().ok().and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

fn path_error<S: AsRef<str>>(segment: &str, segments: &[S]) -> PathError {
    PathError {
        segment: segment.to_string(),
        path: join_path(segments),
    }
}

pub(crate) fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}

/// Render a resolved value as replacement text.
///
/// `Null` is empty, strings are written raw, everything else is compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Address {
        city: String,
        zip: u32,
    }

    #[derive(Serialize)]
    struct Customer {
        name: String,
        address: Address,
        tags: Vec<String>,
    }

    fn customer() -> Value {
        to_value(&Customer {
            name: "Ada".into(),
            address: Address {
                city: "London".into(),
                zip: 1815,
            },
            tags: vec!["vip".into(), "early".into()],
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_record_path() {
        let value = customer();
        assert_eq!(resolve_path(&value, &["address", "city"]).unwrap(), json!("London"));
        assert_eq!(resolve_path(&value, &["tags", "1"]).unwrap(), json!("early"));
    }

    #[test]
    fn test_empty_path_returns_root() {
        let value = json!(42);
        let empty: [&str; 0] = [];
        assert_eq!(resolve_path(&value, &empty).unwrap(), json!(42));
    }

    #[test]
    fn test_failed_hop_names_segment() {
        let value = customer();
        let err = resolve_path(&value, &["address", "street"]).unwrap_err();
        assert_eq!(err.segment, "street");
        assert_eq!(err.path, "address.street");

        let err = resolve_path(&value, &["name", "first"]).unwrap_err();
        assert_eq!(err.segment, "first");
    }

    #[test]
    fn test_assign_nested() {
        let mut value = customer();
        assign_path(&mut value, &["address", "zip"], json!(2000)).unwrap();
        assert_eq!(value["address"]["zip"], json!(2000));

        assign_path(&mut value, &["tags", "0"], json!("gold")).unwrap();
        assert_eq!(value["tags"][0], json!("gold"));
    }

    #[test]
    fn test_assign_through_missing_parent_fails() {
        let mut value = customer();
        let err = assign_path(&mut value, &["billing", "zip"], json!(1)).unwrap_err();
        assert_eq!(err.segment, "billing");

        assert!(assign_path(&mut value, &["tags", "9"], json!("x")).is_err());
    }

    #[test]
    fn test_unrepresentable_record_is_an_error() {
        #[derive(Serialize)]
        struct Grid {
            cells: HashMap<(i32, i32), String>,
        }

        let grid = Grid {
            cells: HashMap::from([((0, 1), "x".to_string())]),
        };
        assert!(to_value(&grid).is_err());
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&Value::Null), "");
        assert_eq!(stringify(&json!("raw")), "raw");
        assert_eq!(stringify(&json!(3.5)), "3.5");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
