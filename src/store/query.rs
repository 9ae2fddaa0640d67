// src/store/query.rs

use serde_json::{Map, Value, json};

use super::{Document, eval::resolve_path, now_timestamp};
use crate::models::id::ObjectId;

/// Equality filter over document fields.
///
/// Dotted paths traverse nested objects and arrays. An `Eq` on a path that resolves to an array
/// matches when the array contains the expected value.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn id(id: &ObjectId) -> Self {
        Filter::eq("_id", *id)
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All => other,
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Filter matching documents whose fields equal every field of `pair`.
    pub fn from_pair(pair: &Document) -> Self {
        Filter::And(
            pair.iter()
                .map(|(field, value)| Filter::Eq(field.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, expected) => match resolve_path(doc, path) {
                Some(found) => value_matches(&found, expected),
                None => expected.is_null(),
            },
            Filter::And(parts) => parts.iter().all(|f| f.matches(doc)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(doc)),
        }
    }

    /// JSON containment document equivalent to this filter, when one exists.
    ///
    /// `Or` has no containment form, and neither do two conflicting equalities on one path.
    /// Equality with `null` also matches a missing field, which containment cannot express.
    /// Containment of a scalar does not match array membership below the top level, so the
    /// result is exact only for filters on scalar fields.
    pub fn containment(&self) -> Option<Value> {
        match self {
            Filter::All => Some(Value::Object(Map::new())),
            Filter::Eq(_, Value::Null) => None,
            Filter::Eq(path, value) => {
                let mut nested = value.clone();
                for segment in path.rsplit('.') {
                    let mut map = Map::new();
                    map.insert(segment.to_string(), nested);
                    nested = Value::Object(map);
                }
                Some(nested)
            }
            Filter::And(parts) => {
                let mut merged = Value::Object(Map::new());
                for part in parts {
                    merge_containment(&mut merged, part.containment()?)?;
                }
                Some(merged)
            }
            Filter::Or(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Filter::All => json!({}),
            Filter::Eq(path, value) => json!({ path: value }),
            Filter::And(parts) => json!({ "$and": parts.iter().map(Filter::to_json).collect::<Vec<_>>() }),
            Filter::Or(parts) => json!({ "$or": parts.iter().map(Filter::to_json).collect::<Vec<_>>() }),
        }
    }
}

fn value_matches(found: &Value, expected: &Value) -> bool {
    if found == expected {
        return true;
    }
    match found {
        Value::Array(items) => items.iter().any(|item| item == expected),
        _ => false,
    }
}

fn merge_containment(target: &mut Value, addition: Value) -> Option<()> {
    match (target, addition) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_containment(existing, value)?;
                    }
                    Some(existing) if *existing == value => {}
                    Some(_) => return None,
                    None => {
                        into.insert(key, value);
                    }
                }
            }
            Some(())
        }
        _ => None,
    }
}

/// Field-level update operators applied by `find_by_id_and_update`.
///
/// Every applied update also refreshes `updatedAt`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Vec<(String, Value)>,
    inc: Vec<(String, i64)>,
    add_to_set: Vec<(String, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.inc.push((field.into(), by));
        self
    }

    pub fn add_to_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_to_set.push((field.into(), value.into()));
        self
    }

    pub fn apply(&self, doc: &mut Document) {
        for (field, value) in &self.set {
            doc.insert(field.clone(), value.clone());
        }

        for (field, by) in &self.inc {
            let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
            doc.insert(field.clone(), Value::from(current + by));
        }

        for (field, value) in &self.add_to_set {
            match doc.get_mut(field) {
                Some(Value::Array(items)) => {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
                _ => {
                    doc.insert(field.clone(), Value::Array(vec![value.clone()]));
                }
            }
        }

        doc.insert("updatedAt".to_string(), Value::String(now_timestamp()));
    }

    pub fn to_json(&self) -> Value {
        let mut ops = Map::new();
        if !self.set.is_empty() {
            ops.insert("$set".into(), Value::Object(self.set.iter().cloned().collect()));
        }
        if !self.inc.is_empty() {
            let inc = self.inc.iter().map(|(f, n)| (f.clone(), Value::from(*n)));
            ops.insert("$inc".into(), Value::Object(inc.collect()));
        }
        if !self.add_to_set.is_empty() {
            ops.insert("$addToSet".into(), Value::Object(self.add_to_set.iter().cloned().collect()));
        }
        Value::Object(ops)
    }
}
