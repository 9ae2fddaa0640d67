// src/store/eval.rs

//! In-process execution of aggregation pipelines over JSON documents.

use std::{cmp::Ordering, collections::HashMap};

use serde_json::Value;

use super::{
    Document,
    pipeline::{Expr, Lookup, ProjectField, Projection, SortOrder, Stage},
};

/// Read access to the collections a pipeline may join against.
pub trait CollectionSource {
    fn collection(&self, name: &str) -> &[Document];
}

impl CollectionSource for HashMap<String, Vec<Document>> {
    fn collection(&self, name: &str) -> &[Document] {
        self.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Runs `pipeline` over `input`, resolving lookups through `source`.
pub fn run_pipeline(
    pipeline: &[Stage],
    input: Vec<Document>,
    source: &dyn CollectionSource,
) -> Vec<Document> {
    pipeline
        .iter()
        .fold(input, |rows, stage| run_stage(stage, rows, source))
}

fn run_stage(stage: &Stage, rows: Vec<Document>, source: &dyn CollectionSource) -> Vec<Document> {
    match stage {
        Stage::Match(filter) => rows.into_iter().filter(|d| filter.matches(d)).collect(),
        Stage::Search { query, paths } => {
            let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
            if terms.is_empty() {
                return rows;
            }
            rows.into_iter()
                .filter(|d| search_matches(d, &terms, paths))
                .collect()
        }
        Stage::Lookup(lookup) => rows
            .into_iter()
            .map(|d| join(d, lookup, source))
            .collect(),
        Stage::Unwind(path) => rows.into_iter().flat_map(|d| unwind(d, path)).collect(),
        Stage::AddFields(fields) => rows
            .into_iter()
            .map(|mut d| {
                for (field, expr) in fields {
                    match evaluate(expr, &d) {
                        Some(value) => set_path(&mut d, field, value),
                        None => remove_path(&mut d, field),
                    }
                }
                d
            })
            .collect(),
        Stage::Project(projection) => rows
            .iter()
            .map(|d| project(d, projection, d))
            .collect(),
        Stage::Sort(keys) => {
            let mut rows = rows;
            // `sort_by` is stable: equal keys keep their incoming order.
            rows.sort_by(|a, b| {
                keys.iter()
                    .map(|(field, order)| {
                        let left = resolve_path(a, field).unwrap_or(Value::Null);
                        let right = resolve_path(b, field).unwrap_or(Value::Null);
                        let ord = compare_values(&left, &right);
                        match order {
                            SortOrder::Asc => ord,
                            SortOrder::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
            rows
        }
        Stage::Skip(n) => rows.into_iter().skip(to_usize(*n)).collect(),
        Stage::Limit(n) => rows.into_iter().take(to_usize(*n)).collect(),
        Stage::Count(field) => {
            if rows.is_empty() {
                return Vec::new();
            }
            let mut counted = Document::new();
            counted.insert(field.clone(), Value::from(rows.len() as u64));
            vec![counted]
        }
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Resolves a dotted path. Traversing an array maps the remaining path over its elements.
pub fn resolve_path(doc: &Document, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?.clone();
    for segment in segments {
        current = step(&current, segment)?;
    }
    Some(current)
}

fn step(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(key).cloned(),
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(|item| step(item, key)).collect(),
        )),
        _ => None,
    }
}

fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if !entry.is_object() {
                *entry = Value::Object(Document::new());
            }
            if let Value::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn search_matches(doc: &Document, terms: &[String], paths: &[String]) -> bool {
    paths.iter().any(|path| match resolve_path(doc, path) {
        Some(Value::String(text)) => {
            let text = text.to_lowercase();
            terms.iter().any(|term| text.contains(term.as_str()))
        }
        _ => false,
    })
}

fn join(mut doc: Document, lookup: &Lookup, source: &dyn CollectionSource) -> Document {
    let local = resolve_path(&doc, &lookup.local_field);
    let matched: Vec<Document> = match local {
        None | Some(Value::Null) => Vec::new(),
        Some(local) => source
            .collection(&lookup.from)
            .iter()
            .filter(|foreign| {
                resolve_path(foreign, &lookup.foreign_field)
                    .is_some_and(|value| keys_match(&local, &value))
            })
            .cloned()
            .collect(),
    };

    let joined = run_pipeline(&lookup.pipeline, matched, source);
    set_path(
        &mut doc,
        &lookup.as_field,
        Value::Array(joined.into_iter().map(Value::Object).collect()),
    );
    doc
}

fn keys_match(local: &Value, foreign: &Value) -> bool {
    match (local, foreign) {
        (Value::Array(items), _) => items.iter().any(|item| keys_match(item, foreign)),
        (_, Value::Array(items)) => items.contains(local),
        _ => local == foreign,
    }
}

fn unwind(doc: Document, path: &str) -> Vec<Document> {
    match resolve_path(&doc, path) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| {
                let mut row = doc.clone();
                set_path(&mut row, path, item);
                row
            })
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => vec![doc],
    }
}

/// Evaluates an expression against a row. `None` means the field is absent.
pub fn evaluate(expr: &Expr, doc: &Document) -> Option<Value> {
    match expr {
        Expr::Field(path) => resolve_path(doc, path),
        Expr::Literal(value) => Some(value.clone()),
        Expr::Size(path) => {
            let len = match resolve_path(doc, path) {
                Some(Value::Array(items)) => items.len(),
                _ => 0,
            };
            Some(Value::from(len as u64))
        }
        Expr::Contains { value, path } => {
            let found = match resolve_path(doc, path) {
                Some(Value::Array(items)) => items.contains(value),
                _ => false,
            };
            Some(Value::Bool(found))
        }
        Expr::First(path) => match resolve_path(doc, path)? {
            Value::Array(items) => items.into_iter().next(),
            other => Some(other),
        },
    }
}

fn project(doc: &Document, projection: &Projection, root: &Document) -> Document {
    let mut out = Document::new();
    if !projection.exclude_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id".to_string(), id.clone());
        }
    }

    for (field, kind) in &projection.fields {
        let value = match kind {
            ProjectField::Include => doc.get(field).cloned(),
            ProjectField::Nested(inner) => match doc.get(field) {
                Some(Value::Object(map)) => Some(Value::Object(project(map, inner, root))),
                Some(Value::Array(items)) => Some(Value::Array(
                    items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(|item| Value::Object(project(item, inner, root)))
                        .collect(),
                )),
                // Scalar or missing fields are rebuilt from the computed entries alone.
                _ if inner.has_computed() => {
                    Some(Value::Object(project(&Document::new(), inner, root)))
                }
                _ => None,
            },
            // Computed paths resolve from the top-level row, even inside nested projections.
            ProjectField::Computed(expr) => evaluate(expr, root),
        };
        if let Some(value) = value {
            out.insert(field.clone(), value);
        }
    }
    out
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order across JSON values: null < numbers < strings < objects < arrays < booleans.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
