// src/store/pipeline.rs

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};

use super::query::Filter;

pub type Pipeline = Vec<Stage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `asc` sorts ascending; any other value sorts descending.
    pub fn from_param(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    fn as_i32(self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

/// One declarative aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    /// Case-insensitive term search. Matches when any term occurs in any of `paths`.
    Search { query: String, paths: Vec<String> },
    Lookup(Lookup),
    /// Flattens an array field into one row per element; rows with no elements are dropped.
    Unwind(String),
    AddFields(Vec<(String, Expr)>),
    Project(Projection),
    Sort(Vec<(String, SortOrder)>),
    Skip(u64),
    Limit(u64),
    /// Replaces the stream with a single `{field: n}` row, or no row when `n` is zero.
    Count(String),
}

/// Left outer join against another collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
    pub pipeline: Pipeline,
}

impl Lookup {
    pub fn new(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
            pipeline: Vec::new(),
        }
    }

    /// Stages run over the joined documents before they are attached.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Computed-field expressions. Paths are evaluated against the current row.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Value),
    /// Length of the array at the path; zero when absent.
    Size(String),
    /// Whether `value` is a member of the array at `path`.
    Contains { value: Value, path: String },
    /// First element of the array at the path; absent when the array is empty.
    First(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Nested(Projection),
    Computed(Expr),
}

/// Allow-list projection. `_id` is kept unless `without_id` is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub fields: Vec<(String, ProjectField)>,
    pub exclude_id: bool,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), ProjectField::Include));
        self
    }

    pub fn include_all<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields.into_iter().fold(self, |p, f| p.include(f))
    }

    pub fn nested(mut self, field: impl Into<String>, inner: Projection) -> Self {
        self.fields.push((field.into(), ProjectField::Nested(inner)));
        self
    }

    pub fn computed(mut self, field: impl Into<String>, expr: Expr) -> Self {
        self.fields.push((field.into(), ProjectField::Computed(expr)));
        self
    }

    pub fn without_id(mut self) -> Self {
        self.exclude_id = true;
        self
    }

    pub fn has_computed(&self) -> bool {
        self.fields
            .iter()
            .any(|(_, kind)| matches!(kind, ProjectField::Computed(_)))
    }

    pub fn allows(&self, field: &str) -> bool {
        (field == "_id" && !self.exclude_id) || self.fields.iter().any(|(f, _)| f == field)
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        if self.exclude_id {
            body.insert("_id".into(), json!(0));
        }
        for (field, kind) in &self.fields {
            let value = match kind {
                ProjectField::Include => json!(1),
                ProjectField::Nested(inner) => inner.to_json(),
                ProjectField::Computed(expr) => expr.to_json(),
            };
            body.insert(field.clone(), value);
        }
        Value::Object(body)
    }
}

impl Expr {
    fn to_json(&self) -> Value {
        match self {
            Expr::Field(path) => json!(format!("${}", path)),
            Expr::Literal(value) => json!({ "$literal": value }),
            Expr::Size(path) => json!({ "$size": format!("${}", path) }),
            Expr::Contains { value, path } => json!({
                "$cond": { "if": { "$in": [value, format!("${}", path)] }, "then": true, "else": false }
            }),
            Expr::First(path) => json!({ "$first": format!("${}", path) }),
        }
    }
}

impl Stage {
    /// Canonical document-store rendering, used for logging.
    pub fn to_json(&self) -> Value {
        match self {
            Stage::Match(filter) => json!({ "$match": filter.to_json() }),
            Stage::Search { query, paths } => json!({
                "$search": { "text": { "query": query, "path": paths } }
            }),
            Stage::Lookup(lookup) => json!({
                "$lookup": {
                    "from": lookup.from,
                    "localField": lookup.local_field,
                    "foreignField": lookup.foreign_field,
                    "as": lookup.as_field,
                    "pipeline": to_json(&lookup.pipeline),
                }
            }),
            Stage::Unwind(path) => json!({ "$unwind": format!("${}", path) }),
            Stage::AddFields(fields) => {
                let body: Map<String, Value> = fields
                    .iter()
                    .map(|(field, expr)| (field.clone(), expr.to_json()))
                    .collect();
                json!({ "$addFields": body })
            }
            Stage::Project(projection) => json!({ "$project": projection.to_json() }),
            Stage::Sort(keys) => {
                let body: Map<String, Value> = keys
                    .iter()
                    .map(|(field, order)| (field.clone(), json!(order.as_i32())))
                    .collect();
                json!({ "$sort": body })
            }
            Stage::Skip(n) => json!({ "$skip": n }),
            Stage::Limit(n) => json!({ "$limit": n }),
            Stage::Count(field) => json!({ "$count": field }),
        }
    }
}

pub fn to_json(pipeline: &[Stage]) -> Value {
    Value::Array(pipeline.iter().map(Stage::to_json).collect())
}

/// Every collection a pipeline joins against, including nested lookups.
pub fn referenced_collections(pipeline: &[Stage], into: &mut BTreeSet<String>) {
    for stage in pipeline {
        if let Stage::Lookup(lookup) = stage {
            into.insert(lookup.from.clone());
            referenced_collections(&lookup.pipeline, into);
        }
    }
}
