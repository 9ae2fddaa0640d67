// src/pagination.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{
    Document, DocumentStore, StoreError,
    pipeline::{Pipeline, Stage},
};

const COUNT_FIELD: &str = "totalItems";

/// Raw `?page=&limit=` query values. Kept as strings so malformed input falls back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn params(&self) -> PageParams {
        PageParams::new(self.page.as_deref(), self.limit.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub limit: u64,
}

impl PageParams {
    pub const DEFAULT_PAGE: u64 = 1;
    pub const DEFAULT_LIMIT: u64 = 10;

    /// Missing, non-numeric and non-positive values fall back to page 1, limit 10.
    pub fn new(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: parse_positive(page).unwrap_or(Self::DEFAULT_PAGE),
            limit: parse_positive(limit).unwrap_or(Self::DEFAULT_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|v| *v >= 1)
}

/// Page envelope returned by paginated listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, params: PageParams, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(params.limit);
        Self {
            items,
            page: params.page,
            limit: params.limit,
            total_items,
            total_pages,
            has_next: params.page < total_pages,
            has_prev: params.page > 1,
        }
    }
}

/// Runs `pipeline` twice, concurrently: once windowed to the requested page, once counted.
///
/// The pipeline must end in a deterministic sort for pages to be disjoint.
pub async fn paginate(
    store: &dyn DocumentStore,
    collection: &str,
    pipeline: Pipeline,
    params: PageParams,
) -> Result<Page<Document>, StoreError> {
    let mut windowed = pipeline.clone();
    windowed.push(Stage::Skip(params.skip()));
    windowed.push(Stage::Limit(params.limit));

    let mut counted = pipeline;
    counted.push(Stage::Count(COUNT_FIELD.to_string()));

    let (items, count_rows) = tokio::try_join!(
        store.aggregate(collection, &windowed),
        store.aggregate(collection, &counted),
    )?;

    let total_items = count_rows
        .first()
        .and_then(|row| row.get(COUNT_FIELD))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok(Page::new(items, params, total_items))
}
