//! Paginated ingestion from the remote time-series store.
//!
//! [`ReadingStore`] is the seam between the pagination loop and the store;
//! [`DynamoStore`] is the production implementation.

mod dynamo;

pub use dynamo::DynamoStore;

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::error::PipelineResult;
use crate::parser::flatten_rowdata;
use crate::records::RawRecord;

/// Partition value and sort-key range of one query, in the store's text format.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub partition_value: String,
    pub start: String,
    pub end: String,
}

impl From<&SourceConfig> for RangeQuery {
    fn from(source: &SourceConfig) -> Self {
        RangeQuery {
            partition_value: source.partition_value.clone(),
            start: source.start.clone(),
            end: source.end.clone(),
        }
    }
}

/// A stored item reduced to the two attributes the pipeline reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreItem {
    pub datetime: Option<String>,
    pub rowdata: Option<String>,
}

/// One page of results and the cursor to the next, if any.
#[derive(Debug)]
pub struct Page<C> {
    pub items: Vec<StoreItem>,
    pub next: Option<C>,
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Opaque continuation token handed back by the store.
    type Cursor: Send + Sync;

    async fn query_page(
        &self,
        query: &RangeQuery,
        cursor: Option<Self::Cursor>,
    ) -> PipelineResult<Page<Self::Cursor>>;
}

/// Follows continuation cursors until the store reports none, sleeping
/// `page_delay` between requests.
#[tracing::instrument(skip(store), fields(partition = %query.partition_value))]
pub async fn fetch_all<S: ReadingStore>(
    store: &S,
    query: &RangeQuery,
    page_delay: Duration,
) -> PipelineResult<Vec<StoreItem>> {
    info!(start = %query.start, end = %query.end, "Fetching items");

    let mut items = Vec::new();
    let mut cursor = None;
    let mut pages = 0usize;

    loop {
        let page = store.query_page(query, cursor).await?;
        pages += 1;
        items.extend(page.items);
        info!(page = pages, total = items.len(), "Page fetched");

        match page.next {
            Some(next) => {
                cursor = Some(next);
                tokio::time::sleep(page_delay).await;
            }
            None => break,
        }
    }

    info!(pages, items = items.len(), "Fetch complete");
    Ok(items)
}

/// Turns stored items into one raw record per tag detection.
///
/// Items without a timestamp or payload, with a payload that is not JSON, or
/// without a node id are skipped with a warning.
pub fn flatten_items(items: &[StoreItem]) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for item in items {
        let (Some(datetime), Some(rowdata)) = (item.datetime.as_deref(), item.rowdata.as_deref())
        else {
            warn!(?item, "Item missing datetime or rowdata, skipping");
            skipped += 1;
            continue;
        };

        match flatten_rowdata(datetime, rowdata) {
            Ok(rows) => records.extend(rows),
            Err(e) => {
                warn!(datetime, error = %e, "Unreadable rowdata, skipping");
                skipped += 1;
            }
        }
    }

    info!(records = records.len(), skipped, "Items flattened");
    records
}

/// Fetches every item in range and flattens it.
pub async fn fetch_readings<S: ReadingStore>(
    store: &S,
    source: &SourceConfig,
) -> PipelineResult<Vec<RawRecord>> {
    let query = RangeQuery::from(source);
    let items = fetch_all(store, &query, Duration::from_millis(source.page_delay_ms)).await?;
    Ok(flatten_items(&items))
}
