use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use tracing::debug;

use super::{Page, RangeQuery, ReadingStore, StoreItem};
use crate::config::SourceConfig;
use crate::error::{PipelineError, PipelineResult};

/// Reads raw detections from a DynamoDB table keyed by site and timestamp.
///
/// Both keys are strings; the sort key holds timestamps in a format that
/// sorts lexicographically, so `BETWEEN` selects a time range.
pub struct DynamoStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
    partition_attribute: String,
    sort_attribute: String,
    payload_attribute: String,
}

impl DynamoStore {
    /// Creates a store from the ambient AWS configuration (env vars, `.env`,
    /// instance profile) already loaded by `aws_config::load_from_env`.
    pub fn new(config: &aws_config::SdkConfig, source: &SourceConfig) -> Self {
        Self {
            client: aws_sdk_dynamodb::Client::new(config),
            table_name: source.table_name.clone(),
            partition_attribute: source.partition_attribute.clone(),
            sort_attribute: source.sort_attribute.clone(),
            payload_attribute: source.payload_attribute.clone(),
        }
    }

    fn to_item(&self, raw: &HashMap<String, AttributeValue>) -> StoreItem {
        let text = |name: &str| raw.get(name).and_then(|v| v.as_s().ok()).cloned();
        StoreItem {
            datetime: text(&self.sort_attribute),
            rowdata: text(&self.payload_attribute),
        }
    }
}

#[async_trait]
impl ReadingStore for DynamoStore {
    type Cursor = HashMap<String, AttributeValue>;

    async fn query_page(
        &self,
        query: &RangeQuery,
        cursor: Option<Self::Cursor>,
    ) -> PipelineResult<Page<Self::Cursor>> {
        let resp = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("#pk = :pk AND #dt BETWEEN :start AND :end")
            .expression_attribute_names("#pk", &self.partition_attribute)
            .expression_attribute_names("#dt", &self.sort_attribute)
            .expression_attribute_values(":pk", AttributeValue::S(query.partition_value.clone()))
            .expression_attribute_values(":start", AttributeValue::S(query.start.clone()))
            .expression_attribute_values(":end", AttributeValue::S(query.end.clone()))
            .set_exclusive_start_key(cursor)
            .send()
            .await
            .map_err(|e| {
                PipelineError::Remote(format!(
                    "query on '{}' failed: {}",
                    self.table_name,
                    DisplayErrorContext(&e)
                ))
            })?;

        let raw_items = resp.items.unwrap_or_default();
        debug!(table = %self.table_name, count = raw_items.len(), "Query page received");

        Ok(Page {
            items: raw_items.iter().map(|raw| self.to_item(raw)).collect(),
            next: resp.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }
}
