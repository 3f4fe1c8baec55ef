//! DynamoDB table store
//!
//! Provides `DynamoDbTableStore`, a [`StoreClient`] that keeps each structure
//! in its own DynamoDB table and commits every batch with one
//! `TransactWriteItems` call.

mod convert;
mod expression;
pub mod schema;

use crate::error::{classify_cancellation, classify_service_error, AwsStoreError, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, Delete, KeySchemaElement, KeyType, Put,
    ScalarAttributeType, TableStatus, TransactWriteItem,
};
use aws_sdk_dynamodb::Client;
use aws_smithy_types::timeout::TimeoutConfig;
use cloudtable_core::{
    ContinuationToken, Entity, Operation, OperationKind, Page, PartitionQuery, SealedBatch,
    StoreClient, StoreError, StoreResult,
};
use convert::{entity_to_item, item_to_entity, key_of, key_to_token, token_to_key};
use expression::{is_unsatisfiable, QueryExpression};
use schema::*;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

/// DynamoDB store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamoDbConfig {
    /// AWS region (optional, uses SDK default if not specified)
    pub region: Option<String>,
    /// Optional endpoint override (e.g. LocalStack, DynamoDB Local)
    pub endpoint: Option<String>,
    /// Per-operation timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// How long `create_if_missing` waits for a new table to become active
    pub create_timeout_ms: u64,
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            timeout_ms: None,
            create_timeout_ms: DEFAULT_CREATE_TIMEOUT_MS,
        }
    }
}

impl DynamoDbConfig {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.region, Some(r) if r.trim().is_empty()) {
            return Err(AwsStoreError::invalid_config("region must not be empty"));
        }
        if matches!(&self.endpoint, Some(e) if e.trim().is_empty()) {
            return Err(AwsStoreError::invalid_config("endpoint must not be empty"));
        }
        if self.timeout_ms == Some(0) {
            return Err(AwsStoreError::invalid_config("timeout_ms must be positive"));
        }
        if self.create_timeout_ms == 0 {
            return Err(AwsStoreError::invalid_config(
                "create_timeout_ms must be positive",
            ));
        }
        Ok(())
    }
}

/// DynamoDB-backed table store
///
/// Upserts are unconditional puts that stamp a fresh version tag. Deletes
/// carry a condition: `version_tag` must match the expected tag, or, for the
/// wildcard, the row must exist.
#[derive(Clone)]
pub struct DynamoDbTableStore {
    client: Client,
    create_timeout: Duration,
}

impl Debug for DynamoDbTableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbTableStore")
            .field("create_timeout", &self.create_timeout)
            .finish()
    }
}

impl DynamoDbTableStore {
    /// Create a new DynamoDB store
    ///
    /// Configuration:
    /// - `region`: Override SDK region (uses SDK default if not specified)
    /// - `endpoint`: Override the service endpoint
    /// - `timeout_ms`: Operation timeout in milliseconds
    pub fn new(sdk_config: &aws_config::SdkConfig, config: DynamoDbConfig) -> Result<Self> {
        config.validate()?;
        if config.region.is_none() && sdk_config.region().is_none() {
            return Err(AwsStoreError::MissingRegion);
        }

        // Inherit HTTP client, retry config and credentials from the SdkConfig
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            create_timeout: Duration::from_millis(config.create_timeout_ms),
        })
    }

    /// Create from a pre-built client (for testing)
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            create_timeout: Duration::from_millis(DEFAULT_CREATE_TIMEOUT_MS),
        }
    }

    /// Current status of the table, `None` if it does not exist
    async fn table_status(&self, structure: &str) -> StoreResult<Option<TableStatus>> {
        match self.client.describe_table().table_name(structure).send().await {
            Ok(response) => Ok(Some(
                response
                    .table()
                    .and_then(|t| t.table_status())
                    .cloned()
                    .unwrap_or(TableStatus::Creating),
            )),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(map_sdk_error("DescribeTable", structure, err)),
        }
    }

    async fn create_table(&self, structure: &str) -> StoreResult<()> {
        let result = self
            .client
            .create_table()
            .table_name(structure)
            .billing_mode(BillingMode::PayPerRequest)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ATTR_PARTITION_KEY)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(build_error)?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ATTR_ROW_KEY)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(build_error)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ATTR_PARTITION_KEY)
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(build_error)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ATTR_ROW_KEY)
                    .key_type(KeyType::Range)
                    .build()
                    .map_err(build_error)?,
            )
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(table = structure, "Created DynamoDB table");
                Ok(())
            }
            // Someone else is creating it
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_in_use_exception()) =>
            {
                Ok(())
            }
            Err(err) => Err(map_sdk_error("CreateTable", structure, err)),
        }
    }

    /// Poll until the table is active; `false` on timeout
    async fn wait_until_active(&self, structure: &str) -> StoreResult<bool> {
        let deadline = Instant::now() + self.create_timeout;
        loop {
            if matches!(
                self.table_status(structure).await?,
                Some(TableStatus::Active)
            ) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    table = structure,
                    timeout_ms = self.create_timeout.as_millis() as u64,
                    "Table did not become active in time"
                );
                return Ok(false);
            }
            sleep(Duration::from_millis(CREATE_POLL_INTERVAL_MS)).await;
        }
    }

    fn write_item(structure: &str, op: &Operation) -> StoreResult<TransactWriteItem> {
        match op.kind() {
            OperationKind::Upsert => {
                let item = entity_to_item(op.entity(), &Uuid::new_v4().to_string())?;
                let put = Put::builder()
                    .table_name(structure)
                    .set_item(Some(item))
                    .build()
                    .map_err(build_error)?;
                Ok(TransactWriteItem::builder().put(put).build())
            }
            OperationKind::Delete => {
                let builder = Delete::builder()
                    .table_name(structure)
                    .set_key(Some(key_of(op.partition_key(), op.row_key())));
                let builder = match op.expected_version() {
                    Some(tag) if !op.is_unconditional() => builder
                        .condition_expression("#vt = :vt")
                        .expression_attribute_names("#vt", ATTR_VERSION_TAG)
                        .expression_attribute_values(":vt", AttributeValue::S(tag.to_string())),
                    _ => builder
                        .condition_expression("attribute_exists(#pk)")
                        .expression_attribute_names("#pk", ATTR_PARTITION_KEY),
                };
                let delete = builder.build().map_err(build_error)?;
                Ok(TransactWriteItem::builder().delete(delete).build())
            }
        }
    }
}

fn build_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::rejected(format!("invalid DynamoDB request: {err}"))
}

/// Map an SDK error onto a [`StoreError`]
fn map_sdk_error<E>(operation: &str, structure: &str, err: SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + Debug,
{
    match &err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            let code = service_err.err().code();
            let message = format!(
                "DynamoDB {operation} on '{structure}' failed (HTTP {status}): {}: {}",
                code.unwrap_or("unknown"),
                service_err.err().message().unwrap_or_default()
            );
            classify_service_error(code, status, message)
        }
        SdkError::TimeoutError(_) => {
            StoreError::unavailable(format!("DynamoDB {operation} on '{structure}' timed out"))
        }
        SdkError::DispatchFailure(_) => StoreError::unavailable(format!(
            "DynamoDB connection error during {operation} on '{structure}': {err:?}"
        )),
        SdkError::ConstructionFailure(_) => StoreError::rejected(format!(
            "DynamoDB {operation} request for '{structure}' could not be built: {err:?}"
        )),
        _ => StoreError::unavailable(format!(
            "DynamoDB {operation} on '{structure}' failed: {err:?}"
        )),
    }
}

#[async_trait]
impl StoreClient for DynamoDbTableStore {
    fn max_batch_operations(&self) -> usize {
        DYNAMODB_TRANSACT_LIMIT
    }

    async fn exists(&self, structure: &str) -> StoreResult<bool> {
        Ok(matches!(
            self.table_status(structure).await?,
            Some(status) if status != TableStatus::Deleting
        ))
    }

    async fn create_if_missing(&self, structure: &str) -> StoreResult<bool> {
        match self.table_status(structure).await? {
            Some(TableStatus::Active) => return Ok(true),
            Some(TableStatus::Deleting) => {
                return Err(StoreError::unavailable(format!(
                    "table '{structure}' is being deleted"
                )))
            }
            Some(_) => {}
            None => self.create_table(structure).await?,
        }
        self.wait_until_active(structure).await
    }

    async fn delete_if_exists(&self, structure: &str) -> StoreResult<bool> {
        match self.client.delete_table().table_name(structure).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(err) => Err(map_sdk_error("DeleteTable", structure, err)),
        }
    }

    async fn commit_batch(&self, structure: &str, batch: &SealedBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if batch.len() > DYNAMODB_TRANSACT_LIMIT {
            return Err(StoreError::rejected(format!(
                "batch holds {} operations, DynamoDB allows {DYNAMODB_TRANSACT_LIMIT}",
                batch.len()
            )));
        }

        let items = batch
            .iter()
            .map(|op| Self::write_item(structure, op))
            .collect::<StoreResult<Vec<_>>>()?;

        match self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
        {
            Ok(_) => {
                tracing::debug!(
                    table = structure,
                    partition_key = batch.partition_key().unwrap_or_default(),
                    operations = batch.len(),
                    "Committed transaction"
                );
                Ok(())
            }
            Err(err) => {
                if let Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) =
                    err.as_service_error()
                {
                    let message = format!(
                        "DynamoDB transaction on '{structure}' cancelled: {}",
                        cancelled.message().unwrap_or_default()
                    );
                    return Err(classify_cancellation(
                        cancelled.cancellation_reasons().iter().map(|r| r.code()),
                        message,
                    ));
                }
                Err(map_sdk_error("TransactWriteItems", structure, err))
            }
        }
    }

    async fn fetch_page(
        &self,
        structure: &str,
        query: &PartitionQuery,
        continuation: Option<&ContinuationToken>,
    ) -> StoreResult<Page> {
        if is_unsatisfiable(query) {
            return Ok(Page::empty());
        }

        let expr = QueryExpression::build(query);
        let response = self
            .client
            .query()
            .table_name(structure)
            .key_condition_expression(expr.key_condition)
            .set_filter_expression(expr.filter)
            .set_expression_attribute_names(Some(expr.names))
            .set_expression_attribute_values(Some(expr.values))
            .set_exclusive_start_key(continuation.map(token_to_key))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| map_sdk_error("Query", structure, e))?;

        let entities = response
            .items()
            .iter()
            .map(item_to_entity)
            .collect::<StoreResult<Vec<Entity>>>()?;

        Ok(Page::new(
            entities,
            key_to_token(response.last_evaluated_key()),
        ))
    }

    async fn get_by_key(
        &self,
        structure: &str,
        partition_key: &str,
        row_key: &str,
    ) -> StoreResult<Option<Entity>> {
        let response = self
            .client
            .get_item()
            .table_name(structure)
            .set_key(Some(key_of(partition_key, row_key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| map_sdk_error("GetItem", structure, e))?;

        response.item().map(item_to_entity).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudtable_core::MutationBatch;

    #[test]
    fn test_config_default() {
        let config = DynamoDbConfig::default();
        assert!(config.region.is_none());
        assert!(config.endpoint.is_none());
        assert!(config.timeout_ms.is_none());
        assert_eq!(config.create_timeout_ms, DEFAULT_CREATE_TIMEOUT_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = DynamoDbConfig {
            timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AwsStoreError::InvalidConfig(_))
        ));

        let config = DynamoDbConfig {
            endpoint: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config: DynamoDbConfig =
            serde_json::from_str(r#"{"region": "us-east-1", "timeout_ms": 5000}"#).unwrap();
        assert_eq!(config.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.create_timeout_ms, DEFAULT_CREATE_TIMEOUT_MS);
    }

    #[test]
    fn test_missing_region() {
        let sdk_config = aws_config::SdkConfig::builder().build();
        assert!(matches!(
            DynamoDbTableStore::new(&sdk_config, DynamoDbConfig::default()),
            Err(AwsStoreError::MissingRegion)
        ));
    }

    #[test]
    fn test_write_items() {
        let mut batch = MutationBatch::new();
        batch
            .append(Operation::upsert(Entity::new("A", "1").with_property("foo", 10)))
            .unwrap();
        batch.append(Operation::delete(Entity::new("A", "2"))).unwrap();
        batch
            .append(Operation::delete(
                Entity::new("A", "3").with_version_tag("tag-3"),
            ))
            .unwrap();
        let batch = batch.seal();
        let ops: Vec<&Operation> = batch.iter().collect();

        let put = DynamoDbTableStore::write_item("orders", ops[0]).unwrap();
        let put = put.put().unwrap();
        assert_eq!(put.table_name(), "orders");
        assert!(put.item().contains_key(ATTR_VERSION_TAG));

        let wildcard = DynamoDbTableStore::write_item("orders", ops[1]).unwrap();
        let wildcard = wildcard.delete().unwrap();
        assert_eq!(
            wildcard.condition_expression(),
            Some("attribute_exists(#pk)")
        );

        let tagged = DynamoDbTableStore::write_item("orders", ops[2]).unwrap();
        let tagged = tagged.delete().unwrap();
        assert_eq!(tagged.condition_expression(), Some("#vt = :vt"));
        assert_eq!(
            tagged
                .expression_attribute_values()
                .and_then(|v| v.get(":vt")),
            Some(&AttributeValue::S("tag-3".into()))
        );
    }
}
