//! Insert 201 entities into one partition and commit them
//!
//! Run against DynamoDB Local with:
//!
//! ```text
//! DYNAMODB_ENDPOINT=http://localhost:8000 AWS_REGION=us-east-1 \
//!     cargo run -p cloudtable-storage-aws --example table_demo
//! ```

use aws_config::BehaviorVersion;
use cloudtable_core::{Entity, OperationTracer, TableStructure, TracingLogger};
use cloudtable_storage_aws::{DynamoDbConfig, DynamoDbTableStore};
use futures::TryStreamExt;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let config = DynamoDbConfig {
        endpoint: std::env::var("DYNAMODB_ENDPOINT").ok(),
        ..Default::default()
    };
    let store = Arc::new(DynamoDbTableStore::new(&sdk_config, config)?);

    let tracer = OperationTracer::new();
    let mut table = TableStructure::new("sampletable", store)?.with_tracer(tracer.clone());

    if !table.create_or_load_structure().await? {
        return Err("sampletable could not be created".into());
    }

    for i in 0..=200 {
        table.insert(Entity::new("partitionkey", i.to_string()).with_property("foo", 10))?;
    }
    let summary = table.commit().await?;
    tracing::info!(
        batches = summary.batches,
        operations = summary.operations,
        "Commit finished"
    );

    let stored: Vec<Entity> = table
        .retrieve_all("partitionkey", None)?
        .try_collect()
        .await?;
    tracing::info!(count = stored.len(), "Read back partition");

    tracer.log_report(&TracingLogger);
    Ok(())
}
