use async_trait::async_trait;
use aws_sdk_dynamodb::{types::AttributeValue, Client};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument};

use super::RecordStore;
use crate::error::CollaboratorFailure;
use crate::record::CanonicalMeasurementRecord;

/// Writes canonical records to a DynamoDB table with `PutItem`.
///
/// The table's key schema decides which writes overwrite each other, and its
/// TTL setting must point at the `expireAt` attribute.
#[derive(Clone)]
pub struct DynamoDbRecordStore {
    client: Client,
    table_name: String,
}

impl DynamoDbRecordStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn from_sdk_config(
        sdk_config: &aws_config::SdkConfig,
        endpoint: Option<&str>,
        table_name: impl Into<String>,
    ) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self::new(Client::from_conf(builder.build()), table_name)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// The record as a DynamoDB item.
///
/// Numbers keep their decimal text (`N`), so no precision is lost on the way in.
pub fn to_item(
    record: &CanonicalMeasurementRecord,
) -> Result<HashMap<String, AttributeValue>, serde_json::Error> {
    let Value::Object(fields) = record.to_json()? else {
        return Err(serde::ser::Error::custom("record did not serialize to an object"));
    };

    Ok(fields
        .into_iter()
        .map(|(name, value)| (name, to_attribute(value)))
        .collect())
}

fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(items) => AttributeValue::L(items.into_iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.into_iter()
                .map(|(name, value)| (name, to_attribute(value)))
                .collect(),
        ),
    }
}

#[async_trait]
impl RecordStore for DynamoDbRecordStore {
    #[instrument(skip(self, record), fields(table = %self.table_name, key = %record.key()))]
    async fn put(&self, record: &CanonicalMeasurementRecord) -> Result<(), CollaboratorFailure> {
        let item = to_item(record).map_err(|e| CollaboratorFailure::Store {
            key: record.key().to_string(),
            source: Box::new(e),
        })?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| CollaboratorFailure::Store {
                key: record.key().to_string(),
                source: Box::new(e),
            })?;

        debug!("Stored record");
        Ok(())
    }
}
