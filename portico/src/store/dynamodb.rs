// Copyright (c) 2024-present, The Portico Authors.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! The AWS DynamoDB implementation of the record store.
//!
//! Records live in one table keyed by `(image_group, image_id)`. The opaque
//! `metadata` document is stored as a native DynamoDB map, so the attribute
//! conversion below walks arbitrary JSON in both directions.

use crate::config::PorticoConfig;
use crate::error::{PorticoError, Result};
use crate::record::ImageRecord;
use crate::store::RecordStore;
use async_trait::async_trait;
use rusoto_dynamodb::{
    AttributeValue, DeleteItemInput, DynamoDb, DynamoDbClient, PutItemInput, QueryInput,
};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// Image records in one DynamoDB table.
pub struct DynamoRecordStore {
    client: DynamoDbClient,
    table: String,
}

impl DynamoRecordStore {
    /// Creates a record store over the configured table.
    pub fn new(config: &PorticoConfig) -> Self {
        DynamoRecordStore {
            client: DynamoDbClient::new(config.aws_region()),
            table: config.table.clone(),
        }
    }

    fn key_of(group: &str, id: &str) -> HashMap<String, AttributeValue> {
        let mut key = HashMap::new();
        key.insert("image_group".to_string(), attr_s(group));
        key.insert("image_id".to_string(), attr_s(id));
        key
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn query_group(&self, group: &str) -> Result<Vec<ImageRecord>> {
        let mut values = HashMap::new();
        values.insert(":image_group".to_string(), attr_s(group));

        let mut records = Vec::new();
        let mut exclusive_start_key = None;
        loop {
            let resp = self
                .client
                .query(QueryInput {
                    table_name: self.table.clone(),
                    key_condition_expression: Some("image_group = :image_group".to_string()),
                    expression_attribute_values: Some(values.clone()),
                    exclusive_start_key,
                    ..Default::default()
                })
                .await
                .map_err(|e| PorticoError::Store(e.to_string()))?;

            for item in resp.items.into_iter().flatten() {
                records.push(from_item(item)?);
            }

            if resp.last_evaluated_key.is_none() {
                break;
            }
            exclusive_start_key = resp.last_evaluated_key;
        }
        Ok(records)
    }

    async fn put(&self, record: &ImageRecord) -> Result<()> {
        self.client
            .put_item(PutItemInput {
                table_name: self.table.clone(),
                item: to_item(record),
                ..Default::default()
            })
            .await
            .map_err(|e| PorticoError::Store(e.to_string()))
            .map(|_| ())
    }

    async fn delete(&self, group: &str, id: &str) -> Result<()> {
        self.client
            .delete_item(DeleteItemInput {
                table_name: self.table.clone(),
                key: Self::key_of(group, id),
                ..Default::default()
            })
            .await
            .map_err(|e| PorticoError::Store(e.to_string()))
            .map(|_| ())
    }
}

fn attr_s(s: &str) -> AttributeValue {
    AttributeValue {
        s: Some(s.to_owned()),
        ..Default::default()
    }
}

/// Marshals one record into a DynamoDB item.
pub fn to_item(record: &ImageRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("image_group".to_string(), attr_s(&record.group));
    item.insert("image_id".to_string(), attr_s(&record.id));
    item.insert("s3_url".to_string(), attr_s(&record.url));
    item.insert(
        "metadata".to_string(),
        json_to_attr(&Value::Object(record.metadata.clone())),
    );
    item.insert(
        "is_title".to_string(),
        AttributeValue {
            bool: Some(record.is_title),
            ..Default::default()
        },
    );
    item.insert(
        "order".to_string(),
        AttributeValue {
            n: Some(record.order.to_string()),
            ..Default::default()
        },
    );
    item
}

/// Unmarshals a DynamoDB item into a record. Attributes written by older
/// deployments may lack `order`, `is_title`, or `metadata`; those fall back
/// to their defaults.
pub fn from_item(item: HashMap<String, AttributeValue>) -> Result<ImageRecord> {
    let take_s = |name: &str| -> Result<String> {
        item.get(name)
            .and_then(|a| a.s.clone())
            .ok_or_else(|| PorticoError::Store(format!("item is missing attribute {}", name)))
    };

    let metadata = match item.get("metadata").map(attr_to_json) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    Ok(ImageRecord {
        group: take_s("image_group")?,
        id: take_s("image_id")?,
        url: take_s("s3_url")?,
        metadata,
        is_title: item
            .get("is_title")
            .and_then(|a| a.bool)
            .unwrap_or_default(),
        order: item
            .get("order")
            .and_then(|a| a.n.as_ref())
            .and_then(|n| n.parse::<i64>().ok())
            .unwrap_or_default(),
    })
}

fn json_to_attr(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue {
            null: Some(true),
            ..Default::default()
        },
        Value::Bool(b) => AttributeValue {
            bool: Some(*b),
            ..Default::default()
        },
        Value::Number(n) => AttributeValue {
            n: Some(n.to_string()),
            ..Default::default()
        },
        Value::String(s) => AttributeValue {
            s: Some(s.clone()),
            ..Default::default()
        },
        Value::Array(items) => AttributeValue {
            l: Some(items.iter().map(json_to_attr).collect()),
            ..Default::default()
        },
        Value::Object(map) => AttributeValue {
            m: Some(
                map.iter()
                    .map(|(k, v)| (k.clone(), json_to_attr(v)))
                    .collect(),
            ),
            ..Default::default()
        },
    }
}

fn attr_to_json(attr: &AttributeValue) -> Value {
    if let Some(ref s) = attr.s {
        return Value::String(s.clone());
    }
    if let Some(ref n) = attr.n {
        if let Ok(i) = n.parse::<i64>() {
            return Value::Number(i.into());
        }
        if let Some(f) = n.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(f);
        }
        return Value::String(n.clone());
    }
    if let Some(b) = attr.bool {
        return Value::Bool(b);
    }
    if let Some(ref items) = attr.l {
        return Value::Array(items.iter().map(attr_to_json).collect());
    }
    if let Some(ref map) = attr.m {
        return Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), attr_to_json(v)))
                .collect(),
        );
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_round_trip() {
        let mut record = ImageRecord::new("g1", 2);
        record.url = "https://b.s3.amazonaws.com/uploads/g1/g1-2-x.jpg".to_string();
        record.is_title = true;
        record.metadata = json!({ "caption": "river", "tags": ["a", "b"], "width": 1024 })
            .as_object()
            .unwrap()
            .clone();

        let restored = from_item(to_item(&record)).unwrap();
        assert_eq!(record, restored);
    }

    #[test]
    fn missing_optional_attributes_default() {
        let mut item = HashMap::new();
        item.insert("image_group".to_string(), attr_s("g1"));
        item.insert("image_id".to_string(), attr_s("g1-1"));
        item.insert("s3_url".to_string(), attr_s("https://x"));

        let record = from_item(item).unwrap();
        assert_eq!(0, record.order);
        assert!(!record.is_title);
        assert!(record.metadata.is_empty());
    }
}
