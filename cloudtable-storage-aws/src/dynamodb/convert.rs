//! Conversions between entities and DynamoDB items

use super::schema::*;
use aws_sdk_dynamodb::types::AttributeValue;
use cloudtable_core::{ContinuationToken, Entity, StoreError, StoreResult};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

pub(crate) type Item = HashMap<String, AttributeValue>;

/// Convert a single DynamoDB AttributeValue to JSON
///
/// Binary and set types have no JSON form and are skipped.
pub(crate) fn dynamo_attr_to_json(attr: &AttributeValue) -> Option<JsonValue> {
    match attr {
        AttributeValue::S(s) => Some(JsonValue::String(s.clone())),
        AttributeValue::N(n) => {
            if let Ok(i) = n.parse::<i64>() {
                Some(JsonValue::Number(i.into()))
            } else if let Ok(u) = n.parse::<u64>() {
                Some(JsonValue::Number(u.into()))
            } else {
                n.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number)
            }
        }
        AttributeValue::Bool(b) => Some(JsonValue::Bool(*b)),
        AttributeValue::Null(_) => Some(JsonValue::Null),
        AttributeValue::L(list) => Some(JsonValue::Array(
            list.iter().filter_map(dynamo_attr_to_json).collect(),
        )),
        AttributeValue::M(map) => Some(JsonValue::Object(
            map.iter()
                .filter_map(|(k, v)| dynamo_attr_to_json(v).map(|val| (k.clone(), val)))
                .collect(),
        )),
        _ => None,
    }
}

/// Convert a JSON value to a DynamoDB AttributeValue
pub(crate) fn json_to_dynamo_attr(val: &JsonValue) -> AttributeValue {
    match val {
        JsonValue::Null => AttributeValue::Null(true),
        JsonValue::Bool(b) => AttributeValue::Bool(*b),
        JsonValue::Number(n) => AttributeValue::N(n.to_string()),
        JsonValue::String(s) => AttributeValue::S(s.clone()),
        JsonValue::Array(arr) => AttributeValue::L(arr.iter().map(json_to_dynamo_attr).collect()),
        JsonValue::Object(obj) => AttributeValue::M(
            obj.iter()
                .map(|(k, v)| (k.clone(), json_to_dynamo_attr(v)))
                .collect(),
        ),
    }
}

fn string_attr(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).cloned()
}

/// Primary key of one row
pub(crate) fn key_of(partition_key: &str, row_key: &str) -> Item {
    HashMap::from([
        (
            ATTR_PARTITION_KEY.to_string(),
            AttributeValue::S(partition_key.to_string()),
        ),
        (ATTR_ROW_KEY.to_string(), AttributeValue::S(row_key.to_string())),
    ])
}

/// Full item for a put, stamped with `version_tag`
///
/// Fails if a property collides with a key or version attribute.
pub(crate) fn entity_to_item(entity: &Entity, version_tag: &str) -> StoreResult<Item> {
    let mut item = key_of(&entity.partition_key, &entity.row_key);
    item.insert(
        ATTR_VERSION_TAG.to_string(),
        AttributeValue::S(version_tag.to_string()),
    );
    for (name, value) in &entity.properties {
        if is_reserved_attribute(name) {
            return Err(StoreError::rejected(format!(
                "property '{name}' of '{}'/'{}' uses a reserved attribute name",
                entity.partition_key, entity.row_key
            )));
        }
        item.insert(name.clone(), json_to_dynamo_attr(value));
    }
    Ok(item)
}

/// Rebuild an entity from a stored item
pub(crate) fn item_to_entity(item: &Item) -> StoreResult<Entity> {
    let (Some(partition_key), Some(row_key)) = (
        string_attr(item, ATTR_PARTITION_KEY),
        string_attr(item, ATTR_ROW_KEY),
    ) else {
        return Err(StoreError::rejected("item is missing its key attributes"));
    };

    let mut entity = Entity::new(partition_key, row_key);
    entity.version_tag = string_attr(item, ATTR_VERSION_TAG);
    entity.properties = item
        .iter()
        .filter(|(name, _)| !is_reserved_attribute(name))
        .filter_map(|(name, attr)| dynamo_attr_to_json(attr).map(|v| (name.clone(), v)))
        .collect();
    Ok(entity)
}

pub(crate) fn token_to_key(token: &ContinuationToken) -> Item {
    key_of(&token.partition_key, &token.row_key)
}

/// `None` when DynamoDB reports no further pages
pub(crate) fn key_to_token(key: Option<&Item>) -> Option<ContinuationToken> {
    let key = key.filter(|k| !k.is_empty())?;
    Some(ContinuationToken {
        partition_key: string_attr(key, ATTR_PARTITION_KEY)?,
        row_key: string_attr(key, ATTR_ROW_KEY)?,
    })
}
