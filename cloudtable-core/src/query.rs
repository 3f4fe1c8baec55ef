//! Partition queries, secondary filters and pagination
//!
//! A [`PartitionQuery`] always targets exactly one partition. The optional
//! [`QueryFilter`] narrows it further; every condition is ANDed with the
//! partition condition so a filter can never widen a scan past its partition.

use crate::entity::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Condition on the row key within the queried partition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKeyCondition {
    Eq(String),
    Lt(String),
    Le(String),
    Gt(String),
    Ge(String),
    BeginsWith(String),
    /// Inclusive on both ends
    Between(String, String),
}

impl RowKeyCondition {
    pub fn matches(&self, row_key: &str) -> bool {
        match self {
            RowKeyCondition::Eq(v) => row_key == v,
            RowKeyCondition::Lt(v) => row_key < v.as_str(),
            RowKeyCondition::Le(v) => row_key <= v.as_str(),
            RowKeyCondition::Gt(v) => row_key > v.as_str(),
            RowKeyCondition::Ge(v) => row_key >= v.as_str(),
            RowKeyCondition::BeginsWith(prefix) => row_key.starts_with(prefix.as_str()),
            RowKeyCondition::Between(lo, hi) => row_key >= lo.as_str() && row_key <= hi.as_str(),
        }
    }
}

impl fmt::Display for RowKeyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKeyCondition::Eq(v) => write!(f, "RowKey eq '{v}'"),
            RowKeyCondition::Lt(v) => write!(f, "RowKey lt '{v}'"),
            RowKeyCondition::Le(v) => write!(f, "RowKey le '{v}'"),
            RowKeyCondition::Gt(v) => write!(f, "RowKey gt '{v}'"),
            RowKeyCondition::Ge(v) => write!(f, "RowKey ge '{v}'"),
            RowKeyCondition::BeginsWith(v) => write!(f, "RowKey startswith '{v}'"),
            RowKeyCondition::Between(lo, hi) => {
                write!(f, "(RowKey ge '{lo}' and RowKey le '{hi}')")
            }
        }
    }
}

/// Equality predicate on a named property
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyCondition {
    pub name: String,
    pub value: JsonValue,
}

/// Secondary filter applied inside a partition
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_key: Option<RowKeyCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyCondition>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the row key; replaces any previous row key condition
    pub fn row_key(mut self, condition: RowKeyCondition) -> Self {
        self.row_key = Some(condition);
        self
    }

    pub fn property_eq(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.properties.push(PropertyCondition {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.row_key.is_none() && self.properties.is_empty()
    }

    /// Reference semantics for every store: all conditions must hold
    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(cond) = &self.row_key {
            if !cond.matches(&entity.row_key) {
                return false;
            }
        }
        self.properties
            .iter()
            .all(|p| entity.property(&p.name) == Some(&p.value))
    }
}

/// A scan of one partition, optionally narrowed by a filter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionQuery {
    pub partition_key: String,
    #[serde(default, skip_serializing_if = "QueryFilter::is_empty")]
    pub filter: QueryFilter,
}

impl PartitionQuery {
    pub fn new(partition_key: impl Into<String>, filter: Option<QueryFilter>) -> Self {
        Self {
            partition_key: partition_key.into(),
            filter: filter.unwrap_or_default(),
        }
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        entity.partition_key == self.partition_key && self.filter.matches(entity)
    }
}

impl fmt::Display for PartitionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionKey eq '{}'", self.partition_key)?;
        if let Some(cond) = &self.filter.row_key {
            write!(f, " and {cond}")?;
        }
        for p in &self.filter.properties {
            write!(f, " and {} eq {}", p.name, p.value)?;
        }
        Ok(())
    }
}

/// Position to resume a paginated scan from
///
/// Names the last key a page covered; the next page starts strictly after it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationToken {
    pub partition_key: String,
    pub row_key: String,
}

impl ContinuationToken {
    pub fn after(entity: &Entity) -> Self {
        Self {
            partition_key: entity.partition_key.clone(),
            row_key: entity.row_key.clone(),
        }
    }
}

/// One page of a partition scan
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub entities: Vec<Entity>,
    /// `None` when the scan is complete
    pub continuation: Option<ContinuationToken>,
}

impl Page {
    pub fn new(entities: Vec<Entity>, continuation: Option<ContinuationToken>) -> Self {
        Self {
            entities,
            continuation,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}
