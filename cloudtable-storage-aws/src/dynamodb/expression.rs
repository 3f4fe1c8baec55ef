//! Query expressions for partition scans
//!
//! Every attribute goes through an `ExpressionAttributeNames` placeholder, so
//! property names that are DynamoDB reserved words (`status`, `name`, ...)
//! need no special handling.

use super::convert::json_to_dynamo_attr;
use super::schema::{ATTR_PARTITION_KEY, ATTR_ROW_KEY};
use aws_sdk_dynamodb::types::AttributeValue;
use cloudtable_core::{PartitionQuery, RowKeyCondition};
use std::collections::HashMap;

/// Expression strings plus their placeholder maps
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryExpression {
    pub key_condition: String,
    pub filter: Option<String>,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl QueryExpression {
    pub fn build(query: &PartitionQuery) -> Self {
        let mut names = HashMap::from([("#pk".to_string(), ATTR_PARTITION_KEY.to_string())]);
        let mut values = HashMap::from([(
            ":pk".to_string(),
            AttributeValue::S(query.partition_key.clone()),
        )]);

        let mut key_condition = "#pk = :pk".to_string();
        if let Some(cond) = &query.filter.row_key {
            names.insert("#rk".to_string(), ATTR_ROW_KEY.to_string());
            let (clause, bounds) = row_key_clause(cond);
            key_condition.push_str(" AND ");
            key_condition.push_str(&clause);
            for (placeholder, bound) in bounds {
                values.insert(placeholder.to_string(), AttributeValue::S(bound.to_string()));
            }
        }

        let mut clauses = Vec::with_capacity(query.filter.properties.len());
        for (i, prop) in query.filter.properties.iter().enumerate() {
            let name = format!("#p{i}");
            let value = format!(":p{i}");
            clauses.push(format!("{name} = {value}"));
            names.insert(name, prop.name.clone());
            values.insert(value, json_to_dynamo_attr(&prop.value));
        }
        let filter = (!clauses.is_empty()).then(|| clauses.join(" AND "));

        Self {
            key_condition,
            filter,
            names,
            values,
        }
    }
}

fn row_key_clause(cond: &RowKeyCondition) -> (String, Vec<(&'static str, &str)>) {
    fn compare<'a>(op: &str, v: &'a str) -> (String, Vec<(&'static str, &'a str)>) {
        (format!("#rk {op} :rk"), vec![(":rk", v)])
    }
    match cond {
        RowKeyCondition::Eq(v) => compare("=", v),
        RowKeyCondition::Lt(v) => compare("<", v),
        RowKeyCondition::Le(v) => compare("<=", v),
        RowKeyCondition::Gt(v) => compare(">", v),
        RowKeyCondition::Ge(v) => compare(">=", v),
        RowKeyCondition::BeginsWith(v) => (
            "begins_with(#rk, :rk)".to_string(),
            vec![(":rk", v.as_str())],
        ),
        RowKeyCondition::Between(lo, hi) => (
            "#rk BETWEEN :rk AND :rk_hi".to_string(),
            vec![(":rk", lo.as_str()), (":rk_hi", hi.as_str())],
        ),
    }
}

/// True when the row key condition can match nothing
///
/// DynamoDB rejects a `BETWEEN` whose bounds are reversed instead of returning
/// an empty result.
pub(crate) fn is_unsatisfiable(query: &PartitionQuery) -> bool {
    matches!(&query.filter.row_key, Some(RowKeyCondition::Between(lo, hi)) if lo > hi)
}
