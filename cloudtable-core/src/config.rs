//! Table configuration

use crate::error::{Result, TableError};
use serde::{Deserialize, Serialize};

/// Settings for one [`TableStructure`](crate::TableStructure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Structure (table) name
    pub name: String,
    /// Lower bound on the store's per-batch limit; never raises it
    pub max_batch_operations: Option<usize>,
    /// Suppress outcome messages
    pub logging_disabled: bool,
}

impl TableConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Effective batch capacity for a store whose hard limit is `store_limit`
    pub fn batch_capacity(&self, store_limit: usize) -> Result<usize> {
        if store_limit == 0 {
            return Err(TableError::invalid_argument(
                "store reports a batch limit of 0 operations",
            ));
        }
        match self.max_batch_operations {
            Some(0) => Err(TableError::invalid_argument(
                "max_batch_operations must be at least 1",
            )),
            Some(n) => Ok(n.min(store_limit)),
            None => Ok(store_limit),
        }
    }
}

/// Check a structure name against the table naming rule
///
/// 3 to 63 ASCII alphanumeric characters, not starting with a digit.
pub fn validate_structure_name(name: &str) -> Result<()> {
    let len = name.len();
    if !(3..=63).contains(&len) {
        return Err(TableError::invalid_argument(format!(
            "structure name '{name}' must be 3 to 63 characters long"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TableError::invalid_argument(format!(
            "structure name '{name}' may only contain ASCII letters and digits"
        )));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(TableError::invalid_argument(format!(
            "structure name '{name}' must not start with a digit"
        )));
    }
    Ok(())
}
