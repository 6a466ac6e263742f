//! Execution context for platform collaborator calls.
//!
//! Every registry call carries an explicit [`PlatformContext`] naming the
//! role (and optionally the warehouse) the call executes under. Privilege
//! level is never ambient process state; a caller that needs elevated
//! access constructs a context for it and threads it through.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Context threaded through every platform collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformContext {
    /// Role the call executes under.
    role: String,

    /// Warehouse to bind for statement execution, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<String>,
}

impl PlatformContext {
    /// Creates a context for the given role.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the role is empty or contains
    /// whitespace.
    pub fn new(role: impl Into<String>) -> Result<Self> {
        let role = role.into();
        if role.is_empty() {
            return Err(Error::InvalidInput("role must not be empty".into()));
        }
        if role.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!(
                "role must not contain whitespace: {role:?}"
            )));
        }

        Ok(Self {
            role,
            warehouse: None,
        })
    }

    /// Sets the warehouse to bind for statement execution.
    #[must_use]
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    /// Returns the role this context executes under.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns the bound warehouse, if any.
    #[must_use]
    pub fn warehouse(&self) -> Option<&str> {
        self.warehouse.as_deref()
    }
}
