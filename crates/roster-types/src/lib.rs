//! Shared domain types for the roster service.
//!
//! This crate provides the types used across all roster crates: the `User`
//! record, the `UserFilter` query selector, and field validation. No crate in
//! the workspace depends on anything *except* `roster-types` for
//! cross-cutting type definitions, which keeps the dependency graph clean and
//! prevents circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by field validation, before any store interaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The `name` field was empty or missing.
    #[error("missing name")]
    MissingName,
}

/// A user account.
///
/// The `id` is store-assigned on creation and immutable afterwards.
/// Timestamps are assigned from the store's clock at transaction start and
/// are `None` until the user has been persisted; on the wire they are
/// RFC 3339 strings, `null` when absent. `deleted_at` is a soft-delete
/// marker; the current contract never sets it, but the column exists so
/// deletion can be added without a schema change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store-assigned identifier. Zero until the user has been created.
    #[serde(default)]
    pub id: i64,

    /// Display name. Required, non-empty.
    pub name: String,

    /// Timestamps for user creation & last update.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Soft-delete marker. `null` on the wire while the user is live.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Checks required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingName`] if `name` is empty. Callers
    /// run this before opening a transaction so invalid input never touches
    /// the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::MissingName);
        }
        Ok(())
    }
}

/// A filter passed to `find_users`.
///
/// Fields are conjunctive; an unset filter matches all users. `offset` and
/// `limit` restrict to a subset of results and are ignored when ≤ 0, so the
/// zero value of the struct means "everything".
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UserFilter {
    /// Exact-match on the user ID.
    #[serde(default)]
    pub id: Option<i64>,

    /// Number of leading rows to skip. Ignored when ≤ 0.
    #[serde(default)]
    pub offset: i64,

    /// Maximum number of rows to return. Ignored when ≤ 0.
    #[serde(default)]
    pub limit: i64,
}

impl UserFilter {
    /// Builds a filter matching a single user by ID.
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}
