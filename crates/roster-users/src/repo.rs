//! Repository operations over the `users` table.
//!
//! Every function takes a [`Tx`] and never commits it — the caller decides
//! whether the transaction commits or rolls back, so a failure partway
//! through an operation can never leave partial writes visible.

use chrono::{DateTime, Utc};
use roster_db::{StoreError, Tx};
use roster_types::{User, UserFilter, ValidationError};
use rusqlite::{params_from_iter, types::Type};
use thiserror::Error;

/// Errors surfaced by user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// The user failed field validation; nothing was persisted.
    #[error("invalid user: {0}")]
    Validation(#[from] ValidationError),

    /// No user matched the requested ID.
    #[error("user not found: {0}")]
    NotFound(i64),

    /// A store operation (pool, transaction begin, commit) failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A statement failed while executing within the transaction.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The blocking task running the operation was cancelled or panicked.
    #[error("task join error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Inserts a new user within `tx`, assigning the store-generated ID and the
/// transaction timestamps back onto `user`.
///
/// Validation runs before any SQL, so an invalid user never touches the
/// store. The caller commits; on error the transaction drops and rolls back.
///
/// # Errors
///
/// Returns [`UserError::Validation`] if `name` is empty, or
/// [`UserError::Database`] if the insert fails.
pub fn create_user(tx: &Tx<'_>, user: &mut User) -> Result<(), UserError> {
    user.validate()?;

    let now = tx.now;
    tx.execute(
        "INSERT INTO users (name, created_at, updated_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![user.name, now.to_rfc3339(), now.to_rfc3339()],
    )?;

    user.id = tx.last_insert_rowid();
    user.created_at = Some(now);
    user.updated_at = Some(now);

    tracing::debug!(id = user.id, "created user");
    Ok(())
}

/// Fetches a single user by ID.
///
/// # Errors
///
/// Returns [`UserError::NotFound`] if no user has that ID — never a
/// zero-value user.
pub fn find_user_by_id(tx: &Tx<'_>, id: i64) -> Result<User, UserError> {
    let (users, _) = find_users(tx, UserFilter::by_id(id))?;
    users.into_iter().next().ok_or(UserError::NotFound(id))
}

/// Returns the users matching `filter` plus the total count of matches.
///
/// The total is computed as a `COUNT(*) OVER()` window aggregate over the
/// filtered-but-unpaginated result set, so it may exceed the page size when
/// `filter.limit` is set. Results are ordered by ID ascending. `limit` and
/// `offset` are ignored when ≤ 0 rather than emitting `LIMIT 0`.
///
/// # Errors
///
/// Returns [`UserError::Database`] on query failure.
pub fn find_users(tx: &Tx<'_>, filter: UserFilter) -> Result<(Vec<User>, i64), UserError> {
    // Conjunctive WHERE clause; "1 = 1" keeps the joins simple when the
    // filter is empty and means "match all".
    let mut where_clauses = vec!["1 = 1"];
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(id) = filter.id {
        where_clauses.push("id = ?");
        args.push(Box::new(id));
    }

    let sql = format!(
        "SELECT id, name, created_at, updated_at, deleted_at, COUNT(*) OVER()
         FROM users
         WHERE {}
         ORDER BY id ASC
         {}",
        where_clauses.join(" AND "),
        fmt_limit_offset(filter.limit, filter.offset),
    );

    let mut stmt = tx.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(args))?;

    let mut users = Vec::new();
    let mut total: i64 = 0;
    while let Some(row) = rows.next()? {
        let created: String = row.get(2)?;
        let updated: String = row.get(3)?;
        let deleted: Option<String> = row.get(4)?;
        total = row.get(5)?;

        users.push(User {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: Some(parse_timestamp(2, &created)?),
            updated_at: Some(parse_timestamp(3, &updated)?),
            deleted_at: deleted.map(|s| parse_timestamp(4, &s)).transpose()?,
        });
    }

    Ok((users, total))
}

/// Renders `LIMIT`/`OFFSET` clauses, omitting each when its value is ≤ 0 so
/// an unset filter (zero values) never produces a vacuous `LIMIT 0`.
///
/// SQLite requires a LIMIT clause before OFFSET; `LIMIT -1` means unlimited.
fn fmt_limit_offset(limit: i64, offset: i64) -> String {
    if limit > 0 && offset > 0 {
        format!("LIMIT {limit} OFFSET {offset}")
    } else if limit > 0 {
        format!("LIMIT {limit}")
    } else if offset > 0 {
        format!("LIMIT -1 OFFSET {offset}")
    } else {
        String::new()
    }
}

/// Parses an RFC 3339 timestamp from a `TEXT` column.
fn parse_timestamp(column: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
