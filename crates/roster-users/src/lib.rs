//! User repository and service facade for the roster service.
//!
//! The repository ([`create_user`], [`find_user_by_id`], [`find_users`]) is a
//! set of free functions over a [`roster_db::Tx`], so every operation runs
//! inside a transaction the caller owns. The [`UserService`] trait is the
//! capability contract the HTTP boundary depends on; [`SqliteUserService`] is
//! the production implementation and [`InMemoryUserService`] backs handler
//! tests without a database.

mod repo;
mod service;

pub use repo::{create_user, find_user_by_id, find_users, UserError};
pub use service::{InMemoryUserService, SqliteUserService, UserService};
