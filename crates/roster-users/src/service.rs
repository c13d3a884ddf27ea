//! The `UserService` capability trait and its implementations.
//!
//! The HTTP boundary depends on this trait, not on the store, so handler
//! tests can substitute [`InMemoryUserService`] for the real database.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use roster_db::Store;
use roster_types::{User, UserFilter};

use crate::repo::{self, UserError};

/// Operations the boundary layer may perform on users.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Creates `user`, populating its ID and timestamps on success.
    async fn create_user(&self, user: &mut User) -> Result<(), UserError>;

    /// Fetches a user by ID, or [`UserError::NotFound`].
    async fn find_user_by_id(&self, id: i64) -> Result<User, UserError>;

    /// Lists users matching `filter`, returning the page and the total count
    /// of matches independent of pagination.
    async fn find_users(&self, filter: UserFilter) -> Result<(Vec<User>, i64), UserError>;
}

/// Production implementation backed by the SQLite [`Store`].
///
/// Each call checks out its own pooled connection and owns its transaction
/// end to end; rusqlite work runs on the blocking thread pool so it never
/// stalls the async reactor.
pub struct SqliteUserService {
    store: Arc<Store>,
}

impl SqliteUserService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UserService for SqliteUserService {
    async fn create_user(&self, user: &mut User) -> Result<(), UserError> {
        let store = Arc::clone(&self.store);
        let mut scratch = user.clone();

        let created = tokio::task::spawn_blocking(move || -> Result<User, UserError> {
            let mut conn = store.conn()?;
            let tx = store.begin_tx(&mut conn)?;
            repo::create_user(&tx, &mut scratch)?;
            tx.commit()?;
            Ok(scratch)
        })
        .await??;

        *user = created;
        Ok(())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<User, UserError> {
        let store = Arc::clone(&self.store);

        tokio::task::spawn_blocking(move || -> Result<User, UserError> {
            let mut conn = store.conn()?;
            let tx = store.begin_tx(&mut conn)?;
            // Read-only: the transaction is discarded (rolled back) on drop.
            repo::find_user_by_id(&tx, id)
        })
        .await?
    }

    async fn find_users(&self, filter: UserFilter) -> Result<(Vec<User>, i64), UserError> {
        let store = Arc::clone(&self.store);

        tokio::task::spawn_blocking(move || -> Result<(Vec<User>, i64), UserError> {
            let mut conn = store.conn()?;
            let tx = store.begin_tx(&mut conn)?;
            repo::find_users(&tx, filter)
        })
        .await?
    }
}

/// In-memory test double with the same observable semantics as the SQLite
/// implementation: validation before assignment, IDs from 1, timestamps set
/// at creation, window-style totals unaffected by pagination.
#[derive(Default)]
pub struct InMemoryUserService {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserService for InMemoryUserService {
    async fn create_user(&self, user: &mut User) -> Result<(), UserError> {
        user.validate()?;

        let mut users = self.users.lock().expect("user list lock poisoned");
        let now = Utc::now();
        user.id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        user.created_at = Some(now);
        user.updated_at = Some(now);
        users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<User, UserError> {
        let users = self.users.lock().expect("user list lock poisoned");
        users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(UserError::NotFound(id))
    }

    async fn find_users(&self, filter: UserFilter) -> Result<(Vec<User>, i64), UserError> {
        let users = self.users.lock().expect("user list lock poisoned");

        let mut matches: Vec<User> = users
            .iter()
            .filter(|u| filter.id.is_none_or(|id| u.id == id))
            .cloned()
            .collect();
        matches.sort_by_key(|u| u.id);
        let total = matches.len() as i64;

        let offset = filter.offset.max(0) as usize;
        let mut page: Vec<User> = matches.into_iter().skip(offset).collect();
        if filter.limit > 0 {
            page.truncate(filter.limit as usize);
        }

        Ok((page, total))
    }
}
