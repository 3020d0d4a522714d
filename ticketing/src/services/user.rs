//! User registration.
//!
//! Sign-in is handled outside this crate; services only ever see a
//! `UserId` that has already been authenticated.

use super::{normalize_email, required_text};
use crate::error::{Result, TicketingError};
use crate::repository::UserRepository;
use crate::types::{User, UserId};
use kassa_core::environment::Clock;
use std::sync::Arc;

/// User accounts.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    /// Creates a new `UserService`
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { users, clock }
    }

    /// Create an organizer account.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad e-mail or name, `Conflict` if the e-mail is
    /// registered.
    pub async fn register(&self, email: &str, name: &str) -> Result<User> {
        self.create(email, name, false).await
    }

    /// Create a platform administrator account.
    ///
    /// # Errors
    ///
    /// As [`UserService::register`].
    pub async fn register_platform_admin(&self, email: &str, name: &str) -> Result<User> {
        self.create(email, name, true).await
    }

    async fn create(&self, email: &str, name: &str, is_platform_admin: bool) -> Result<User> {
        let user = User {
            id: UserId::new(),
            email: normalize_email(email)?,
            name: required_text("Name", name, 100)?,
            is_platform_admin,
            created_at: self.clock.now(),
        };
        self.users.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, is_platform_admin, "User registered");
        Ok(user)
    }

    /// Load a user.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user does not exist.
    pub async fn get(&self, user_id: UserId) -> Result<User> {
        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("user", user_id))
    }
}
