//! User repository trait.

use crate::error::MetadataResult;
use crate::models::{NewUser, UserRow, UserUpdate};
use async_trait::async_trait;

/// Repository for user accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user. Fails with `AlreadyExists` if the email is taken.
    async fn create_user(&self, user: &NewUser) -> MetadataResult<UserRow>;

    async fn get_user(&self, user_id: i64) -> MetadataResult<Option<UserRow>>;

    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>>;

    /// Overwrite username, email and profile image.
    /// Fails with `AlreadyExists` if the new email belongs to another user.
    async fn update_user(&self, user_id: i64, update: &UserUpdate) -> MetadataResult<UserRow>;

    async fn update_password(&self, user_id: i64, password_hash: &str) -> MetadataResult<()>;

    /// Delete a user row. Owned manuals must already be gone.
    async fn delete_user(&self, user_id: i64) -> MetadataResult<()>;
}
