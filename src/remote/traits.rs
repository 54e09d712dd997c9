//! Trait abstraction for the lookup client to enable mocking in tests

use super::client::SeedUser;
use anyhow::Result;
use async_trait::async_trait;

/// Lookups the form needs from the user directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteLookup: Send + Sync {
    /// Fetch the user whose details seed the form's default values
    async fn fetch_seed_user(&self) -> Result<SeedUser>;

    /// Find users registered with the given email address
    async fn find_users_by_email(&self, email: &str) -> Result<Vec<SeedUser>>;
}
