//! Credential store trait definitions

use std::collections::BTreeSet;

use super::CredentialKey;
use crate::error::Result;

/// Trait for credential vault backends
///
/// Every call goes to the backing store; implementations keep no cache.
pub trait CredentialStore: Send + Sync {
    /// Store a secret, replacing any existing one for the same key
    fn set_password(&self, service: &str, user: &str, secret: &str) -> Result<()>;

    /// Retrieve a secret; `None` when no record exists
    fn get_password(&self, service: &str, user: &str) -> Result<Option<String>>;

    /// Delete a secret; `false` when there was nothing to delete
    fn delete_password(&self, service: &str, user: &str) -> Result<bool>;

    /// List all (service, user) pairs known to this store, sorted
    fn list_credentials(&self) -> Result<Vec<CredentialKey>>;

    /// List unique service names, sorted
    fn list_services(&self) -> Result<Vec<String>> {
        let services: BTreeSet<String> = self
            .list_credentials()?
            .into_iter()
            .map(|key| key.service)
            .collect();
        Ok(services.into_iter().collect())
    }

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}
