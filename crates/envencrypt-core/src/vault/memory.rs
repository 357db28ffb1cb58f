//! In-process credential store
//!
//! Stand-in for the OS vault in tests and on hosts without one. Records live
//! only as long as the instance.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;
use zeroize::Zeroizing;

use super::types::validate_key;
use super::{CredentialKey, CredentialStore};
use crate::error::Result;

/// Map-backed credential store
#[derive(Default)]
pub struct MemoryVault {
    records: RwLock<BTreeMap<CredentialKey, Zeroizing<String>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVault")
            .field("records", &self.records.read().len())
            .finish()
    }
}

impl CredentialStore for MemoryVault {
    fn set_password(&self, service: &str, user: &str, secret: &str) -> Result<()> {
        validate_key(service, user)?;
        self.records.write().insert(
            CredentialKey::new(service, user),
            Zeroizing::new(secret.to_string()),
        );
        debug!("Stored credential {}/{}", service, user);
        Ok(())
    }

    fn get_password(&self, service: &str, user: &str) -> Result<Option<String>> {
        validate_key(service, user)?;
        let records = self.records.read();
        Ok(records
            .get(&CredentialKey::new(service, user))
            .map(|secret| secret.as_str().to_owned()))
    }

    fn delete_password(&self, service: &str, user: &str) -> Result<bool> {
        validate_key(service, user)?;
        let removed = self
            .records
            .write()
            .remove(&CredentialKey::new(service, user))
            .is_some();
        debug!("Delete credential {}/{}: removed={}", service, user, removed);
        Ok(removed)
    }

    fn list_credentials(&self) -> Result<Vec<CredentialKey>> {
        Ok(self.records.read().keys().cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "In-memory vault"
    }
}
