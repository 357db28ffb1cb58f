//! Credential vault backend
//!
//! Secret CRUD keyed by (service, user), plus enumeration:
//! - [`KeyringVault`]: OS vault via `keyring` (native, behind the `vault` feature)
//! - [`MemoryVault`]: in-process stand-in
//!
//! `list_services` returns unique service names; `list_credentials` returns
//! the full (service, user) pairs.

#[cfg(feature = "vault")]
mod keychain;
mod memory;
mod traits;
mod types;

#[cfg(feature = "vault")]
pub use keychain::{KeyringVault, INDEX_PREFIX};
pub use memory::MemoryVault;
pub use traits::CredentialStore;
pub use types::CredentialKey;

#[cfg(feature = "vault")]
use crate::error::Result;

/// Whether `keyring` has a native store on this target
pub fn is_supported() -> bool {
    cfg!(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "ios",
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd"
    ))
}

#[cfg(feature = "vault")]
fn default_vault() -> KeyringVault {
    KeyringVault::default()
}

/// Store a secret in the OS vault under the default namespace
#[cfg(feature = "vault")]
pub fn set_password(service: &str, user: &str, secret: &str) -> Result<()> {
    default_vault().set_password(service, user, secret)
}

/// Read a secret from the OS vault; `None` when absent
#[cfg(feature = "vault")]
pub fn get_password(service: &str, user: &str) -> Result<Option<String>> {
    default_vault().get_password(service, user)
}

/// Delete a secret from the OS vault; `false` when absent
#[cfg(feature = "vault")]
pub fn delete_password(service: &str, user: &str) -> Result<bool> {
    default_vault().delete_password(service, user)
}

/// Unique service names stored through the default namespace
#[cfg(feature = "vault")]
pub fn list_services() -> Result<Vec<String>> {
    default_vault().list_services()
}

/// (service, user) pairs stored through the default namespace
#[cfg(feature = "vault")]
pub fn list_credentials() -> Result<Vec<CredentialKey>> {
    default_vault().list_credentials()
}
