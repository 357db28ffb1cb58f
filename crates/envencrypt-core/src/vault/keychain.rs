//! OS credential vault backend
//!
//! Uses the system vault through the `keyring` crate:
//! - Windows: Credential Manager
//! - macOS: Keychain
//! - Linux: Secret Service (GNOME Keyring, KWallet)
//!
//! Secrets are stored under their own (service, user) pair so other tools
//! can read them. None of these vaults can enumerate entries through
//! `keyring`, so this backend keeps an index in the vault itself:
//! - `(namespace, "__envencrypt_index__services")`: service names
//! - `(service, "__envencrypt_index__users")`: user names under that service
//!
//! Each index is a JSON array split over pages (`<base>`, `<base>.1`, ...)
//! small enough for Credential Manager's 2560-byte secret limit.
//!
//! Every stored secret is indexed. The index may name records that are
//! gone; listing prunes them.

use std::collections::BTreeSet;
use std::sync::Arc;

use keyring::Entry;
use parking_lot::Mutex;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::types::validate_key;
use super::{CredentialKey, CredentialStore};
use crate::error::{CoreError, Result};
use crate::settings::VaultSettings;

/// User names starting with this prefix are reserved for the index
pub const INDEX_PREFIX: &str = "__envencrypt_index__";

const SERVICES_INDEX: &str = "__envencrypt_index__services";
const USERS_INDEX: &str = "__envencrypt_index__users";

/// Page budget in UTF-16 units (Credential Manager stores at most 2560 bytes)
const PAGE_UTF16_LIMIT: usize = 1024;

const FACILITY: &str = "OS credential vault";

/// Serializes index read-modify-write cycles within this process
static INDEX_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Raw string entries of the backing vault
trait EntryStore: Send + Sync {
    fn get(&self, service: &str, user: &str) -> Result<Option<Zeroizing<String>>>;
    fn set(&self, service: &str, user: &str, value: &str) -> Result<()>;
    /// `false` when there was nothing to delete
    fn delete(&self, service: &str, user: &str) -> Result<bool>;
}

/// Entries in the OS vault
struct OsEntries;

impl OsEntries {
    fn entry(service: &str, user: &str) -> Result<Entry> {
        if !super::is_supported() {
            return Err(CoreError::PlatformUnsupported { facility: FACILITY });
        }
        Entry::new(service, user).map_err(vault_error)
    }
}

impl EntryStore for OsEntries {
    fn get(&self, service: &str, user: &str) -> Result<Option<Zeroizing<String>>> {
        match Self::entry(service, user)?.get_password() {
            Ok(value) => Ok(Some(Zeroizing::new(value))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(vault_error(e)),
        }
    }

    fn set(&self, service: &str, user: &str, value: &str) -> Result<()> {
        Self::entry(service, user)?
            .set_password(value)
            .map_err(vault_error)
    }

    fn delete(&self, service: &str, user: &str) -> Result<bool> {
        match Self::entry(service, user)?.delete_password() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(vault_error(e)),
        }
    }
}

/// OS vault storage backend
#[derive(Clone)]
pub struct KeyringVault {
    /// Service name the service index lives under
    namespace: String,
    entries: Arc<dyn EntryStore>,
}

impl KeyringVault {
    pub fn new(settings: &VaultSettings) -> Self {
        Self::with_entries(settings, Arc::new(OsEntries))
    }

    fn with_entries(settings: &VaultSettings, entries: Arc<dyn EntryStore>) -> Self {
        Self {
            namespace: settings.namespace.clone(),
            entries,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Validate a caller-supplied key, refusing index entries
    fn check_key(service: &str, user: &str) -> Result<()> {
        validate_key(service, user)?;
        if user.starts_with(INDEX_PREFIX) {
            return Err(CoreError::VaultError(format!(
                "User names starting with {} are reserved for the vault index",
                INDEX_PREFIX
            )));
        }
        Ok(())
    }

    /// Add `key` to the index; `true` if its user was not indexed yet
    fn index_insert(&self, key: &CredentialKey) -> Result<bool> {
        let entries = &*self.entries;

        let mut users = read_list(entries, &key.service, USERS_INDEX)?;
        let added = users.insert(key.user.clone());
        if added {
            write_list(entries, &key.service, USERS_INDEX, &users)?;
        }

        let mut services = read_list(entries, &self.namespace, SERVICES_INDEX)?;
        if services.insert(key.service.clone()) {
            write_list(entries, &self.namespace, SERVICES_INDEX, &services)?;
        }
        Ok(added)
    }

    /// Drop `key` from the index, and its service once no users remain
    fn index_remove(&self, key: &CredentialKey) -> Result<()> {
        let entries = &*self.entries;

        let mut users = read_list(entries, &key.service, USERS_INDEX)?;
        if users.remove(&key.user) {
            write_list(entries, &key.service, USERS_INDEX, &users)?;
        }
        if users.is_empty() {
            self.forget_service(&key.service)?;
        }
        Ok(())
    }

    fn forget_service(&self, service: &str) -> Result<()> {
        let entries = &*self.entries;
        let mut services = read_list(entries, &self.namespace, SERVICES_INDEX)?;
        if services.remove(service) {
            write_list(entries, &self.namespace, SERVICES_INDEX, &services)?;
        }
        Ok(())
    }

    /// Remove index entries whose records are still gone under the lock
    fn prune(&self, stale: &[CredentialKey], empty_services: &[String]) -> Result<()> {
        let _guard = INDEX_LOCK.lock();
        for key in stale {
            if self.entries.get(&key.service, &key.user)?.is_none() {
                self.index_remove(key)?;
            }
        }
        for service in empty_services {
            if read_list(&*self.entries, service, USERS_INDEX)?.is_empty() {
                self.forget_service(service)?;
            }
        }
        Ok(())
    }
}

impl Default for KeyringVault {
    fn default() -> Self {
        Self::new(&VaultSettings::default())
    }
}

impl std::fmt::Debug for KeyringVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringVault")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl CredentialStore for KeyringVault {
    fn set_password(&self, service: &str, user: &str, secret: &str) -> Result<()> {
        Self::check_key(service, user)?;
        let key = CredentialKey::new(service, user);

        let _guard = INDEX_LOCK.lock();
        let added = self.index_insert(&key)?;
        if let Err(e) = self.entries.set(service, user, secret) {
            if added {
                if let Err(undo) = self.index_remove(&key) {
                    warn!("Failed to roll back vault index for {}: {}", key, undo);
                }
            }
            return Err(e);
        }

        debug!("Stored credential in vault: {}", key);
        Ok(())
    }

    fn get_password(&self, service: &str, user: &str) -> Result<Option<String>> {
        Self::check_key(service, user)?;

        match self.entries.get(service, user)? {
            Some(mut secret) => {
                debug!("Retrieved credential from vault: {}/{}", service, user);
                Ok(Some(std::mem::take(&mut *secret)))
            }
            None => {
                debug!("Credential not found in vault: {}/{}", service, user);
                Ok(None)
            }
        }
    }

    fn delete_password(&self, service: &str, user: &str) -> Result<bool> {
        Self::check_key(service, user)?;
        let key = CredentialKey::new(service, user);

        let _guard = INDEX_LOCK.lock();
        let removed = self.entries.delete(service, user)?;

        // The record is gone either way; a leftover index entry is pruned on list
        if let Err(e) = self.index_remove(&key) {
            warn!("Failed to update vault index after deleting {}: {}", key, e);
        }

        debug!("Delete credential {}: removed={}", key, removed);
        Ok(removed)
    }

    fn list_credentials(&self) -> Result<Vec<CredentialKey>> {
        let entries = &*self.entries;

        let mut live = Vec::new();
        let mut stale = Vec::new();
        let mut empty_services = Vec::new();
        for service in read_list(entries, &self.namespace, SERVICES_INDEX)? {
            let users = read_list(entries, &service, USERS_INDEX)?;
            if users.is_empty() {
                empty_services.push(service);
                continue;
            }
            for user in users {
                let key = CredentialKey::new(service.clone(), user);
                if entries.get(&key.service, &key.user)?.is_some() {
                    live.push(key);
                } else {
                    stale.push(key);
                }
            }
        }

        if !stale.is_empty() || !empty_services.is_empty() {
            debug!(
                "Pruning {} stale vault index entries",
                stale.len() + empty_services.len()
            );
            if let Err(e) = self.prune(&stale, &empty_services) {
                warn!("Failed to prune vault index: {}", e);
            }
        }

        Ok(live)
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "macos")]
        return "macOS Keychain";

        #[cfg(target_os = "windows")]
        return "Windows Credential Manager";

        #[cfg(target_os = "linux")]
        return "Linux Secret Service";

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        return "System Keychain";
    }
}

fn vault_error(e: keyring::Error) -> CoreError {
    CoreError::VaultError(e.to_string())
}

fn page_user(base: &str, page: usize) -> String {
    if page == 0 {
        base.to_string()
    } else {
        format!("{}.{}", base, page)
    }
}

/// Read every page of the index `base` kept under `service`
fn read_list(entries: &dyn EntryStore, service: &str, base: &str) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for page in 0.. {
        match entries.get(service, &page_user(base, page))? {
            Some(encoded) => names.extend(decode_page(&encoded)?),
            None => break,
        }
    }
    Ok(names)
}

/// Rewrite the index `base` under `service`, deleting pages it no longer needs
fn write_list(
    entries: &dyn EntryStore,
    service: &str,
    base: &str,
    names: &BTreeSet<String>,
) -> Result<()> {
    let pages = encode_pages(names)?;
    for (page, encoded) in pages.iter().enumerate() {
        entries.set(service, &page_user(base, page), encoded)?;
    }

    let mut page = pages.len();
    while entries.delete(service, &page_user(base, page))? {
        page += 1;
    }
    Ok(())
}

/// Split `names` into JSON arrays of at most `PAGE_UTF16_LIMIT` units each
///
/// A single name longer than the budget gets a page of its own.
fn encode_pages(names: &BTreeSet<String>) -> Result<Vec<String>> {
    let mut pages = Vec::new();
    let mut page: Vec<&str> = Vec::new();
    // Brackets, plus one separator per name (over-counts the last by one)
    let mut page_len = 2;

    for name in names {
        let len = serde_json::to_string(name)
            .map_err(|e| CoreError::VaultError(format!("Failed to encode vault index: {}", e)))?
            .encode_utf16()
            .count()
            + 1;
        if !page.is_empty() && page_len + len > PAGE_UTF16_LIMIT {
            pages.push(encode_page(&page)?);
            page.clear();
            page_len = 2;
        }
        page.push(name.as_str());
        page_len += len;
    }

    if !page.is_empty() {
        pages.push(encode_page(&page)?);
    }
    Ok(pages)
}

fn encode_page(names: &[&str]) -> Result<String> {
    serde_json::to_string(names)
        .map_err(|e| CoreError::VaultError(format!("Failed to encode vault index: {}", e)))
}

fn decode_page(encoded: &str) -> Result<Vec<String>> {
    if encoded.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(encoded)
        .map_err(|e| CoreError::VaultError(format!("Corrupt vault index: {}", e)))
}
