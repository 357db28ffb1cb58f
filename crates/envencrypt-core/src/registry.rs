//! Capability registry
//!
//! Tracks which backends are present in this process and gates every
//! convenience call on that. The process-wide registry is built once on
//! first use and is read-only afterwards.
//!
//! A capability is available exactly when its backend is installed. For the
//! native registry that means the cargo feature is enabled and the target OS
//! has the facility.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::encryption::{ProtectedBlob, Protector, Scope, UnprotectedData};
use crate::error::{CoreError, Result};
use crate::offload::run_blocking;
use crate::settings::Settings;
use crate::vault::{CredentialKey, CredentialStore};

static GLOBAL: OnceCell<Registry> = OnceCell::new();

/// Backends known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Encryption,
    Vault,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Encryption, Capability::Vault];

    pub fn name(self) -> &'static str {
        match self {
            Capability::Encryption => "encryption",
            Capability::Vault => "vault",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.name() == name)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Availability of each backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CapabilityMap {
    encryption: bool,
    vault: bool,
}

impl CapabilityMap {
    pub fn is_available(&self, capability: Capability) -> bool {
        match capability {
            Capability::Encryption => self.encryption,
            Capability::Vault => self.vault,
        }
    }

    /// Look up a backend by name; `None` for names the registry does not know
    pub fn get(&self, name: &str) -> Option<bool> {
        Capability::from_name(name).map(|cap| self.is_available(cap))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, bool)> + '_ {
        Capability::ALL
            .into_iter()
            .map(move |cap| (cap, self.is_available(cap)))
    }

    pub fn to_map(&self) -> BTreeMap<&'static str, bool> {
        self.iter().map(|(cap, available)| (cap.name(), available)).collect()
    }
}

/// Registry of installed backends
pub struct Registry {
    capabilities: CapabilityMap,
    protector: Option<Arc<dyn Protector>>,
    vault: Option<Arc<dyn CredentialStore>>,
}

impl Registry {
    /// The process-wide registry of native backends, built on first use
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(|| Registry::native(&Settings::default()))
    }

    /// Build a registry of the native backends compiled into this build
    #[cfg_attr(
        not(any(feature = "encryption", feature = "vault")),
        allow(unused_variables)
    )]
    pub fn native(settings: &Settings) -> Self {
        let builder = Self::builder();

        #[cfg(feature = "encryption")]
        let builder = if crate::encryption::is_supported() {
            builder.protector(crate::encryption::DpapiProtector::new(&settings.encryption))
        } else {
            builder
        };

        #[cfg(feature = "vault")]
        let builder = if crate::vault::is_supported() {
            builder.vault(crate::vault::KeyringVault::new(&settings.vault))
        } else {
            builder
        };

        let registry = builder.build();
        info!("Native backends: {:?}", registry.capabilities.to_map());
        registry
    }

    /// Start a registry with explicitly chosen backends
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Read-only snapshot of backend availability
    pub fn available_modules(&self) -> &CapabilityMap {
        &self.capabilities
    }

    /// Fail unless `capability` is available
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.capabilities.is_available(capability) {
            Ok(())
        } else {
            debug!("Required module unavailable: {}", capability);
            Err(CoreError::module_unavailable(capability.name()))
        }
    }

    /// Fail unless the backend called `name` is available; unknown names fail
    pub fn require_module(&self, name: &str) -> Result<()> {
        match Capability::from_name(name) {
            Some(capability) => self.require(capability),
            None => Err(CoreError::module_unavailable(name)),
        }
    }

    fn protector_arc(&self) -> Result<&Arc<dyn Protector>> {
        self.require(Capability::Encryption)?;
        self.protector
            .as_ref()
            .ok_or_else(|| CoreError::module_unavailable(Capability::Encryption.name()))
    }

    fn vault_arc(&self) -> Result<&Arc<dyn CredentialStore>> {
        self.require(Capability::Vault)?;
        self.vault
            .as_ref()
            .ok_or_else(|| CoreError::module_unavailable(Capability::Vault.name()))
    }

    /// The encryption backend, if available
    pub fn encryption(&self) -> Result<&dyn Protector> {
        self.protector_arc().map(|p| &**p)
    }

    /// The vault backend, if available
    pub fn vault(&self) -> Result<&dyn CredentialStore> {
        self.vault_arc().map(|v| &**v)
    }

    /// Protect `data` for the current user with no entropy
    pub fn encrypt_with_backend(&self, data: &[u8], description: &str) -> Result<ProtectedBlob> {
        self.encryption()?
            .protect(data, None, Scope::CurrentUser, description)
    }

    /// Reverse [`Registry::encrypt_with_backend`], returning `(data, description)`
    pub fn decrypt_with_backend(&self, blob: &[u8]) -> Result<(Vec<u8>, String)> {
        self.encryption()?
            .unprotect(blob, None)
            .map(UnprotectedData::into_parts)
    }

    pub fn protect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        local_machine: bool,
        description: &str,
    ) -> Result<ProtectedBlob> {
        self.encryption()?.protect(
            data,
            entropy,
            Scope::from_local_machine(local_machine),
            description,
        )
    }

    pub fn unprotect(&self, blob: &[u8], entropy: Option<&[u8]>) -> Result<UnprotectedData> {
        self.encryption()?.unprotect(blob, entropy)
    }

    pub fn set_password(&self, service: &str, user: &str, secret: &str) -> Result<()> {
        self.vault()?.set_password(service, user, secret)
    }

    pub fn get_password(&self, service: &str, user: &str) -> Result<Option<String>> {
        self.vault()?.get_password(service, user)
    }

    pub fn delete_password(&self, service: &str, user: &str) -> Result<bool> {
        self.vault()?.delete_password(service, user)
    }

    pub fn list_services(&self) -> Result<Vec<String>> {
        self.vault()?.list_services()
    }

    pub fn list_credentials(&self) -> Result<Vec<CredentialKey>> {
        self.vault()?.list_credentials()
    }

    /// [`Registry::protect`] on the blocking pool
    pub async fn protect_async(
        &self,
        data: Vec<u8>,
        entropy: Option<Vec<u8>>,
        local_machine: bool,
        description: String,
    ) -> Result<ProtectedBlob> {
        let protector = Arc::clone(self.protector_arc()?);
        let data = Zeroizing::new(data);
        let entropy = entropy.map(Zeroizing::new);
        run_blocking(move || {
            protector.protect(
                &data,
                entropy.as_ref().map(|e| e.as_slice()),
                Scope::from_local_machine(local_machine),
                &description,
            )
        })
        .await
    }

    /// [`Registry::unprotect`] on the blocking pool
    pub async fn unprotect_async(
        &self,
        blob: Vec<u8>,
        entropy: Option<Vec<u8>>,
    ) -> Result<UnprotectedData> {
        let protector = Arc::clone(self.protector_arc()?);
        let entropy = entropy.map(Zeroizing::new);
        run_blocking(move || protector.unprotect(&blob, entropy.as_ref().map(|e| e.as_slice())))
            .await
    }

    /// [`Registry::set_password`] on the blocking pool
    pub async fn set_password_async(
        &self,
        service: String,
        user: String,
        secret: String,
    ) -> Result<()> {
        let vault = Arc::clone(self.vault_arc()?);
        let secret = Zeroizing::new(secret);
        run_blocking(move || vault.set_password(&service, &user, &secret)).await
    }

    /// [`Registry::get_password`] on the blocking pool
    pub async fn get_password_async(&self, service: String, user: String) -> Result<Option<String>> {
        let vault = Arc::clone(self.vault_arc()?);
        run_blocking(move || vault.get_password(&service, &user)).await
    }

    /// [`Registry::delete_password`] on the blocking pool
    pub async fn delete_password_async(&self, service: String, user: String) -> Result<bool> {
        let vault = Arc::clone(self.vault_arc()?);
        run_blocking(move || vault.delete_password(&service, &user)).await
    }

    /// [`Registry::list_services`] on the blocking pool
    pub async fn list_services_async(&self) -> Result<Vec<String>> {
        let vault = Arc::clone(self.vault_arc()?);
        run_blocking(move || vault.list_services()).await
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("capabilities", &self.capabilities)
            .field("protector", &self.protector.as_ref().map(|p| p.backend_name()))
            .field("vault", &self.vault.as_ref().map(|v| v.backend_name()))
            .finish()
    }
}

/// Builder for a [`Registry`] with injected backends
#[derive(Default)]
pub struct RegistryBuilder {
    protector: Option<Arc<dyn Protector>>,
    vault: Option<Arc<dyn CredentialStore>>,
}

impl RegistryBuilder {
    pub fn protector(mut self, protector: impl Protector + 'static) -> Self {
        self.protector = Some(Arc::new(protector));
        self
    }

    pub fn vault(mut self, vault: impl CredentialStore + 'static) -> Self {
        self.vault = Some(Arc::new(vault));
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            capabilities: CapabilityMap {
                encryption: self.protector.is_some(),
                vault: self.vault.is_some(),
            },
            protector: self.protector,
            vault: self.vault,
        }
    }
}

/// Backend availability of the process-wide registry
pub fn available_modules() -> &'static CapabilityMap {
    Registry::global().available_modules()
}

/// Fail unless the backend called `name` is available in this process
pub fn require_module(name: &str) -> Result<()> {
    Registry::global().require_module(name)
}

/// Protect `data` with the process-wide encryption backend
pub fn encrypt_with_backend(data: &[u8], description: &str) -> Result<ProtectedBlob> {
    Registry::global().encrypt_with_backend(data, description)
}

/// Unprotect a blob with the process-wide encryption backend
pub fn decrypt_with_backend(blob: &[u8]) -> Result<(Vec<u8>, String)> {
    Registry::global().decrypt_with_backend(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::MemoryProtector;
    use crate::vault::MemoryVault;

    fn full_registry() -> Registry {
        Registry::builder()
            .protector(MemoryProtector::new())
            .vault(MemoryVault::new())
            .build()
    }

    /// Vault that always fails, to check errors pass through untouched
    struct LockedVault;

    impl CredentialStore for LockedVault {
        fn set_password(&self, _: &str, _: &str, _: &str) -> Result<()> {
            Err(CoreError::VaultError("vault locked".to_string()))
        }

        fn get_password(&self, _: &str, _: &str) -> Result<Option<String>> {
            Err(CoreError::VaultError("vault locked".to_string()))
        }

        fn delete_password(&self, _: &str, _: &str) -> Result<bool> {
            Err(CoreError::VaultError("vault locked".to_string()))
        }

        fn list_credentials(&self) -> Result<Vec<CredentialKey>> {
            Err(CoreError::VaultError("vault locked".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "locked"
        }
    }

    fn assert_unavailable<T: std::fmt::Debug>(result: Result<T>, expected: &str) {
        match result {
            Err(CoreError::ModuleUnavailable { name }) => assert_eq!(name, expected),
            other => panic!("expected ModuleUnavailable({}), got {:?}", expected, other),
        }
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::from_name("encryption"), Some(Capability::Encryption));
        assert_eq!(Capability::from_name("vault"), Some(Capability::Vault));
        assert_eq!(Capability::from_name("dpapi"), None);
        assert_eq!(Capability::Vault.to_string(), "vault");
    }

    #[test]
    fn test_capability_map_follows_backends() {
        let empty = Registry::builder().build();
        assert_eq!(*empty.available_modules(), CapabilityMap::default());

        let vault_only = Registry::builder().vault(MemoryVault::new()).build();
        let map = vault_only.available_modules();
        assert!(!map.is_available(Capability::Encryption));
        assert!(map.is_available(Capability::Vault));
        assert_eq!(map.get("vault"), Some(true));
        assert_eq!(map.get("encryption"), Some(false));
        assert_eq!(map.get("nonexistent"), None);
    }

    #[test]
    fn test_capability_map_export() {
        let registry = full_registry();
        let map = registry.available_modules().to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["encryption"], true);
        assert_eq!(map["vault"], true);

        let json = serde_json::to_string(registry.available_modules()).unwrap();
        assert_eq!(json, r#"{"encryption":true,"vault":true}"#);
    }

    #[test]
    fn test_require_module() {
        let registry = Registry::builder().protector(MemoryProtector::new()).build();

        assert!(registry.require_module("encryption").is_ok());
        assert_unavailable(registry.require_module("vault"), "vault");
        assert_unavailable(registry.require_module("nonexistent"), "nonexistent");
    }

    #[test]
    fn test_encryption_wrappers_gated() {
        let registry = Registry::builder().vault(MemoryVault::new()).build();

        assert_unavailable(registry.encrypt_with_backend(b"test", ""), "encryption");
        assert_unavailable(registry.decrypt_with_backend(b"blob"), "encryption");
        assert_unavailable(registry.protect(b"test", None, false, ""), "encryption");
        assert_unavailable(registry.unprotect(b"blob", None), "encryption");
        assert!(registry.encryption().is_err());

        // The vault still works
        registry.set_password("svc", "user", "secret").unwrap();
        assert_eq!(
            registry.get_password("svc", "user").unwrap(),
            Some("secret".to_string())
        );
    }

    #[test]
    fn test_vault_wrappers_gated() {
        let registry = Registry::builder().protector(MemoryProtector::new()).build();

        assert_unavailable(registry.set_password("svc", "user", "secret"), "vault");
        assert_unavailable(registry.get_password("svc", "user"), "vault");
        assert_unavailable(registry.delete_password("svc", "user"), "vault");
        assert_unavailable(registry.list_services(), "vault");
        assert_unavailable(registry.list_credentials(), "vault");
    }

    #[test]
    fn test_encrypt_decrypt_with_backend() {
        let registry = full_registry();
        let blob = registry
            .encrypt_with_backend(b"Hello, DPAPI!", "Test encryption")
            .unwrap();
        let (data, description) = registry.decrypt_with_backend(blob.as_bytes()).unwrap();

        assert_eq!(data, b"Hello, DPAPI!");
        assert_eq!(description, "Test encryption");
    }

    #[test]
    fn test_protect_forwards_entropy() {
        let registry = full_registry();
        let blob = registry
            .protect(b"Hello, DPAPI!", Some(&b"test_entropy"[..]), false, "")
            .unwrap();

        let result = registry
            .unprotect(blob.as_bytes(), Some(&b"test_entropy"[..]))
            .unwrap();
        assert_eq!(result.data(), b"Hello, DPAPI!");
        assert_eq!(result.description(), "");

        assert!(matches!(
            registry.unprotect(blob.as_bytes(), Some(&b"wrong"[..])),
            Err(CoreError::ProtectionError(_))
        ));
    }

    #[test]
    fn test_vault_properties_through_registry() {
        let registry = full_registry();

        assert_eq!(registry.get_password("svc", "user").unwrap(), None);

        registry.set_password("svc", "user", "v1").unwrap();
        registry.set_password("svc", "user", "v2").unwrap();
        assert_eq!(
            registry.get_password("svc", "user").unwrap(),
            Some("v2".to_string())
        );

        registry.set_password("svc", "other", "v3").unwrap();
        assert_eq!(registry.list_services().unwrap(), vec!["svc".to_string()]);
        assert_eq!(registry.list_credentials().unwrap().len(), 2);

        assert!(registry.delete_password("svc", "user").unwrap());
        assert!(!registry.delete_password("svc", "user").unwrap());
        assert_eq!(registry.get_password("svc", "user").unwrap(), None);
    }

    #[test]
    fn test_backend_errors_pass_through() {
        let registry = Registry::builder().vault(LockedVault).build();

        for result in [
            registry.set_password("svc", "user", "secret").map(|_| ()),
            registry.get_password("svc", "user").map(|_| ()),
            registry.delete_password("svc", "user").map(|_| ()),
            registry.list_services().map(|_| ()),
        ] {
            match result {
                Err(CoreError::VaultError(msg)) => assert_eq!(msg, "vault locked"),
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn test_global_registry_matches_build() {
        let expected_encryption = cfg!(feature = "encryption") && crate::encryption::is_supported();
        let expected_vault = cfg!(feature = "vault") && crate::vault::is_supported();

        let map = available_modules();
        assert_eq!(map.is_available(Capability::Encryption), expected_encryption);
        assert_eq!(map.is_available(Capability::Vault), expected_vault);

        if !expected_encryption {
            assert_unavailable(encrypt_with_backend(b"test", ""), "encryption");
            assert_unavailable(require_module("encryption"), "encryption");
        }
        assert_unavailable(require_module("nonexistent"), "nonexistent");
    }

    #[test]
    fn test_global_registry_initialized_once() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| Registry::global() as *const Registry as usize))
            .collect();
        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(addresses.iter().all(|&addr| addr == addresses[0]));
        assert_eq!(addresses[0], Registry::global() as *const Registry as usize);
    }

    #[test]
    fn test_debug_lists_backends() {
        let debug = format!("{:?}", full_registry());
        assert!(debug.contains("In-memory AES-256-GCM"));
        assert!(debug.contains("In-memory vault"));
    }

    #[tokio::test]
    async fn test_async_roundtrip() {
        let registry = full_registry();
        let blob = registry
            .protect_async(
                b"async secret".to_vec(),
                Some(b"entropy".to_vec()),
                false,
                "async".to_string(),
            )
            .await
            .unwrap();
        let result = registry
            .unprotect_async(blob.into_bytes(), Some(b"entropy".to_vec()))
            .await
            .unwrap();

        assert_eq!(result.data(), b"async secret");
        assert_eq!(result.description(), "async");
    }

    #[tokio::test]
    async fn test_async_vault() {
        let registry = full_registry();
        registry
            .set_password_async("svc".to_string(), "user".to_string(), "secret".to_string())
            .await
            .unwrap();

        assert_eq!(
            registry
                .get_password_async("svc".to_string(), "user".to_string())
                .await
                .unwrap(),
            Some("secret".to_string())
        );
        assert_eq!(
            registry.list_services_async().await.unwrap(),
            vec!["svc".to_string()]
        );
        assert!(registry
            .delete_password_async("svc".to_string(), "user".to_string())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_async_gated() {
        let registry = Registry::builder().build();

        assert_unavailable(
            registry
                .protect_async(b"x".to_vec(), None, false, String::new())
                .await,
            "encryption",
        );
        assert_unavailable(registry.list_services_async().await, "vault");
    }
}
