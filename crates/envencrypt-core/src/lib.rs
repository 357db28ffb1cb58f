//! # envencrypt-core
//!
//! Platform-backed secret protection for host applications:
//! - Encryption backend: protect/unprotect through the OS data-protection facility
//! - Credential vault backend: (service, user)-keyed secrets in the OS vault
//! - Capability registry: which backends this build carries, and gating on them
//!
//! Native backends are cargo features (`encryption`, `vault`). Whether one
//! is usable in this process is answered by [`available_modules`], and every
//! convenience call goes through [`require_module`] first.

pub mod encryption;
pub mod error;
pub mod offload;
pub mod registry;
pub mod settings;
pub mod vault;

pub use encryption::{MemoryProtector, ProtectedBlob, Protector, Scope, UnprotectedData};
pub use error::{CoreError, Result};
pub use registry::{
    available_modules, decrypt_with_backend, encrypt_with_backend, require_module, Capability,
    CapabilityMap, Registry, RegistryBuilder,
};
pub use settings::Settings;
pub use vault::{CredentialKey, CredentialStore, MemoryVault};

#[cfg(feature = "encryption")]
pub use encryption::DpapiProtector;
#[cfg(feature = "vault")]
pub use vault::KeyringVault;

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
