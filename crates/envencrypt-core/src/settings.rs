//! Backend settings
//!
//! Settings are plain data. The core never reads files or environment
//! variables itself; the host builds a [`Settings`] (or parses one it
//! already holds with [`Settings::from_json`]) and hands it to
//! [`crate::Registry::native`].

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Namespace used for the vault index when none is configured
pub const DEFAULT_NAMESPACE: &str = "envencrypt";

/// Encryption backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EncryptionSettings {
    /// Allow the OS to surface a prompt during protect/unprotect.
    /// When false the native call fails instead of prompting.
    pub allow_prompts: bool,
}

/// Credential vault configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultSettings {
    /// Service name under which the enumeration index is kept
    pub namespace: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Settings for the native backends
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub encryption: EncryptionSettings,
    pub vault: VaultSettings,
}

impl Settings {
    /// Parse settings from a JSON document; missing fields take defaults
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Serialize settings to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
