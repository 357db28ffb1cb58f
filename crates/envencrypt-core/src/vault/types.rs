//! Credential vault types

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Key of a credential record, unique per (service, user)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
    pub service: String,
    pub user: String,
}

impl CredentialKey {
    pub fn new(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }
}

impl std::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service, self.user)
    }
}

/// Reject keys the OS vaults cannot address
pub(crate) fn validate_key(service: &str, user: &str) -> Result<()> {
    if service.is_empty() {
        return Err(CoreError::VaultError(
            "Service name must not be empty".to_string(),
        ));
    }
    if user.is_empty() {
        return Err(CoreError::VaultError(
            "User name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering_groups_by_service() {
        let mut keys = vec![
            CredentialKey::new("b", "a"),
            CredentialKey::new("a", "z"),
            CredentialKey::new("a", "b"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                CredentialKey::new("a", "b"),
                CredentialKey::new("a", "z"),
                CredentialKey::new("b", "a"),
            ]
        );
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CredentialKey::new("github", "alice").to_string(), "github/alice");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("svc", "user").is_ok());
        assert!(matches!(
            validate_key("", "user"),
            Err(CoreError::VaultError(_))
        ));
        assert!(matches!(
            validate_key("svc", ""),
            Err(CoreError::VaultError(_))
        ));
    }
}
