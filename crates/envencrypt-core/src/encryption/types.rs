//! Value types shared by the protection backends

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, Result};

/// Who may unprotect a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// Only the account that produced the blob
    #[default]
    CurrentUser,
    /// Any account on the machine
    LocalMachine,
}

impl Scope {
    /// Map the `local_machine` flag used by the entry points
    pub fn from_local_machine(local_machine: bool) -> Self {
        if local_machine {
            Self::LocalMachine
        } else {
            Self::CurrentUser
        }
    }

    pub fn is_local_machine(self) -> bool {
        self == Self::LocalMachine
    }
}

/// Opaque output of a protect call
///
/// The internal layout belongs to the backend that produced it and is not
/// stable across machines or OS upgrades. `Display` renders lowercase hex so
/// a blob can be kept in a text file; [`ProtectedBlob::from_hex`] reverses it.
#[derive(Clone, PartialEq, Eq)]
pub struct ProtectedBlob(Vec<u8>);

impl ProtectedBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the hex form produced by `Display`
    pub fn from_hex(s: &str) -> Result<Self> {
        hex::decode(s.trim())
            .map(Self)
            .map_err(|e| CoreError::ProtectionError(format!("Invalid blob hex: {}", e)))
    }
}

impl From<Vec<u8>> for ProtectedBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ProtectedBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for ProtectedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl std::fmt::Debug for ProtectedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectedBlob")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Result of a successful unprotect - zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct UnprotectedData {
    data: Vec<u8>,
    description: String,
}

impl UnprotectedData {
    pub fn new(data: Vec<u8>, description: String) -> Self {
        Self { data, description }
    }

    /// The recovered plaintext (use carefully - avoid copying)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Description bound at protect time, empty if none was given
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Consume and return `(data, description)`
    pub fn into_parts(mut self) -> (Vec<u8>, String) {
        (
            std::mem::take(&mut self.data),
            std::mem::take(&mut self.description),
        )
    }
}

impl std::fmt::Debug for UnprotectedData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnprotectedData")
            .field("data", &"[REDACTED]")
            .field("description", &self.description)
            .finish()
    }
}

/// Treat empty entropy exactly like absent entropy
pub(crate) fn normalize_entropy(entropy: Option<&[u8]>) -> Option<&[u8]> {
    entropy.filter(|e| !e.is_empty())
}
