//! Protection backend trait

use super::{ProtectedBlob, Scope, UnprotectedData};
use crate::error::Result;

/// Boundary to a data-protection facility
///
/// Implementations are stateless per call and may block. Empty entropy is
/// equivalent to no entropy.
pub trait Protector: Send + Sync {
    /// Protect `data`, binding `entropy` and `description` to the blob
    fn protect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: Scope,
        description: &str,
    ) -> Result<ProtectedBlob>;

    /// Recover data and description; fails on entropy mismatch or a bad blob
    fn unprotect(&self, blob: &[u8], entropy: Option<&[u8]>) -> Result<UnprotectedData>;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}
