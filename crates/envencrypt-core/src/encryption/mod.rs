//! Encryption backend
//!
//! Protect/unprotect byte payloads through a data-protection facility:
//! - [`DpapiProtector`]: Windows DPAPI (native, behind the `encryption` feature)
//! - [`MemoryProtector`]: in-process AES-256-GCM stand-in
//!
//! Entropy is caller-supplied and optional; an empty slice counts as none.
//! A blob protected with entropy only opens with the same entropy.

#[cfg(feature = "encryption")]
mod dpapi;
mod memory;
mod secure_memory;
mod traits;
mod types;

#[cfg(feature = "encryption")]
pub use dpapi::DpapiProtector;
pub use memory::MemoryProtector;
pub use traits::Protector;
pub use types::{ProtectedBlob, Scope, UnprotectedData};

#[cfg(feature = "encryption")]
use crate::error::Result;

/// Whether this target has a native data-protection facility
pub fn is_supported() -> bool {
    cfg!(windows)
}

/// Protect `data` with the native facility and default settings
#[cfg(feature = "encryption")]
pub fn protect(
    data: &[u8],
    entropy: Option<&[u8]>,
    local_machine: bool,
    description: &str,
) -> Result<ProtectedBlob> {
    DpapiProtector::default().protect(
        data,
        entropy,
        Scope::from_local_machine(local_machine),
        description,
    )
}

/// Unprotect a blob with the native facility, returning `(data, description)`
#[cfg(feature = "encryption")]
pub fn unprotect(blob: &[u8], entropy: Option<&[u8]>) -> Result<(Vec<u8>, String)> {
    DpapiProtector::default()
        .unprotect(blob, entropy)
        .map(UnprotectedData::into_parts)
}

#[cfg(all(test, feature = "encryption"))]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_entry_points_follow_platform() {
        let result = protect(b"Hello, DPAPI!", Some(&b"test_entropy"[..]), false, "");

        if is_supported() {
            let blob = result.unwrap();
            let (data, description) = unprotect(blob.as_bytes(), Some(&b"test_entropy"[..])).unwrap();
            assert_eq!(data, b"Hello, DPAPI!");
            assert_eq!(description, "");
        } else {
            assert!(matches!(
                result,
                Err(CoreError::PlatformUnsupported { .. })
            ));
            assert!(matches!(
                unprotect(b"blob", None),
                Err(CoreError::PlatformUnsupported { .. })
            ));
        }
    }
}
