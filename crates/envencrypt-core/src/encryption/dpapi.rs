//! Windows Data Protection API backend
//!
//! `CryptProtectData` / `CryptUnprotectData` with the description carried in
//! the blob itself. On any other OS every call fails with
//! `PlatformUnsupported` before touching the system.

use tracing::debug;

use super::types::normalize_entropy;
use super::{ProtectedBlob, Protector, Scope, UnprotectedData};
use crate::error::{CoreError, Result};
use crate::settings::EncryptionSettings;

const FACILITY: &str = "Windows Data Protection API";

/// Native DPAPI protector
#[derive(Debug, Clone, Default)]
pub struct DpapiProtector {
    allow_prompts: bool,
}

impl DpapiProtector {
    pub fn new(settings: &EncryptionSettings) -> Self {
        Self {
            allow_prompts: settings.allow_prompts,
        }
    }
}

impl Protector for DpapiProtector {
    fn protect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: Scope,
        description: &str,
    ) -> Result<ProtectedBlob> {
        if !super::is_supported() {
            return Err(CoreError::PlatformUnsupported { facility: FACILITY });
        }

        let blob = native::protect(
            data,
            normalize_entropy(entropy),
            scope.is_local_machine(),
            self.allow_prompts,
            description,
        )?;
        debug!(
            "DPAPI protected {} bytes ({:?} scope)",
            data.len(),
            scope
        );
        Ok(ProtectedBlob::new(blob))
    }

    fn unprotect(&self, blob: &[u8], entropy: Option<&[u8]>) -> Result<UnprotectedData> {
        if !super::is_supported() {
            return Err(CoreError::PlatformUnsupported { facility: FACILITY });
        }

        let (data, description) =
            native::unprotect(blob, normalize_entropy(entropy), self.allow_prompts)?;
        debug!("DPAPI unprotected {} byte blob", blob.len());
        Ok(UnprotectedData::new(data, description))
    }

    fn backend_name(&self) -> &'static str {
        FACILITY
    }
}

#[cfg(windows)]
mod native {
    use std::{ffi::c_void, ptr::null_mut, slice};

    use windows::core::{PCWSTR, PWSTR};
    use windows::Win32::{
        Foundation::{LocalFree, HLOCAL},
        Security::Cryptography::{
            CryptProtectData, CryptUnprotectData, CRYPTPROTECT_LOCAL_MACHINE,
            CRYPTPROTECT_UI_FORBIDDEN, CRYPT_INTEGER_BLOB as DATA_BLOB,
        },
    };

    use crate::error::{CoreError, Result};

    fn to_blob(bytes: &[u8]) -> DATA_BLOB {
        DATA_BLOB {
            cbData: bytes.len() as u32,
            pbData: bytes.as_ptr() as *mut u8,
        }
    }

    /// Copy out an OS-allocated blob and release it
    fn take_blob(blob: &mut DATA_BLOB) -> Vec<u8> {
        if blob.pbData.is_null() {
            return Vec::new();
        }
        unsafe {
            let data = slice::from_raw_parts(blob.pbData, blob.cbData as usize).to_vec();
            LocalFree(Some(HLOCAL(blob.pbData as *mut c_void)));
            blob.pbData = null_mut();
            data
        }
    }

    fn check_len(len: usize) -> Result<()> {
        u32::try_from(len)
            .map(|_| ())
            .map_err(|_| CoreError::ProtectionError("Input exceeds 4 GiB".to_string()))
    }

    fn base_flags(allow_prompts: bool) -> u32 {
        if allow_prompts {
            0
        } else {
            CRYPTPROTECT_UI_FORBIDDEN
        }
    }

    pub(super) fn protect(
        data: &[u8],
        entropy: Option<&[u8]>,
        local_machine: bool,
        allow_prompts: bool,
        description: &str,
    ) -> Result<Vec<u8>> {
        check_len(data.len())?;
        check_len(entropy.map_or(0, <[u8]>::len))?;

        let in_blob = to_blob(data);
        let entropy_blob = entropy.map(to_blob);
        let entropy_ptr = entropy_blob.as_ref().map(|b| b as *const DATA_BLOB);
        let wide_description: Vec<u16> = description
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        let mut out_blob = DATA_BLOB {
            cbData: 0,
            pbData: null_mut(),
        };
        let mut flags = base_flags(allow_prompts);
        if local_machine {
            flags |= CRYPTPROTECT_LOCAL_MACHINE;
        }

        unsafe {
            CryptProtectData(
                &in_blob,
                PCWSTR(wide_description.as_ptr()),
                entropy_ptr,
                None,
                None,
                flags,
                &mut out_blob,
            )
            .map_err(|e| CoreError::ProtectionError(format!("CryptProtectData: {}", e)))?;
        }
        Ok(take_blob(&mut out_blob))
    }

    pub(super) fn unprotect(
        cipher: &[u8],
        entropy: Option<&[u8]>,
        allow_prompts: bool,
    ) -> Result<(Vec<u8>, String)> {
        check_len(cipher.len())?;
        check_len(entropy.map_or(0, <[u8]>::len))?;

        let in_blob = to_blob(cipher);
        let entropy_blob = entropy.map(to_blob);
        let entropy_ptr = entropy_blob.as_ref().map(|b| b as *const DATA_BLOB);

        let mut out_blob = DATA_BLOB {
            cbData: 0,
            pbData: null_mut(),
        };
        let mut description = PWSTR::null();

        unsafe {
            CryptUnprotectData(
                &in_blob,
                Some(&mut description as *mut PWSTR),
                entropy_ptr,
                None,
                None,
                base_flags(allow_prompts),
                &mut out_blob,
            )
            .map_err(|e| CoreError::ProtectionError(format!("CryptUnprotectData: {}", e)))?;
        }

        let data = take_blob(&mut out_blob);
        if description.is_null() {
            return Ok((data, String::new()));
        }
        let decoded = unsafe {
            let decoded = description.to_string();
            LocalFree(Some(HLOCAL(description.0 as *mut c_void)));
            decoded
        };
        let description = decoded
            .map_err(|e| CoreError::ProtectionError(format!("Invalid description: {}", e)))?;
        Ok((data, description))
    }
}

#[cfg(not(windows))]
mod native {
    use crate::error::{CoreError, Result};

    pub(super) fn protect(
        _data: &[u8],
        _entropy: Option<&[u8]>,
        _local_machine: bool,
        _allow_prompts: bool,
        _description: &str,
    ) -> Result<Vec<u8>> {
        Err(CoreError::PlatformUnsupported {
            facility: super::FACILITY,
        })
    }

    pub(super) fn unprotect(
        _cipher: &[u8],
        _entropy: Option<&[u8]>,
        _allow_prompts: bool,
    ) -> Result<(Vec<u8>, String)> {
        Err(CoreError::PlatformUnsupported {
            facility: super::FACILITY,
        })
    }
}
