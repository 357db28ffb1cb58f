//! In-process protector
//!
//! Stand-in for the OS facility on hosts where none exists, and the backend
//! the registry tests run against. Each instance draws a random AES-256-GCM
//! key, so its blobs are only readable by the same instance and die with it.
//!
//! Blob format:
//! `magic "EEP" | version u8 | scope u8 | nonce[12] | description_len u32 LE |
//! description UTF-8 | ciphertext || tag[16]`
//!
//! Everything before the ciphertext, followed by the entropy, is the
//! associated data, so entropy, scope and description are all bound.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use super::secure_memory::SessionKey;
use super::types::normalize_entropy;
use super::{ProtectedBlob, Protector, Scope, UnprotectedData};
use crate::error::{CoreError, Result};

const MAGIC: &[u8; 3] = b"EEP";
const VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
/// magic + version + scope + nonce + description length
const FIXED_HEADER_LEN: usize = 3 + 1 + 1 + NONCE_LEN + 4;

/// AES-256-GCM protector keyed per instance
#[derive(Debug)]
pub struct MemoryProtector {
    key: SessionKey,
}

impl MemoryProtector {
    pub fn new() -> Self {
        Self {
            key: SessionKey::generate(),
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.as_bytes())
            .map_err(|e| CoreError::ProtectionError(e.to_string()))
    }
}

impl Default for MemoryProtector {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of a parsed blob
struct BlobParts<'a> {
    header: &'a [u8],
    nonce: &'a [u8],
    description: &'a [u8],
    ciphertext: &'a [u8],
}

fn scope_byte(scope: Scope) -> u8 {
    match scope {
        Scope::CurrentUser => 0,
        Scope::LocalMachine => 1,
    }
}

fn parse_blob(blob: &[u8]) -> Result<BlobParts<'_>> {
    if blob.len() < FIXED_HEADER_LEN + TAG_LEN {
        return Err(CoreError::ProtectionError("Blob truncated".to_string()));
    }
    if &blob[..3] != MAGIC {
        return Err(CoreError::ProtectionError(
            "Unrecognized blob format".to_string(),
        ));
    }
    if blob[3] != VERSION {
        return Err(CoreError::ProtectionError(format!(
            "Unsupported blob version: {}",
            blob[3]
        )));
    }
    if blob[4] > 1 {
        return Err(CoreError::ProtectionError(format!(
            "Invalid scope byte: {}",
            blob[4]
        )));
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&blob[FIXED_HEADER_LEN - 4..FIXED_HEADER_LEN]);
    let description_len = u32::from_le_bytes(len_bytes) as usize;

    let header_len = FIXED_HEADER_LEN
        .checked_add(description_len)
        .filter(|len| blob.len().saturating_sub(TAG_LEN) >= *len)
        .ok_or_else(|| CoreError::ProtectionError("Blob truncated".to_string()))?;

    Ok(BlobParts {
        header: &blob[..header_len],
        nonce: &blob[5..5 + NONCE_LEN],
        description: &blob[FIXED_HEADER_LEN..header_len],
        ciphertext: &blob[header_len..],
    })
}

fn associated_data(header: &[u8], entropy: Option<&[u8]>) -> Zeroizing<Vec<u8>> {
    let entropy = entropy.unwrap_or_default();
    let mut aad = Zeroizing::new(Vec::with_capacity(header.len() + entropy.len()));
    aad.extend_from_slice(header);
    aad.extend_from_slice(entropy);
    aad
}

impl Protector for MemoryProtector {
    fn protect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: Scope,
        description: &str,
    ) -> Result<ProtectedBlob> {
        let entropy = normalize_entropy(entropy);
        let description_len = u32::try_from(description.len()).map_err(|_| {
            CoreError::ProtectionError("Description too long".to_string())
        })?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut blob =
            Vec::with_capacity(FIXED_HEADER_LEN + description.len() + data.len() + TAG_LEN);
        blob.extend_from_slice(MAGIC);
        blob.push(VERSION);
        blob.push(scope_byte(scope));
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&description_len.to_le_bytes());
        blob.extend_from_slice(description.as_bytes());

        let aad = associated_data(&blob, entropy);
        let ciphertext = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: data,
                    aad: &aad,
                },
            )
            .map_err(|e| CoreError::ProtectionError(e.to_string()))?;
        blob.extend_from_slice(&ciphertext);

        debug!("Protected {} bytes into {} byte blob", data.len(), blob.len());
        Ok(ProtectedBlob::new(blob))
    }

    fn unprotect(&self, blob: &[u8], entropy: Option<&[u8]>) -> Result<UnprotectedData> {
        let entropy = normalize_entropy(entropy);
        let parts = parse_blob(blob)?;
        let description = String::from_utf8(parts.description.to_vec())
            .map_err(|e| CoreError::ProtectionError(format!("Invalid description: {}", e)))?;
        let aad = associated_data(parts.header, entropy);

        let data = self
            .cipher()?
            .decrypt(
                Nonce::from_slice(parts.nonce),
                Payload {
                    msg: parts.ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| {
                CoreError::ProtectionError(
                    "Blob does not authenticate: wrong entropy or corrupted data".to_string(),
                )
            })?;

        debug!("Unprotected {} byte blob", blob.len());
        Ok(UnprotectedData::new(data, description))
    }

    fn backend_name(&self) -> &'static str {
        "In-memory AES-256-GCM"
    }
}
