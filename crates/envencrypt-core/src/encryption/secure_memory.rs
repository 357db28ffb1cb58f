//! Key material for the in-process protector

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 256-bit session key - automatically zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SessionKey {
    key: [u8; 32],
}

impl SessionKey {
    /// Draw a fresh key from the OS RNG
    pub(crate) fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self { key }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let a = SessionKey::generate();
        let b = SessionKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_debug_redacted() {
        let key = SessionKey::generate();
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
    }
}
