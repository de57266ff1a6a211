//! Cycling-key XOR cipher.

use odfce_types::{OdfceError, Result};

/// XORs `bytes` with `key`, cycling the key byte for byte.
///
/// The operation is its own inverse.
///
/// # Errors
///
/// Returns [`OdfceError::InvalidKey`] if the key is empty or all zero.
pub fn xor(bytes: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let cipher = Cipher::new(key.to_vec())?;
    let mut out = bytes.to_vec();
    cipher.apply(&mut out);
    Ok(out)
}

/// A validated XOR key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cipher {
    key: Vec<u8>,
}

impl Cipher {
    /// Creates a cipher.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::InvalidKey`] if the key is empty or all zero.
    pub fn new(key: Vec<u8>) -> Result<Self> {
        if key.is_empty() {
            return Err(OdfceError::InvalidKey("key is empty".into()));
        }
        if key.iter().all(|b| *b == 0) {
            return Err(OdfceError::InvalidKey("key is all zero".into()));
        }
        Ok(Self { key })
    }

    /// The key bytes.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Encrypts or decrypts a packed buffer in place.
    pub fn apply(&self, buf: &mut [u8]) {
        for (byte, k) in buf.iter_mut().zip(self.key.iter().cycle()) {
            *byte ^= k;
        }
    }
}
