use crate::error::{CryptoError, CryptoResult};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const NONCE_LEN: usize = 12;

/// AES-256-GCM, keyed by a single 32-byte key, wire format
/// `nonce(12B) || ciphertext+tag`.
///
/// Holds the raw key; zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct Aes256GcmEncryptor {
    #[zeroize(skip)]
    cipher: Aes256Gcm,
    key: [u8; 32],
}

impl Aes256GcmEncryptor {
    pub fn new(key: [u8; 32]) -> CryptoResult<Self> {
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { cipher, key })
    }

    pub fn generate_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Encrypts `plaintext`, returning `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts `nonce || ciphertext` produced by [`Self::encrypt`].
    pub fn decrypt(&self, wire: &[u8]) -> CryptoResult<Vec<u8>> {
        if wire.len() < NONCE_LEN {
            return Err(CryptoError::InvalidFormat);
        }
        let (nonce_bytes, ciphertext) = wire.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = Aes256GcmEncryptor::generate_key();
        let encryptor = Aes256GcmEncryptor::new(key).unwrap();

        let plaintext = b"a data encryption key, wrapped";
        let ciphertext = encryptor.encrypt(plaintext).unwrap();
        let decrypted = encryptor.decrypt(&ciphertext).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());
    }

    #[test]
    fn different_nonces_each_call() {
        let key = Aes256GcmEncryptor::generate_key();
        let encryptor = Aes256GcmEncryptor::new(key).unwrap();

        let plaintext = b"same plaintext";
        let a = encryptor.encrypt(plaintext).unwrap();
        let b = encryptor.encrypt(plaintext).unwrap();

        assert_ne!(a, b);
        assert_eq!(encryptor.decrypt(&a).unwrap(), plaintext);
        assert_eq!(encryptor.decrypt(&b).unwrap(), plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let key = Aes256GcmEncryptor::generate_key();
        let encryptor = Aes256GcmEncryptor::new(key).unwrap();

        let mut ciphertext = encryptor.encrypt(b"authenticated data").unwrap();
        *ciphertext.last_mut().unwrap() ^= 0xFF;

        assert!(encryptor.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn truncated_wire_format_is_rejected() {
        let key = Aes256GcmEncryptor::generate_key();
        let encryptor = Aes256GcmEncryptor::new(key).unwrap();
        assert!(encryptor.decrypt(&[0u8; 4]).is_err());
    }
}
