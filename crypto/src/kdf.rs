use crate::error::CryptoError;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

pub type KdfResult<T> = Result<T, CryptoError>;

/// HKDF-SHA256 (RFC 5869), used to derive per-key wrapping keys from the
/// local KMS master key so that no two keys in the store share a KEK.
pub struct Kdf;

impl Kdf {
    /// `okm = HKDF-Expand(HKDF-Extract(salt, ikm), info, length)`.
    pub fn hkdf(ikm: &[u8], salt: &[u8], info: &[u8], length: usize) -> KdfResult<Zeroizing<Vec<u8>>> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut okm = Zeroizing::new(vec![0u8; length]);
        hkdf.expand(info, &mut okm)
            .map_err(|_| CryptoError::KeyDerivationFailed("HKDF expand failed".to_string()))?;
        Ok(okm)
    }

    /// HKDF output narrowed to a 32-byte AES-256 key.
    pub fn derive_aes256_key(ikm: &[u8], salt: &[u8], info: &[u8]) -> KdfResult<[u8; 32]> {
        let derived = Self::hkdf(ikm, salt, info, 32)?;
        let mut key = [0u8; 32];
        key.copy_from_slice(&derived);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_key() {
        let master = b"master_key_material_32_bytes!!!";
        let a = Kdf::derive_aes256_key(master, b"salt", b"key-id-1").unwrap();
        let b = Kdf::derive_aes256_key(master, b"salt", b"key-id-1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_info_produces_different_keys() {
        let master = b"master_key_material_32_bytes!!!";
        let a = Kdf::derive_aes256_key(master, b"salt", b"key-id-1").unwrap();
        let b = Kdf::derive_aes256_key(master, b"salt", b"key-id-2").unwrap();
        assert_ne!(a, b);
    }
}
