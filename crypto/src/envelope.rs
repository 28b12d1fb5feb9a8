//! Envelope-encryption primitive: wrap/unwrap a data encryption key (DEK)
//! under a key-encryption key (KEK). This is the mechanism the local KMS
//! provider builds on; cloud providers delegate the equivalent operation to
//! their own service instead.

use crate::aes_gcm::Aes256GcmEncryptor;
use crate::error::CryptoResult;
use zeroize::Zeroizing;

/// Encrypts `dek` under `kek`, producing `nonce || ciphertext`.
pub fn wrap_dek(kek: &[u8; 32], dek: &[u8]) -> CryptoResult<Vec<u8>> {
    Aes256GcmEncryptor::new(*kek)?.encrypt(dek)
}

/// Reverses [`wrap_dek`].
pub fn unwrap_dek(kek: &[u8; 32], wrapped: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let plaintext = Aes256GcmEncryptor::new(*kek)?.decrypt(wrapped)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes_gcm::Aes256GcmEncryptor;

    #[test]
    fn wrap_then_unwrap_round_trips() {
        let kek = Aes256GcmEncryptor::generate_key();
        let dek = Aes256GcmEncryptor::generate_key();

        let wrapped = wrap_dek(&kek, &dek).unwrap();
        let unwrapped = unwrap_dek(&kek, &wrapped).unwrap();

        assert_eq!(&dek[..], &unwrapped[..]);
    }

    #[test]
    fn wrong_kek_fails_to_unwrap() {
        let kek1 = Aes256GcmEncryptor::generate_key();
        let kek2 = Aes256GcmEncryptor::generate_key();
        let dek = Aes256GcmEncryptor::generate_key();

        let wrapped = wrap_dek(&kek1, &dek).unwrap();
        assert!(unwrap_dek(&kek2, &wrapped).is_err());
    }
}
