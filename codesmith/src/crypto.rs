use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_SALT: &[u8] = b"codesmith/system-settings/v1";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to derive encryption key: {0}")]
    KeyDerivation(String),
    #[error("encryption failed")]
    Encrypt,
    #[error("stored secret is malformed or was encrypted with a different key")]
    Decrypt,
}

/// Encrypts secrets stored in the database (AES-256-GCM, base64 `nonce || ciphertext`).
///
/// The key is derived from the configured `secret_key` with Argon2, once at startup.
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    pub fn from_secret_key(secret_key: &str) -> Result<Self, CryptoError> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(secret_key.as_bytes(), KEY_SALT, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self.cipher.encrypt(&nonce, plaintext.as_bytes()).map_err(|_| CryptoError::Encrypt)?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let sealed = STANDARD.decode(encoded).map_err(|_| CryptoError::Decrypt)?;
        if sealed.len() <= NONCE_LEN {
            return Err(CryptoError::Decrypt);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Decrypt)
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(..)")
    }
}

/// Last four characters of a secret, for display
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_then_decrypt() {
        let cipher = SecretCipher::from_secret_key("test-secret-key").unwrap();
        let sealed = cipher.encrypt("AIza-example-key").unwrap();

        assert_ne!(sealed, "AIza-example-key");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "AIza-example-key");
    }

    #[test]
    fn test_nonce_differs_per_encryption() {
        let cipher = SecretCipher::from_secret_key("test-secret-key").unwrap();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = SecretCipher::from_secret_key("key-one").unwrap().encrypt("value").unwrap();
        let other = SecretCipher::from_secret_key("key-two").unwrap();
        assert!(matches!(other.decrypt(&sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_garbage_input_fails() {
        let cipher = SecretCipher::from_secret_key("test-secret-key").unwrap();
        assert!(cipher.decrypt("not base64!").is_err());
        assert!(cipher.decrypt(&STANDARD.encode([0u8; 4])).is_err());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abcdefgh"), "****efgh");
        assert_eq!(mask_secret("abc"), "****");
    }
}
