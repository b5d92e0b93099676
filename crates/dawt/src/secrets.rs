//! Secret resolution and at-rest encryption of stored credentials.
//!
//! Engine API keys are resolved from a direct value, a file (Docker secrets
//! style) or an environment variable, in that order. Stored session
//! credentials are sealed with AES-256-GCM under a key taken from
//! `DAWT_TOKEN_KEY`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source: direct value, file
/// contents, then environment variable.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return std::fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|source| SecretError::FileReadError {
                path: expanded,
                source,
            });
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return std::env::var(name)
            .map(|value| SecretString::from(value.trim().to_string()))
            .map_err(|_| SecretError::EnvVarNotSet {
                name: name.to_string(),
            });
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but a missing source is `Ok(None)`.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` or `~/` to the home directory.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

/// Environment variable holding the 64-char hex credential key.
pub const TOKEN_KEY_ENV_VAR: &str = "DAWT_TOKEN_KEY";

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// AES-256-GCM sealing of credential values.
///
/// Ciphertext layout is `hex(nonce || ciphertext)` with a fresh random
/// nonce per call.
pub struct TokenEncryptor {
    cipher: Aes256Gcm,
}

impl TokenEncryptor {
    pub fn from_env() -> Result<Self> {
        let key_hex = std::env::var(TOKEN_KEY_ENV_VAR).map_err(|_| {
            SecretError::InvalidKey(format!(
                "Environment variable {} not set",
                TOKEN_KEY_ENV_VAR
            ))
        })?;
        Self::from_hex_key(key_hex.trim())
    }

    pub fn from_hex_key(key_hex: &str) -> Result<Self> {
        let key_bytes = hex_decode(key_hex)
            .map_err(|e| SecretError::InvalidKey(format!("Invalid hex key: {}", e)))?;

        if key_bytes.len() != KEY_SIZE {
            return Err(SecretError::InvalidKey(format!(
                "Key must be {} bytes ({} hex chars), got {} bytes",
                KEY_SIZE,
                KEY_SIZE * 2,
                key_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| SecretError::InvalidKey(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// Generates a fresh random key, hex-encoded, suitable for `DAWT_TOKEN_KEY`.
    pub fn generate_key_hex() -> Result<String> {
        Ok(hex_encode(&rand_bytes::<KEY_SIZE>()?))
    }

    pub fn encrypt(&self, plaintext: &SecretString) -> Result<String> {
        let nonce_bytes = rand_bytes::<NONCE_SIZE>()?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.expose_secret().as_bytes())
            .map_err(|e| SecretError::EncryptionError(e.to_string()))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend(ciphertext);
        Ok(hex_encode(&sealed))
    }

    /// Decrypts a sealed value. Any tampering or key mismatch is an error;
    /// partial plaintext is never returned.
    pub fn decrypt(&self, sealed_hex: &str) -> Result<SecretString> {
        let sealed = hex_decode(sealed_hex)
            .map_err(|e| SecretError::DecryptionError(format!("Invalid hex: {}", e)))?;

        if sealed.len() <= NONCE_SIZE {
            return Err(SecretError::DecryptionError(
                "Ciphertext too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| SecretError::DecryptionError(e.to_string()))?;

        String::from_utf8(plaintext)
            .map(SecretString::from)
            .map_err(|e| SecretError::DecryptionError(format!("Invalid UTF-8: {}", e)))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(HEX_CHARS[(byte >> 4) as usize] as char);
        out.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
    }
    out
}

fn hex_decode(hex: &str) -> std::result::Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err("Hex string must have even length".to_string());
    }
    if !hex.is_ascii() {
        return Err("Hex string must be ASCII".to_string());
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| format!("Invalid hex at position {}: {}", i, e))
        })
        .collect()
}

fn rand_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    getrandom::fill(&mut bytes).map_err(|e| {
        SecretError::EncryptionError(format!("Failed to generate random bytes: {}", e))
    })?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("DAWT_TEST_SECRET_1", "env_value");
        let result =
            resolve_secret(Some("direct_value"), None, Some("DAWT_TEST_SECRET_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("DAWT_TEST_SECRET_1");
    }

    #[test]
    #[serial]
    fn test_file_then_env_fallback() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  file_value  ").unwrap();

        std::env::set_var("DAWT_TEST_SECRET_2", "env_value");
        let from_file = resolve_secret(
            Some(""),
            Some(file.path().to_str().unwrap()),
            Some("DAWT_TEST_SECRET_2"),
        )
        .unwrap();
        assert_eq!(from_file.expose_secret(), "file_value");

        let from_env = resolve_secret(None, None, Some("DAWT_TEST_SECRET_2")).unwrap();
        assert_eq!(from_env.expose_secret(), "env_value");
        std::env::remove_var("DAWT_TEST_SECRET_2");
    }

    #[test]
    fn test_missing_sources() {
        assert!(matches!(
            resolve_secret(None, None, None),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(resolve_secret_optional(None, Some(""), None)
            .unwrap()
            .is_none());
        assert!(matches!(
            resolve_secret(None, None, Some("DAWT_DEFINITELY_UNSET_VAR")),
            Err(SecretError::EnvVarNotSet { .. })
        ));
        assert!(matches!(
            resolve_secret(None, Some("/nonexistent/dawt/secret"), None),
            Err(SecretError::FileReadError { .. })
        ));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip_with_fresh_nonce() {
        let encryptor = TokenEncryptor::from_hex_key(TEST_KEY).unwrap();
        let first = encryptor.encrypt(&secret("session-abc")).unwrap();
        let second = encryptor.encrypt(&secret("session-abc")).unwrap();

        assert_ne!(first, second);
        assert_eq!(encryptor.decrypt(&first).unwrap().expose_secret(), "session-abc");
        assert_eq!(encryptor.decrypt(&second).unwrap().expose_secret(), "session-abc");
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(matches!(
            TokenEncryptor::from_hex_key("0123456789abcdef"),
            Err(SecretError::InvalidKey(_))
        ));
        assert!(matches!(
            TokenEncryptor::from_hex_key("zz23456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"),
            Err(SecretError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let encryptor = TokenEncryptor::from_hex_key(TEST_KEY).unwrap();
        let sealed = encryptor.encrypt(&secret("token")).unwrap();

        let mut bytes = hex_decode(&sealed).unwrap();
        if let Some(last) = bytes.last_mut() {
            *last ^= 0xff;
        }
        assert!(matches!(
            encryptor.decrypt(&hex_encode(&bytes)),
            Err(SecretError::DecryptionError(_))
        ));
        assert!(matches!(
            encryptor.decrypt("aabb"),
            Err(SecretError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_wrong_key_cannot_decrypt() {
        let encryptor = TokenEncryptor::from_hex_key(TEST_KEY).unwrap();
        let other = TokenEncryptor::from_hex_key(&TokenEncryptor::generate_key_hex().unwrap())
            .unwrap();
        let sealed = encryptor.encrypt(&secret("token")).unwrap();
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_generated_key_is_valid() {
        let key = TokenEncryptor::generate_key_hex().unwrap();
        assert_eq!(key.len(), 64);
        assert!(TokenEncryptor::from_hex_key(&key).is_ok());
    }
}
