//! Local credential store
//!
//! Persists a single API key encrypted with AES-256-GCM. The encryption key is
//! derived on every access from the hostname and the working directory, and is
//! never written anywhere. A file copied to another machine or read from
//! another directory therefore fails to decrypt and is discarded.
//!
//! This scopes the credential to a location and keeps it out of plain sight.
//! It is obfuscation, not protection: anyone who can run code as the user on
//! the same machine can derive the same key.

use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tokio::fs;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Marker for encrypted values on disk
pub const ENCRYPTED_PREFIX: &str = "ENC:";

/// File name of the stored credential
pub const CREDENTIAL_FILE: &str = "api_key.enc";

const KEY_DERIVATION_TAG: &[u8] = b"speakdown-credential-store-v1";
const NONCE_LEN: usize = 12;

/// Credential errors
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("API key must not be empty")]
    EmptyKey,

    #[error("Cannot determine credential scope: {0}")]
    Scope(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Credentials configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsConfig {
    /// Override for the credential file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
enum Scope {
    /// Hostname and current directory, looked up at each access.
    Machine,
    Fixed { hostname: String, working_dir: PathBuf },
}

/// Encrypted single-key store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    scope: Scope,
}

impl CredentialStore {
    /// Store at `path`, scoped to this machine and the process's working directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scope: Scope::Machine,
        }
    }

    /// Store at `path` with an explicit scope.
    pub fn with_scope(
        path: impl Into<PathBuf>,
        hostname: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            path: path.into(),
            scope: Scope::Fixed {
                hostname: hostname.into(),
                working_dir: working_dir.into(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scope_seed(&self) -> Result<Vec<u8>> {
        let (hostname, working_dir) = match &self.scope {
            Scope::Machine => {
                let hostname = hostname::get()
                    .map_err(|e| CredentialError::Scope(format!("hostname: {}", e)))?
                    .to_string_lossy()
                    .into_owned();
                let working_dir = std::env::current_dir()
                    .map_err(|e| CredentialError::Scope(format!("working directory: {}", e)))?;
                (hostname, working_dir)
            }
            Scope::Fixed {
                hostname,
                working_dir,
            } => (hostname.clone(), working_dir.clone()),
        };

        let mut seed = Vec::with_capacity(hostname.len() + 1 + 64);
        seed.extend_from_slice(hostname.as_bytes());
        seed.push(0);
        seed.extend_from_slice(working_dir.to_string_lossy().as_bytes());
        Ok(seed)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let key = derive_key(&self.scope_seed()?)?;
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice())))
    }

    /// Encrypt and persist `api_key`, replacing any stored key.
    pub async fn save(&self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(CredentialError::EmptyKey);
        }

        let encoded = encrypt_value(api_key, &self.cipher()?)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, encoded.as_bytes()).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::info!(path = %self.path.display(), "API key saved");
        Ok(())
    }

    /// Decrypt the stored key. A file that cannot be decrypted is removed.
    pub async fn load(&self) -> Option<Zeroizing<String>> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable credential file");
                self.discard().await;
                return None;
            }
        };

        let decrypted = self
            .cipher()
            .and_then(|cipher| decrypt_value(data.trim(), &cipher));

        match decrypted {
            Ok(key) => Some(key),
            Err(CredentialError::Scope(reason)) => {
                // Nothing is wrong with the file itself.
                tracing::warn!(reason = %reason, "Cannot derive credential key");
                None
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Stored credential is unreadable in this scope, removing"
                );
                self.discard().await;
                None
            }
        }
    }

    /// Remove the stored key. A missing file is not an error.
    pub async fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "API key deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn discard(&self) {
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove credential file");
            }
        }
    }
}

/// Derive the 256-bit encryption key for a scope seed.
fn derive_key(seed: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(KEY_DERIVATION_TAG)
        .map_err(|e| CredentialError::Encryption(e.to_string()))?;
    mac.update(seed);
    let digest = mac.finalize().into_bytes();

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&digest);
    Ok(key)
}

fn encrypt_value(plaintext: &str, cipher: &Aes256Gcm) -> Result<String> {
    use aes_gcm::aead::rand_core::RngCore;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CredentialError::Encryption(e.to_string()))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(combined)))
}

fn decrypt_value(encoded: &str, cipher: &Aes256Gcm) -> Result<Zeroizing<String>> {
    let body = encoded
        .strip_prefix(ENCRYPTED_PREFIX)
        .ok_or_else(|| CredentialError::Decryption("missing encrypted prefix".to_string()))?;

    let combined = BASE64
        .decode(body)
        .map_err(|e| CredentialError::Decryption(format!("invalid base64: {}", e)))?;

    if combined.len() <= NONCE_LEN {
        return Err(CredentialError::Decryption("ciphertext too short".to_string()));
    }

    let (nonce_bytes, encrypted) = combined.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
        .map_err(|e| CredentialError::Decryption(e.to_string()))?;

    String::from_utf8(plaintext)
        .map(Zeroizing::new)
        .map_err(|e| CredentialError::Decryption(format!("invalid UTF-8: {}", e)))
}

/// Show only the last four characters of a key.
pub fn mask(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> CredentialStore {
        CredentialStore::with_scope(
            dir.path().join("credentials").join(CREDENTIAL_FILE),
            "test-host",
            "/home/user/project",
        )
    }

    #[tokio::test]
    async fn test_round_trip_same_scope() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(store.load().await.is_none());
        store.save("sk-test-1234567890").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_str(), "sk-test-1234567890");
    }

    #[tokio::test]
    async fn test_file_is_encrypted() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("sk-plaintext-secret").await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with(ENCRYPTED_PREFIX));
        assert!(!raw.contains("sk-plaintext-secret"));
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(store.save("   ").await, Err(CredentialError::EmptyKey)));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_other_scope_cannot_read_and_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIAL_FILE);
        CredentialStore::with_scope(&path, "host-a", "/work")
            .save("sk-scoped")
            .await
            .unwrap();

        let other = CredentialStore::with_scope(&path, "host-a", "/elsewhere");
        assert!(other.load().await.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("sk-valid").await.unwrap();

        std::fs::write(store.path(), "ENC:not-base64!!").unwrap();
        assert!(store.load().await.is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_is_removed() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("sk-valid").await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let mut bytes = BASE64.decode(&raw[ENCRYPTED_PREFIX.len()..]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(store.path(), format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(bytes)))
            .unwrap();

        assert!(store.load().await.is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.delete().await.unwrap();

        store.save("sk-delete-me").await.unwrap();
        store.delete().await.unwrap();
        assert!(!store.path().exists());
        assert!(store.load().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_permissions_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("sk-perm").await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_derive_key_depends_on_seed() {
        let a = derive_key(b"host\0/a").unwrap();
        let b = derive_key(b"host\0/b").unwrap();
        assert_ne!(*a, *b);
        assert_eq!(*a, *derive_key(b"host\0/a").unwrap());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("sk-abcdefghijklmnop"), "****mnop");
        assert_eq!(mask("short"), "****");
    }
}
