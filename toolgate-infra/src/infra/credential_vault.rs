use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toolgate_core::{CredentialLookup, StoreError};
use tracing::debug;
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum CredentialVaultError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encryption error")]
    Encryption,

    #[error("Invalid master key: {0}")]
    InvalidMasterKey(String),

    #[error("No credential for {connector_key} (user {user_id})")]
    NotFound {
        user_id: String,
        connector_key: String,
    },
}

/// Decode a base64 master key into the 32 bytes AES-256 needs.
pub fn parse_master_key(encoded: &str) -> Result<[u8; 32], CredentialVaultError> {
    let mut bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CredentialVaultError::InvalidMasterKey(e.to_string()))?;

    if bytes.len() != 32 {
        let len = bytes.len();
        bytes.zeroize();
        return Err(CredentialVaultError::InvalidMasterKey(format!(
            "expected 32 bytes, got {}",
            len
        )));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(key)
}

#[derive(Clone)]
struct EncryptedBlob {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

/// Provider credentials encrypted at rest, one file per `(user, connector)`.
///
/// File names are the SHA-256 of the pair, so the directory listing reveals
/// neither users nor connectors.
pub struct CredentialVault {
    vault_path: PathBuf,
    cipher: Aes256Gcm,
    cache: Mutex<HashMap<String, EncryptedBlob>>,
}

impl CredentialVault {
    pub fn new<P: AsRef<Path>>(
        vault_path: P,
        master_key: &[u8; 32],
    ) -> Result<Self, CredentialVaultError> {
        let vault_path = vault_path.as_ref().to_path_buf();
        fs::create_dir_all(&vault_path)?;

        Ok(Self {
            vault_path,
            cipher: Aes256Gcm::new(master_key.into()),
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn store_credential(
        &self,
        user_id: &str,
        connector_key: &str,
        secret: &str,
    ) -> Result<(), CredentialVaultError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), secret.as_bytes())
            .map_err(|_| CredentialVaultError::Encryption)?;

        let key = entry_key(user_id, connector_key);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.entry_path(&key))?;
        file.write_all(&nonce)?;
        file.write_all(&ciphertext)?;
        file.sync_all()?;

        self.cache.lock().insert(key, EncryptedBlob { nonce, ciphertext });
        debug!(user_id, connector_key, "Stored credential");
        Ok(())
    }

    pub fn get_credential(
        &self,
        user_id: &str,
        connector_key: &str,
    ) -> Result<String, CredentialVaultError> {
        let key = entry_key(user_id, connector_key);
        let cached = self.cache.lock().get(&key).cloned();
        let blob = match cached {
            Some(blob) => blob,
            None => self
                .load_from_disk(&key)?
                .ok_or_else(|| CredentialVaultError::NotFound {
                    user_id: user_id.to_string(),
                    connector_key: connector_key.to_string(),
                })?,
        };

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&blob.nonce), blob.ciphertext.as_ref())
            .map_err(|_| CredentialVaultError::Encryption)?;

        String::from_utf8(plaintext).map_err(|e| {
            e.into_bytes().zeroize();
            CredentialVaultError::Encryption
        })
    }

    pub fn delete_credential(
        &self,
        user_id: &str,
        connector_key: &str,
    ) -> Result<(), CredentialVaultError> {
        let key = entry_key(user_id, connector_key);
        let path = self.entry_path(&key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        self.cache.lock().remove(&key);
        debug!(user_id, connector_key, "Deleted credential");
        Ok(())
    }

    /// Presence only; nothing is decrypted.
    pub fn contains(&self, user_id: &str, connector_key: &str) -> bool {
        let key = entry_key(user_id, connector_key);
        self.cache.lock().contains_key(&key) || self.entry_path(&key).exists()
    }

    fn load_from_disk(&self, key: &str) -> Result<Option<EncryptedBlob>, CredentialVaultError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        if data.len() < NONCE_LEN {
            return Err(CredentialVaultError::Encryption);
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[..NONCE_LEN]);
        let blob = EncryptedBlob {
            nonce,
            ciphertext: data[NONCE_LEN..].to_vec(),
        };

        self.cache.lock().insert(key.to_string(), blob.clone());
        Ok(Some(blob))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.vault_path.join(format!("{:x}.enc", digest))
    }
}

/// Length-prefixed so no two `(user, connector)` pairs share a key.
fn entry_key(user_id: &str, connector_key: &str) -> String {
    format!("{}:{}/{}", user_id.len(), user_id, connector_key)
}

impl Drop for CredentialVault {
    fn drop(&mut self) {
        for blob in self.cache.lock().values_mut() {
            blob.ciphertext.zeroize();
        }
    }
}

#[async_trait]
impl CredentialLookup for CredentialVault {
    async fn has_credential(&self, user_id: &str, connector_key: &str) -> Result<bool, StoreError> {
        Ok(self.contains(user_id, connector_key))
    }
}
