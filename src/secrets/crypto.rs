//! Machine-derived encryption-at-rest for the password store.

use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use scrypt::{scrypt, Params as ScryptParams};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::SecretsError;

pub(crate) const SECRET_STORE_VERSION_ENCRYPTED: u32 = 2;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const MACHINE_KEY_CONTEXT: &str = "mailctl-secrets-machine-kek-v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptedSecretFile {
    #[serde(default)]
    pub(crate) version: u32,
    #[serde(default)]
    pub(crate) encryption: EncryptionEnvelope,
    /// Per-credential ciphertexts keyed by `username@host`.
    #[serde(default)]
    pub(crate) records: BTreeMap<String, EncryptedRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptionEnvelope {
    #[serde(default)]
    pub(crate) salt: String,
    #[serde(default)]
    pub(crate) wrapped_dek_nonce: String,
    #[serde(default)]
    pub(crate) wrapped_dek_ciphertext: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptedRecord {
    #[serde(default)]
    pub(crate) nonce: String,
    #[serde(default)]
    pub(crate) ciphertext: String,
}

pub(crate) fn looks_encrypted(value: &serde_json::Value) -> bool {
    value
        .get("encryption")
        .and_then(|inner| inner.as_object())
        .is_some()
}

pub(crate) fn encrypt_records(
    records: &BTreeMap<String, String>,
) -> Result<EncryptedSecretFile, SecretsError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let kek = derive_machine_kek(&salt)?;

    let mut dek = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut dek);
    let (wrapped_dek_nonce, wrapped_dek_ciphertext) = encrypt_blob(&kek, &dek)?;

    let mut encrypted = BTreeMap::new();
    for (key, password) in records {
        let (nonce, ciphertext) = encrypt_blob(&dek, password.as_bytes())?;
        encrypted.insert(
            key.clone(),
            EncryptedRecord {
                nonce: B64.encode(nonce),
                ciphertext: B64.encode(ciphertext),
            },
        );
    }

    Ok(EncryptedSecretFile {
        version: SECRET_STORE_VERSION_ENCRYPTED,
        encryption: EncryptionEnvelope {
            salt: B64.encode(salt),
            wrapped_dek_nonce: B64.encode(wrapped_dek_nonce),
            wrapped_dek_ciphertext: B64.encode(wrapped_dek_ciphertext),
        },
        records: encrypted,
    })
}

pub(crate) fn decrypt_records(
    file: &EncryptedSecretFile,
) -> Result<BTreeMap<String, String>, SecretsError> {
    let salt = decode_fixed::<SALT_LEN>(&file.encryption.salt, "salt")?;
    let kek = derive_machine_kek(&salt)?;
    let wrapped_nonce =
        decode_fixed::<NONCE_LEN>(&file.encryption.wrapped_dek_nonce, "wrapped_dek_nonce")?;
    let wrapped_dek = decode_bytes(
        &file.encryption.wrapped_dek_ciphertext,
        "wrapped_dek_ciphertext",
    )?;
    let dek_raw = decrypt_blob(&kek, &wrapped_nonce, &wrapped_dek).map_err(|_| {
        SecretsError::Invalid(
            "failed to decrypt secret store (machine identity may have changed); \
             delete the store file and log in again"
                .to_string(),
        )
    })?;
    if dek_raw.len() != KEY_LEN {
        return Err(SecretsError::Invalid(
            "invalid encrypted key material in secret store".to_string(),
        ));
    }
    let mut dek = [0u8; KEY_LEN];
    dek.copy_from_slice(&dek_raw);

    let mut records = BTreeMap::new();
    for (key, record) in &file.records {
        let nonce = decode_fixed::<NONCE_LEN>(&record.nonce, "nonce")?;
        let ciphertext = decode_bytes(&record.ciphertext, "ciphertext")?;
        let payload = decrypt_blob(&dek, &nonce, &ciphertext).map_err(|_| {
            SecretsError::Invalid(format!("failed to decrypt secret record `{key}`"))
        })?;
        let password = String::from_utf8(payload).map_err(|_| {
            SecretsError::Invalid(format!("secret record `{key}` is not valid UTF-8"))
        })?;
        records.insert(key.clone(), password);
    }
    Ok(records)
}

fn derive_machine_kek(salt: &[u8; SALT_LEN]) -> Result<[u8; KEY_LEN], SecretsError> {
    let mut material = machine_secret_material();
    material.extend_from_slice(salt);

    let mut hashed = Sha256::new();
    hashed.update(MACHINE_KEY_CONTEXT.as_bytes());
    hashed.update(&material);
    let seed = hashed.finalize();

    let params = ScryptParams::recommended();
    let mut key = [0u8; KEY_LEN];
    scrypt(&seed, salt, &params, &mut key)
        .map_err(|err| SecretsError::Invalid(format!("failed to derive machine key: {err}")))?;
    Ok(key)
}

fn machine_secret_material() -> Vec<u8> {
    let hostname = hostname::get()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());
    let home = dirs::home_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let machine_id = read_machine_id().unwrap_or_default();
    format!(
        "os={}|host={}|user={}|home={}|machine_id={}",
        std::env::consts::OS,
        hostname,
        username,
        home,
        machine_id
    )
    .into_bytes()
}

fn read_machine_id() -> Option<String> {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id", "/etc/hostid"] {
        if let Ok(value) = std::fs::read_to_string(path) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn encrypt_blob(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), SecretsError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| SecretsError::Invalid("invalid encryption key length".to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| SecretsError::Invalid("failed to encrypt secret data".to_string()))?;
    Ok((nonce.to_vec(), ciphertext))
}

fn decrypt_blob(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, SecretsError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| SecretsError::Invalid("invalid encryption key length".to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SecretsError::Invalid("failed to decrypt secret data".to_string()))
}

fn decode_bytes(value: &str, field: &str) -> Result<Vec<u8>, SecretsError> {
    B64.decode(value).map_err(|err| {
        SecretsError::Invalid(format!("failed to decode secret store field `{field}`: {err}"))
    })
}

fn decode_fixed<const N: usize>(value: &str, field: &str) -> Result<[u8; N], SecretsError> {
    let bytes = decode_bytes(value, field)?;
    if bytes.len() != N {
        return Err(SecretsError::Invalid(format!(
            "invalid secret store field `{field}` length: expected {N}, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
