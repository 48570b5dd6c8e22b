//! Persistent password store keyed by `(host, username)`.
//!
//! Passwords accepted interactively (see the `login` subcommand) are kept in
//! an encrypted JSON file under the user config directory, so later
//! invocations can authenticate without prompting. The fleet layer consults
//! the store through the [`PasswordSource`] boundary and memoizes lookups per
//! endpoint.

mod crypto;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SecretsError;
use crate::fleet::PasswordSource;

use crypto::{decrypt_records, encrypt_records, looks_encrypted, EncryptedSecretFile};

/// Plaintext on-disk shape (legacy files, migrated to encrypted on write).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct PlainSecretFile {
    #[serde(default)]
    records: BTreeMap<String, String>,
}

/// File-backed credential store.
pub struct SecretStore {
    path: Option<PathBuf>,
}

/// Returns the default store path (`~/.config/mailctl/secrets.json`) when the
/// config root is resolvable.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mailctl").join("secrets.json"))
}

fn record_key(host: &str, username: &str) -> String {
    format!("{username}@{host}")
}

impl SecretStore {
    /// Store at the default per-user location. A missing config root behaves
    /// like an empty, read-only store.
    pub fn open_default() -> Self {
        Self {
            path: default_store_path(),
        }
    }

    /// Store at an explicit path (tests, alternate roots).
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Fetch the stored password for `(host, username)`, if any.
    pub fn get(&self, host: &str, username: &str) -> Result<Option<String>, SecretsError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let records = load_records(path)?;
        Ok(records.get(&record_key(host, username)).cloned())
    }

    /// Save a password for `(host, username)`, replacing any existing one.
    pub fn set(&self, host: &str, username: &str, password: &str) -> Result<(), SecretsError> {
        let Some(path) = &self.path else {
            return Err(SecretsError::Invalid(
                "unable to resolve config root for secret storage".to_string(),
            ));
        };
        let mut records = load_records(path)?;
        records.insert(record_key(host, username), password.to_string());
        write_records(path, &records)
    }

    /// Remove the stored password for `(host, username)`.
    ///
    /// Returns `true` when a record was removed.
    pub fn delete(&self, host: &str, username: &str) -> Result<bool, SecretsError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let mut records = load_records(path)?;
        let removed = records.remove(&record_key(host, username)).is_some();
        if removed {
            write_records(path, &records)?;
        }
        Ok(removed)
    }
}

impl PasswordSource for SecretStore {
    fn lookup(&self, host: &str, username: &str) -> Option<String> {
        match self.get(host, username) {
            Ok(value) => value,
            Err(err) => {
                // An unreadable store downgrades to "no stored password";
                // the call will get a 401 and the user can log in again.
                tracing::warn!("secret store lookup failed: {err}");
                None
            }
        }
    }
}

/// Load and decode the store from disk, including plaintext migration.
fn load_records(path: &Path) -> Result<BTreeMap<String, String>, SecretsError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let value: serde_json::Value = serde_json::from_str(&text).map_err(|err| {
                SecretsError::Invalid(format!(
                    "failed to parse secret store `{}`: {err}",
                    path.display()
                ))
            })?;

            if looks_encrypted(&value) {
                let encrypted: EncryptedSecretFile =
                    serde_json::from_value(value).map_err(|err| {
                        SecretsError::Invalid(format!(
                            "failed to parse encrypted secret store `{}`: {err}",
                            path.display()
                        ))
                    })?;
                return decrypt_records(&encrypted);
            }

            // Legacy plaintext format migration path.
            let parsed: PlainSecretFile = serde_json::from_value(value).map_err(|err| {
                SecretsError::Invalid(format!(
                    "failed to parse secret store `{}`: {err}",
                    path.display()
                ))
            })?;
            if !parsed.records.is_empty() {
                // Best-effort migration. If the re-write fails, keep loading
                // plaintext.
                let _ = write_records(path, &parsed.records);
            }
            Ok(parsed.records)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(err) => Err(SecretsError::Io(err)),
    }
}

/// Encrypt and persist the store with restrictive permissions.
fn write_records(path: &Path, records: &BTreeMap<String, String>) -> Result<(), SecretsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
        }
    }

    let encrypted = encrypt_records(records)?;
    let text = serde_json::to_string_pretty(&encrypted).map_err(|err| {
        SecretsError::Invalid(format!("failed to serialize encrypted secret store: {err}"))
    })?;
    let mut options = std::fs::OpenOptions::new();
    options.create(true).truncate(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}
