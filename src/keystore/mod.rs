//! Encrypted, file-backed key store.
//!
//! Every file under the store's data directory holds
//! `version(u16 BE) ‖ nonce(12B) ‖ ciphertext+tag`, AES-256-GCM under a
//! PBKDF2-HMAC-SHA256-derived master key. Writes go to `F.tmp` and are
//! renamed into place so a crash mid-write never leaves a half-written `F`.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit, OsRng as AesOsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand_core::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Container format version written by this store.
pub const CONTAINER_VERSION: u16 = 1;

/// PBKDF2-HMAC-SHA256 iteration count for the master key.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 2 + NONCE_LEN; // version + nonce
const MIN_CONTAINER_LEN: usize = HEADER_LEN + TAG_LEN;

const SALT_FILENAME: &str = ".salt";

/// An encrypted key store rooted at a data directory.
///
/// Holds the derived master key in memory for the lifetime of the store;
/// [`EncryptedKeyStore::close`] wipes it early if the caller wants to drop
/// key material before the store itself goes out of scope.
pub struct EncryptedKeyStore {
    data_dir: PathBuf,
    master_key: [u8; 32],
    closed: bool,
}

impl EncryptedKeyStore {
    /// Opens (or initializes) a key store at `data_dir` under `password`.
    ///
    /// Creates the directory (0700) if absent. On first use generates a
    /// fresh 32-byte salt and writes it to `.salt` (0600); subsequent opens
    /// load and reuse it. The password buffer is wiped after key
    /// derivation regardless of the caller's handling of its own copy.
    pub fn open(data_dir: impl AsRef<Path>, mut password: Vec<u8>) -> Result<Self> {
        if password.is_empty() {
            return Err(Error::EmptyPassword);
        }
        let data_dir = data_dir.as_ref().to_path_buf();

        fs::create_dir_all(&data_dir)?;
        set_dir_private_perms(&data_dir)?;

        let salt_path = data_dir.join(SALT_FILENAME);
        let salt = if salt_path.exists() {
            let bytes = fs::read(&salt_path)?;
            if bytes.len() != SALT_LEN {
                return Err(Error::CorruptStore("salt file has wrong length".into()));
            }
            let mut salt = [0u8; SALT_LEN];
            salt.copy_from_slice(&bytes);
            salt
        } else {
            let mut salt = [0u8; SALT_LEN];
            AesOsRng.fill_bytes(&mut salt);
            atomic_write(&salt_path, &salt)?;
            salt
        };

        let mut master_key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(&password, &salt, PBKDF2_ITERATIONS, &mut master_key);
        password.zeroize();

        Ok(Self {
            data_dir,
            master_key,
            closed: false,
        })
    }

    /// Encrypts `plaintext` under the master key and atomically writes the
    /// container to `data_dir/{name}`.
    pub fn write(&self, name: &str, plaintext: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Stopped);
        }
        let path = self.path_for(name)?;

        let cipher = Aes256Gcm::new((&self.master_key).into());
        let mut nonce_bytes = [0u8; NONCE_LEN];
        AesOsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| Error::AuthFailed)?;

        let mut container = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        container.extend_from_slice(&CONTAINER_VERSION.to_be_bytes());
        container.extend_from_slice(&nonce_bytes);
        container.extend_from_slice(&ciphertext);

        atomic_write(&path, &container)
    }

    /// Reads and decrypts `data_dir/{name}`.
    ///
    /// Returns [`Error::WrongPasswordOrCorrupt`] if the container is too
    /// short, the version doesn't match, or authentication fails — these
    /// are indistinguishable from the caller's point of view by design.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::Stopped);
        }
        let path = self.path_for(name)?;
        let container = fs::read(&path)?;

        if container.len() < MIN_CONTAINER_LEN {
            return Err(Error::WrongPasswordOrCorrupt);
        }

        let version = u16::from_be_bytes([container[0], container[1]]);
        if version != CONTAINER_VERSION {
            return Err(Error::VersionMismatch {
                found: version,
                expected: CONTAINER_VERSION,
            });
        }

        let nonce = Nonce::from_slice(&container[2..HEADER_LEN]);
        let ciphertext = &container[HEADER_LEN..];

        let cipher = Aes256Gcm::new((&self.master_key).into());
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| Error::WrongPasswordOrCorrupt)
    }

    /// Overwrites `data_dir/{name}` with zeros, then unlinks it. A missing
    /// file is a no-op.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(());
        }
        if let Ok(metadata) = fs::metadata(&path) {
            let zeros = vec![0u8; metadata.len() as usize];
            let _ = fs::write(&path, zeros);
        }
        fs::remove_file(&path)?;
        Ok(())
    }

    /// Re-encrypts every stored container under a new password.
    ///
    /// Decrypts every non-`.salt`, non-`.tmp` file under the current key,
    /// derives a new salt and master key from `new_password`, re-writes
    /// every file, and persists the new salt. On any failure partway
    /// through, the old salt and key are restored and
    /// [`Error::RotationFailed`] is returned — no file is left encrypted
    /// under a mix of old and new keys.
    pub fn rotate_password(&mut self, mut new_password: Vec<u8>) -> Result<()> {
        if new_password.is_empty() {
            new_password.zeroize();
            return Err(Error::EmptyPassword);
        }

        let names = self.list_entry_names()?;
        let mut decrypted = Vec::with_capacity(names.len());
        for name in &names {
            match self.read(name) {
                Ok(plaintext) => decrypted.push(plaintext),
                Err(_) => return Err(Error::RotationFailed(format!("failed to decrypt {name}"))),
            }
        }

        let old_key = self.master_key;
        let mut new_salt = [0u8; SALT_LEN];
        AesOsRng.fill_bytes(&mut new_salt);
        let mut new_key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(&new_password, &new_salt, PBKDF2_ITERATIONS, &mut new_key);
        new_password.zeroize();

        self.master_key = new_key;

        let mut rewritten = 0;
        for (name, plaintext) in names.iter().zip(decrypted.iter()) {
            if self.write(name, plaintext).is_err() {
                self.roll_back_to_key(&names[..rewritten], &decrypted[..rewritten], old_key);
                return Err(Error::RotationFailed(format!("failed to re-encrypt {name}")));
            }
            rewritten += 1;
        }

        let salt_path = self.data_dir.join(SALT_FILENAME);
        if atomic_write(&salt_path, &new_salt).is_err() {
            self.roll_back_to_key(&names, &decrypted, old_key);
            return Err(Error::RotationFailed("failed to persist new salt".into()));
        }

        tracing::info!("key store password rotated");
        old_key.to_vec().zeroize();
        Ok(())
    }

    /// Restores `master_key` to `key` and re-encrypts every file in `names`
    /// under it, undoing a partial rotation so no file is left encrypted
    /// under a mix of old and new keys.
    fn roll_back_to_key(&mut self, names: &[String], decrypted: &[Vec<u8>], key: [u8; 32]) {
        self.master_key = key;
        for (name, plaintext) in names.iter().zip(decrypted.iter()) {
            if self.write(name, plaintext).is_err() {
                tracing::warn!(name = %name, "rollback re-encryption failed; store may be left under a mix of keys");
            }
        }
    }

    /// Wipes the in-memory master key and marks the store closed. Any
    /// subsequent [`EncryptedKeyStore::read`] or [`EncryptedKeyStore::write`]
    /// returns [`Error::Stopped`] instead of operating on zeroized key
    /// material.
    pub fn close(&mut self) {
        self.master_key.zeroize();
        self.closed = true;
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name == SALT_FILENAME || name.ends_with(".tmp") {
            return Err(Error::CorruptStore(format!("invalid entry name: {name}")));
        }
        Ok(self.data_dir.join(name))
    }

    fn list_entry_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name == SALT_FILENAME || name.ends_with(".tmp") {
                continue;
            }
            names.push(name.to_string());
        }
        Ok(names)
    }
}

impl Drop for EncryptedKeyStore {
    fn drop(&mut self) {
        self.master_key.zeroize();
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.to_path_buf();
    let tmp_name = format!(
        "{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("entry")
    );
    tmp.set_file_name(tmp_name);

    let write_result = (|| -> Result<()> {
        fs::write(&tmp, bytes)?;
        set_file_private_perms(&tmp)?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    write_result
}

#[cfg(unix)]
fn set_file_private_perms(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_private_perms(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_dir_private_perms(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_private_perms(_path: &Path) -> Result<()> {
    Ok(())
}
