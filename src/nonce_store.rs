//! Persistent replay protection for handshake nonces.
//!
//! A handshake message carries a nonce; the first peer to see a given nonce
//! wins, every later sighting within the window is a replay. The set of
//! seen nonces has to survive a restart or an attacker could just wait for
//! a crash and replay a captured handshake.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::convert::{i64_to_u64, u64_to_i64};
use crate::error::{Error, Result};
use crate::time::{default_provider, TimeProvider};

/// Width of the replay window, in seconds: a five-minute handshake validity
/// period plus a one-minute tolerance for clock drift between peers.
pub const NONCE_WINDOW_SECS: i64 = 360;

const RECORD_LEN: usize = 40; // 32-byte nonce + 8-byte expiry
const HEADER_LEN: usize = 8; // u64 BE record count

/// A mutex-guarded, file-backed set of seen handshake nonces.
pub struct NonceStore {
    path: PathBuf,
    entries: Mutex<HashMap<[u8; 32], i64>>,
    time: &'static dyn TimeProvider,
}

impl NonceStore {
    /// Opens (or creates) a nonce store backed by `path`.
    ///
    /// Loading tolerates a missing or corrupt file by starting empty rather
    /// than failing — replay protection degrading to "nothing seen yet" on
    /// a corrupt store is safer than refusing to start.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_time_provider(path, default_provider())
    }

    /// Same as [`NonceStore::open`] but with an explicit time provider, for
    /// deterministic expiry-pruning tests.
    pub fn open_with_time_provider(path: impl AsRef<Path>, time: &'static dyn TimeProvider) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            load(&path, time.now())
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
            time,
        })
    }

    /// Checks whether `nonce` has been seen before; if not, records it with
    /// an expiry of `timestamp + NONCE_WINDOW_SECS`.
    ///
    /// Returns `true` if this is the first sighting (handshake proceeds),
    /// `false` if it's a replay (handshake must be rejected).
    pub fn check_and_store(&self, nonce: [u8; 32], timestamp: i64) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&nonce) {
            return false;
        }
        entries.insert(nonce, timestamp + NONCE_WINDOW_SECS);
        true
    }

    /// Removes every entry whose expiry has passed. Intended to be called
    /// periodically by a background task.
    pub fn cleanup(&self) {
        let now = self.time.now();
        let mut entries = self.entries.lock();
        entries.retain(|_, expiry| *expiry >= now);
    }

    /// Number of live entries currently held.
    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    /// Serializes the current entry set and atomically writes it to disk.
    pub fn save(&self) -> Result<()> {
        let entries = self.entries.lock();
        let mut buf = Vec::with_capacity(HEADER_LEN + entries.len() * RECORD_LEN);
        buf.extend_from_slice(&(entries.len() as u64).to_be_bytes());
        for (nonce, expiry) in entries.iter() {
            buf.extend_from_slice(nonce);
            let wire_expiry = i64_to_u64(*expiry)?;
            buf.extend_from_slice(&wire_expiry.to_be_bytes());
        }
        atomic_write(&self.path, &buf)
    }

    /// Saves synchronously. The caller is responsible for stopping any
    /// background cleanup task before calling this.
    pub fn close(&self) -> Result<()> {
        self.save()
    }
}

fn load(path: &Path, now: i64) -> HashMap<[u8; 32], i64> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(_) => return HashMap::new(),
    };

    if bytes.len() < HEADER_LEN {
        return HashMap::new();
    }

    let count = u64::from_be_bytes(bytes[0..HEADER_LEN].try_into().unwrap());
    let mut entries = HashMap::new();
    let mut offset = HEADER_LEN;

    for _ in 0..count {
        if offset + RECORD_LEN > bytes.len() {
            break; // partial trailing record: truncate the parse
        }
        let mut nonce = [0u8; 32];
        nonce.copy_from_slice(&bytes[offset..offset + 32]);
        let wire_expiry = u64::from_be_bytes(bytes[offset + 32..offset + 40].try_into().unwrap());
        offset += RECORD_LEN;

        let expiry = match u64_to_i64(wire_expiry) {
            Ok(e) => e,
            Err(_) => continue, // invalid record: skip
        };
        if expiry <= now {
            continue; // expired: pruned on load
        }
        entries.insert(nonce, expiry);
    }

    entries
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.to_path_buf();
    let tmp_name = format!(
        "{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("nonces")
    );
    tmp.set_file_name(tmp_name);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let result = (|| -> Result<()> {
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Owns the background task that periodically calls [`NonceStore::cleanup`].
///
/// Mirrors [`crate::session_manager::RekeyScheduler`]'s stop-channel
/// pattern: the loop exits on a dedicated stop signal rather than being hard
/// killed, and [`NonceCleanupTask::stop`] performs a final
/// [`NonceStore::save`] before returning.
pub struct NonceCleanupTask {
    task: Option<tokio::task::JoinHandle<()>>,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
    store: std::sync::Arc<NonceStore>,
}

impl NonceCleanupTask {
    /// Spawns a task that calls [`NonceStore::cleanup`] every `interval`
    /// until [`NonceCleanupTask::stop`] is called.
    pub fn start(store: std::sync::Arc<NonceStore>, interval: std::time::Duration) -> Self {
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        let task_store = store.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        task_store.cleanup();
                        tracing::debug!(live_entries = task_store.size(), "nonce store cleanup tick");
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });

        Self {
            task: Some(task),
            stop_tx: Some(stop_tx),
            store,
        }
    }

    /// Signals the cleanup loop to stop, waits for it to exit, then performs
    /// a final synchronous [`NonceStore::save`].
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.store.save()
    }
}
