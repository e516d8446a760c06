//! Multi-session registry, periodic rekey scheduling, and ephemeral-key
//! lifecycle — the glue a transport collaborator drives to keep a fleet of
//! [`NoiseSession`]s alive and rekeyed without reaching into their internals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};

use crate::crypto::keys::KeyPair;
use crate::error::Result;
use crate::noise::NoiseSession;
use crate::time::{default_provider, TimeProvider};

/// Sessions idle longer than this are swept by [`SessionManager::cleanup_expired`].
pub const DEFAULT_MAX_SESSION_AGE_SECS: i64 = 48 * 60 * 60;

/// Default rekey-ticker period.
pub const DEFAULT_REKEY_TICK_SECS: u64 = 60 * 60;

/// Capacity of the rekey work queue between the ticker and the worker task.
pub const REKEY_QUEUE_CAPACITY: usize = 100;

/// A registry of established sessions, keyed by the hex-encoded peer static key.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, NoiseSession>>,
    time: &'static dyn TimeProvider,
}

impl SessionManager {
    /// Creates an empty registry using the default (system) clock.
    pub fn new() -> Self {
        Self::with_time_provider(default_provider())
    }

    /// Same as [`SessionManager::new`] with an explicit time provider.
    pub fn with_time_provider(time: &'static dyn TimeProvider) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            time,
        }
    }

    /// Registers a newly-established session under its peer's hex-encoded static key.
    pub fn add(&self, session: NoiseSession) {
        let peer_id = hex::encode(session.peer_static());
        self.sessions.write().insert(peer_id, session);
    }

    /// Runs `f` with a mutable reference to the session for `peer_id`, if one exists.
    pub fn with_session<R>(&self, peer_id: &str, f: impl FnOnce(&mut NoiseSession) -> R) -> Option<R> {
        let mut sessions = self.sessions.write();
        sessions.get_mut(peer_id).map(f)
    }

    /// Removes and returns the session for `peer_id`, if one exists.
    pub fn remove(&self, peer_id: &str) -> Option<NoiseSession> {
        self.sessions.write().remove(peer_id)
    }

    /// Number of sessions currently registered.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions are currently registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Removes every session idle for at least `max_idle_secs`, returning how many were removed.
    pub fn cleanup_expired(&self, max_idle_secs: i64) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(max_idle_secs));
        before - sessions.len()
    }

    /// Peer IDs of every session whose [`NoiseSession::needs_rekey`] is true.
    pub fn peers_needing_rekey(&self) -> Vec<String> {
        self.sessions
            .read()
            .iter()
            .filter(|(_, session)| session.needs_rekey())
            .map(|(peer_id, _)| peer_id.clone())
            .collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A collaborator that drives a rekey handshake to completion over the
/// transport — out of scope for this crate, which only decides *when* a
/// rekey is due.
pub trait RekeyHandler: Send + Sync {
    /// Performs (or initiates) a rekey for the given peer. Errors are logged
    /// and do not stop the scheduler; the next tick will re-enqueue the peer
    /// if it's still due.
    fn perform_rekey(&self, peer_id: &str) -> Result<()>;
}

/// Owns the ticker and worker tasks that watch a [`SessionManager`] for
/// sessions due for rekey and hand them to a [`RekeyHandler`].
pub struct RekeyScheduler {
    ticker_task: Option<tokio::task::JoinHandle<()>>,
    worker_task: Option<tokio::task::JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl RekeyScheduler {
    /// Starts the ticker and worker tasks. `interval` is typically
    /// [`DEFAULT_REKEY_TICK_SECS`].
    pub fn start(sessions: Arc<SessionManager>, handler: Arc<dyn RekeyHandler>, interval: Duration) -> Self {
        let (queue_tx, mut queue_rx) = mpsc::channel::<String>(REKEY_QUEUE_CAPACITY);
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let ticker_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let due = sessions.peers_needing_rekey();
                        for peer_id in due {
                            match queue_tx.try_send(peer_id.clone()) {
                                Ok(()) => tracing::debug!(peer_id = %peer_id, "enqueued for rekey"),
                                Err(_) => tracing::debug!(peer_id = %peer_id, "rekey queue full, retrying next tick"),
                            }
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });

        let worker_task = tokio::spawn(async move {
            while let Some(peer_id) = queue_rx.recv().await {
                match handler.perform_rekey(&peer_id) {
                    Ok(()) => tracing::info!(peer_id = %peer_id, "rekey completed"),
                    Err(err) => tracing::warn!(peer_id = %peer_id, error = %err, "rekey failed"),
                }
            }
        });

        Self {
            ticker_task: Some(ticker_task),
            worker_task: Some(worker_task),
            stop_tx: Some(stop_tx),
        }
    }

    /// Signals both tasks to stop, and waits for them to exit.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.ticker_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.worker_task.take() {
            let _ = task.await;
        }
    }
}

struct EphemeralEntry {
    key_pair: KeyPair,
    last_used: i64,
}

/// A per-peer cache of ephemeral key pairs with a soft size cap and
/// time-based LRU eviction, per the §9 Open Question decision.
pub struct EphemeralKeyManager {
    entries: RwLock<HashMap<String, EphemeralEntry>>,
    soft_cap: usize,
    time: &'static dyn TimeProvider,
}

impl EphemeralKeyManager {
    /// Creates a cache with the given soft size cap, using the default clock.
    pub fn new(soft_cap: usize) -> Self {
        Self::with_time_provider(soft_cap, default_provider())
    }

    /// Same as [`EphemeralKeyManager::new`] with an explicit time provider.
    pub fn with_time_provider(soft_cap: usize, time: &'static dyn TimeProvider) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            soft_cap,
            time,
        }
    }

    /// Returns the cached ephemeral public key for `peer_id`, generating one
    /// (and evicting the least-recently-used entry if the cache is at its
    /// soft cap) if none exists yet.
    pub fn get_or_create(&self, peer_id: &str) -> Result<[u8; 32]> {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(peer_id) {
            entry.last_used = self.time.now();
            return Ok(entry.key_pair.public);
        }

        Self::evict_lru_if_needed(&mut entries, self.soft_cap);
        let key_pair = KeyPair::generate()?;
        let public = key_pair.public;
        entries.insert(
            peer_id.to_string(),
            EphemeralEntry {
                key_pair,
                last_used: self.time.now(),
            },
        );
        Ok(public)
    }

    /// Forces a fresh ephemeral key pair for `peer_id`, discarding any
    /// existing entry regardless of age.
    pub fn force_rotate(&self, peer_id: &str) -> Result<[u8; 32]> {
        let mut entries = self.entries.write();
        // Inserting under an existing key replaces (and drops/zeroizes) the
        // old entry, so no separate eviction is needed for the peer itself.
        let key_pair = KeyPair::generate()?;
        let public = key_pair.public;
        entries.insert(
            peer_id.to_string(),
            EphemeralEntry {
                key_pair,
                last_used: self.time.now(),
            },
        );
        Ok(public)
    }

    /// Number of ephemeral entries currently cached.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn evict_lru_if_needed(entries: &mut HashMap<String, EphemeralEntry>, soft_cap: usize) {
        if entries.len() < soft_cap {
            return;
        }
        if let Some(lru_key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(peer_id, _)| peer_id.clone())
        {
            entries.remove(&lru_key);
        }
    }
}
