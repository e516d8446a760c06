//! Long-term identity key rotation: a current key pair plus a bounded ring
//! of previous ones, kept around so peers who haven't seen the newest key
//! yet can still be verified against.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::RwLock;
use zeroize::Zeroize;

use crate::crypto::keys::KeyPair;
use crate::error::{Error, Result};
use crate::time::{default_provider, TimeProvider};

/// Minimum rotation period accepted by [`KeyRotationManager::set_rotation_period`].
pub const MIN_ROTATION_PERIOD_SECS: i64 = 24 * 60 * 60;

/// Default rotation period: 30 days.
pub const DEFAULT_ROTATION_PERIOD_SECS: i64 = 30 * 24 * 60 * 60;

/// Default cap on retained previous key pairs.
pub const DEFAULT_MAX_PREVIOUS_KEYS: usize = 3;

struct Inner {
    current: KeyPair,
    previous: VecDeque<KeyPair>,
    max_previous: usize,
    created_at: i64,
    rotation_period_secs: i64,
    cleaned_up: bool,
}

/// Owns an identity's current key pair and a bounded deque of previous ones.
///
/// All mutating operations take the write lock; queries take the read lock,
/// so lookups never block behind each other, only behind a rotation.
pub struct KeyRotationManager {
    inner: RwLock<Inner>,
    time: &'static dyn TimeProvider,
}

impl KeyRotationManager {
    /// Starts a fresh ring around `current`, stamping its creation time from
    /// the process-wide default [`TimeProvider`].
    pub fn new(current: KeyPair, max_previous: usize) -> Self {
        Self::with_time_provider(current, max_previous, default_provider())
    }

    /// Same as [`KeyRotationManager::new`] but with an explicit time
    /// provider — used in tests to control rotation timing deterministically.
    pub fn with_time_provider(
        current: KeyPair,
        max_previous: usize,
        time: &'static dyn TimeProvider,
    ) -> Self {
        let created_at = time.now();
        Self {
            inner: RwLock::new(Inner {
                current,
                previous: VecDeque::with_capacity(max_previous),
                max_previous,
                created_at,
                rotation_period_secs: DEFAULT_ROTATION_PERIOD_SECS,
                cleaned_up: false,
            }),
            time,
        }
    }

    /// Generates a new key pair, retires the current one to the front of the
    /// previous deque (wiping and dropping the eldest if over capacity), and
    /// returns the new public key.
    pub fn rotate(&self) -> Result<[u8; 32]> {
        let new_pair = KeyPair::generate()?;
        let public = new_pair.public;
        self.install(new_pair)?;
        tracing::info!(new_public_key = %hex::encode(public), "identity key rotated");
        Ok(public)
    }

    /// Identical to [`KeyRotationManager::rotate`] but intended for
    /// out-of-schedule, compromise-driven rotation. The ring keeps the same
    /// retention rules either way.
    pub fn emergency_rotate(&self) -> Result<[u8; 32]> {
        let new_pair = KeyPair::generate()?;
        let public = new_pair.public;
        self.install(new_pair)?;
        tracing::warn!(new_public_key = %hex::encode(public), "identity key emergency-rotated");
        Ok(public)
    }

    fn install(&self, new_pair: KeyPair) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.cleaned_up {
            return Err(Error::Stopped);
        }
        let old_current = std::mem::replace(&mut inner.current, new_pair);
        inner.previous.push_front(old_current);
        while inner.previous.len() > inner.max_previous {
            inner.previous.pop_back();
        }
        inner.created_at = self.time.now();
        Ok(())
    }

    /// Whether the current key has been held at least `rotation_period`
    /// since it was installed.
    pub fn should_rotate(&self) -> bool {
        let inner = self.inner.read();
        if inner.cleaned_up {
            return false;
        }
        let due = self.time.since(inner.created_at) >= inner.rotation_period_secs;
        if due {
            tracing::warn!(
                current_public_key = %hex::encode(inner.current.public),
                "identity key rotation is due but has not been invoked"
            );
        }
        due
    }

    /// Sets the rotation period. Rejects anything shorter than 24 hours.
    pub fn set_rotation_period(&self, period: Duration) -> Result<()> {
        let secs = period.as_secs() as i64;
        if secs < MIN_ROTATION_PERIOD_SECS {
            return Err(Error::PeriodTooShort);
        }
        let mut inner = self.inner.write();
        if inner.cleaned_up {
            return Err(Error::Stopped);
        }
        inner.rotation_period_secs = secs;
        Ok(())
    }

    /// The current public key.
    pub fn current_public_key(&self) -> [u8; 32] {
        self.inner.read().current.public
    }

    /// Linear scan across `{current, previous...}` for a matching public key.
    /// Runs the callback with a reference to avoid copying private key
    /// material out of the lock.
    pub fn find_by_public_key<R>(&self, public_key: &[u8; 32], f: impl FnOnce(&KeyPair) -> R) -> Option<R> {
        let inner = self.inner.read();
        if &inner.current.public == public_key {
            return Some(f(&inner.current));
        }
        inner
            .previous
            .iter()
            .find(|pair| &pair.public == public_key)
            .map(f)
    }

    /// Number of previous keys currently retained.
    pub fn previous_len(&self) -> usize {
        self.inner.read().previous.len()
    }

    /// Wipes and clears every held key, including the current one. The
    /// manager is unusable afterwards: [`KeyRotationManager::rotate`],
    /// [`KeyRotationManager::emergency_rotate`], and
    /// [`KeyRotationManager::set_rotation_period`] all return
    /// [`Error::Stopped`], and [`KeyRotationManager::should_rotate`] reports
    /// `false` unconditionally.
    pub fn cleanup(&self) {
        let mut inner = self.inner.write();
        inner.previous.clear();
        inner.current.private.zeroize();
        inner.current.public = [0u8; 32];
        inner.cleaned_up = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MockTimeProvider;

    fn manager_with_mock(max_previous: usize) -> (KeyRotationManager, &'static MockTimeProvider) {
        let clock: &'static MockTimeProvider = Box::leak(Box::new(MockTimeProvider::new(1_000)));
        let manager =
            KeyRotationManager::with_time_provider(KeyPair::generate().unwrap(), max_previous, clock);
        (manager, clock)
    }

    #[test]
    fn rotate_installs_new_current_and_retires_old() {
        let (manager, _clock) = manager_with_mock(3);
        let old_public = manager.current_public_key();

        let new_public = manager.rotate().unwrap();

        assert_ne!(old_public, new_public);
        assert_eq!(manager.current_public_key(), new_public);
        assert_eq!(manager.previous_len(), 1);
        assert!(manager.find_by_public_key(&old_public, |_| ()).is_some());
    }

    #[test]
    fn previous_deque_respects_cap() {
        let (manager, _clock) = manager_with_mock(2);
        let initial_public = manager.current_public_key();

        manager.rotate().unwrap();
        manager.rotate().unwrap();
        manager.rotate().unwrap();
        manager.rotate().unwrap();

        assert_eq!(manager.previous_len(), 2);
        assert!(manager.find_by_public_key(&initial_public, |_| ()).is_none());
    }

    #[test]
    fn should_rotate_follows_elapsed_time() {
        let (manager, clock) = manager_with_mock(3);
        assert!(!manager.should_rotate());

        clock.advance(DEFAULT_ROTATION_PERIOD_SECS);
        assert!(manager.should_rotate());
    }

    #[test]
    fn set_rotation_period_rejects_short_periods() {
        let (manager, _clock) = manager_with_mock(3);
        let result = manager.set_rotation_period(Duration::from_secs(3600));
        assert!(matches!(result, Err(Error::PeriodTooShort)));
    }

    #[test]
    fn cleanup_clears_previous_keys() {
        let (manager, _clock) = manager_with_mock(3);
        manager.rotate().unwrap();
        assert_eq!(manager.previous_len(), 1);

        manager.cleanup();
        assert_eq!(manager.previous_len(), 0);
    }

    #[test]
    fn cleanup_wipes_current_and_rejects_further_use() {
        let (manager, _clock) = manager_with_mock(3);
        let current_public = manager.current_public_key();

        manager.cleanup();

        assert_eq!(manager.current_public_key(), [0u8; 32]);
        assert!(manager.find_by_public_key(&current_public, |_| ()).is_none());
        assert!(matches!(manager.rotate(), Err(Error::Stopped)));
        assert!(matches!(manager.emergency_rotate(), Err(Error::Stopped)));
        assert!(!manager.should_rotate());
        assert!(matches!(
            manager.set_rotation_period(Duration::from_secs(MIN_ROTATION_PERIOD_SECS as u64)),
            Err(Error::Stopped)
        ));
    }
}
