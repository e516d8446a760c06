//! Injectable clock used by every time-dependent subsystem.
//!
//! Key rotation, the nonce store, sessions, and the rekey scheduler all
//! consult a `TimeProvider` rather than calling `SystemTime::now()`
//! directly, so tests can advance time deterministically instead of
//! sleeping real wall-clock seconds.

use std::sync::atomic::{AtomicI64, Ordering};

use once_cell::sync::OnceCell;

/// A source of the current time, expressed as Unix seconds.
///
/// Implementations must be cheap to call repeatedly and safe to share
/// across threads.
pub trait TimeProvider: Send + Sync {
    /// Current time as Unix seconds.
    fn now(&self) -> i64;

    /// Seconds elapsed since `t` (a prior `now()` reading). Negative if `t`
    /// is in the future relative to the current reading.
    fn since(&self, t: i64) -> i64 {
        self.now() - t
    }
}

/// The default provider: wall-clock time via `chrono`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A manually-advanced clock for deterministic tests.
///
/// Starts at a caller-supplied timestamp and only moves when `advance` or
/// `set` is called.
#[derive(Debug)]
pub struct MockTimeProvider {
    current: AtomicI64,
}

impl MockTimeProvider {
    /// Creates a mock clock fixed at `start`.
    pub fn new(start: i64) -> Self {
        Self {
            current: AtomicI64::new(start),
        }
    }

    /// Moves the clock forward by `seconds` (may be negative).
    pub fn advance(&self, seconds: i64) {
        self.current.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute timestamp.
    pub fn set(&self, timestamp: i64) {
        self.current.store(timestamp, Ordering::SeqCst);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }
}

static DEFAULT_PROVIDER: OnceCell<Box<dyn TimeProvider>> = OnceCell::new();

/// Returns the process-wide default time provider, installing
/// [`SystemTimeProvider`] on first call if none has been set.
///
/// Tests that need a mock clock should construct their own
/// `MockTimeProvider` and pass it directly to the component under test
/// rather than relying on this global, since the global can only be set
/// once per process.
pub fn default_provider() -> &'static dyn TimeProvider {
    DEFAULT_PROVIDER
        .get_or_init(|| Box::new(SystemTimeProvider))
        .as_ref()
}

/// Installs a custom process-wide default provider.
///
/// Returns `Err(())` if a default has already been installed (including the
/// implicit installation by a prior [`default_provider`] call).
pub fn set_default_provider(provider: Box<dyn TimeProvider>) -> std::result::Result<(), ()> {
    DEFAULT_PROVIDER.set(provider).map_err(|_| ())
}
