//! Gathers every configuration knob §6 names into one constructable value.
//!
//! Resolution order is env vars over a TOML config file over built-in
//! defaults, matching this lineage's daemon config loader.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::identity::rotation::MIN_ROTATION_PERIOD_SECS;
use crate::noise::session::{DEFAULT_REKEY_INTERVAL_SECS, DEFAULT_REKEY_MESSAGE_THRESHOLD};
use crate::nonce_store::NONCE_WINDOW_SECS;
use crate::session_manager::{DEFAULT_MAX_SESSION_AGE_SECS, DEFAULT_REKEY_TICK_SECS};

const ENV_CONFIG_PATH: &str = "NOISEVAULT_CONFIG";
const ENV_DATA_DIR: &str = "NOISEVAULT_DATA_DIR";
const ENV_ROTATION_PERIOD_SECS: &str = "NOISEVAULT_ROTATION_PERIOD_SECS";
const ENV_MAX_PREVIOUS_KEYS: &str = "NOISEVAULT_MAX_PREVIOUS_KEYS";
const ENV_REKEY_INTERVAL_SECS: &str = "NOISEVAULT_REKEY_INTERVAL_SECS";
const ENV_REKEY_MESSAGE_THRESHOLD: &str = "NOISEVAULT_REKEY_MESSAGE_THRESHOLD";
const ENV_MAX_SESSION_AGE_SECS: &str = "NOISEVAULT_MAX_SESSION_AGE_SECS";
const ENV_NONCE_CLEANUP_INTERVAL_SECS: &str = "NOISEVAULT_NONCE_CLEANUP_INTERVAL_SECS";
const ENV_PREFERRED_CIPHERS: &str = "NOISEVAULT_PREFERRED_CIPHERS";

const DEFAULT_ROTATION_PERIOD_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_MAX_PREVIOUS_KEYS: usize = 3;
const DEFAULT_NONCE_CLEANUP_INTERVAL_SECS: u64 = 10 * 60;

/// Every knob a caller needs to construct the stateful components of
/// §4.6–4.11 from one place instead of threading bare parameters.
///
/// Has no bearing on wire formats or invariants — it is pure assembly
/// convenience. Never stores the master password; that is supplied directly
/// to [`crate::keystore::EncryptedKeyStore::open`] and is never written here
/// or logged.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Directory the key store and nonce store persist to.
    pub data_dir: PathBuf,
    /// How often identity keys are rotated on schedule. Rejected below 24h.
    pub rotation_period: Duration,
    /// Maximum number of previous identity keys retained for lookup.
    pub max_previous_keys: usize,
    /// How often an established session is proactively rekeyed.
    pub rekey_interval: Duration,
    /// Message-count threshold that forces a rekey regardless of elapsed time.
    pub rekey_message_threshold: u64,
    /// How long a session may sit idle before [`crate::session_manager::SessionManager::cleanup_expired`] reaps it.
    pub max_session_age: Duration,
    /// Replay window width. Fixed at 360s; exposed for observability only —
    /// not overridable, since it is a protocol constant, not a deployment knob.
    pub nonce_window_secs: u64,
    /// How often the nonce store's background cleanup task ticks.
    pub nonce_cleanup_interval: Duration,
    /// How often the rekey scheduler's ticker fires.
    pub rekey_tick_interval: Duration,
    /// Cipher-suite wire names in preference order.
    pub preferred_ciphers: Vec<String>,
}

impl CoreConfig {
    /// Built-in defaults, ignoring environment overrides.
    pub fn defaults(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            rotation_period: Duration::from_secs(DEFAULT_ROTATION_PERIOD_SECS),
            max_previous_keys: DEFAULT_MAX_PREVIOUS_KEYS,
            rekey_interval: Duration::from_secs(DEFAULT_REKEY_INTERVAL_SECS as u64),
            rekey_message_threshold: DEFAULT_REKEY_MESSAGE_THRESHOLD,
            max_session_age: Duration::from_secs(DEFAULT_MAX_SESSION_AGE_SECS as u64),
            nonce_window_secs: NONCE_WINDOW_SECS as u64,
            nonce_cleanup_interval: Duration::from_secs(DEFAULT_NONCE_CLEANUP_INTERVAL_SECS),
            rekey_tick_interval: Duration::from_secs(DEFAULT_REKEY_TICK_SECS),
            preferred_ciphers: vec![
                "Noise_IK_25519_ChaChaPoly_SHA256".to_string(),
                "Noise_IK_25519_AESGCM_SHA256".to_string(),
            ],
        }
    }

    /// Resolves a config by layering, in increasing priority:
    /// [`CoreConfig::defaults`], an optional TOML config file, then
    /// environment-variable overrides.
    ///
    /// The config file is read from `$NOISEVAULT_CONFIG` if set, else
    /// `$XDG_CONFIG_HOME/noisevault/config.toml`, else
    /// `~/.config/noisevault/config.toml`; if none of those exist, this tier
    /// is silently skipped. `NOISEVAULT_DATA_DIR` overrides `data_dir` if
    /// set; all other env vars are optional and fall back to the file (or
    /// default) value.
    pub fn from_env(fallback_data_dir: PathBuf) -> Result<Self> {
        let mut config = Self::defaults(fallback_data_dir);

        if let Some(path) = config_file_path() {
            if let Some(file) = read_file_config(&path)? {
                file.apply_to(&mut config);
            }
        }

        if let Some(dir) = env::var(ENV_DATA_DIR).ok().map(PathBuf::from) {
            config.data_dir = dir;
        }
        if let Some(secs) = env_u64(ENV_ROTATION_PERIOD_SECS)? {
            config.rotation_period = Duration::from_secs(secs);
        }
        if let Some(n) = env_usize(ENV_MAX_PREVIOUS_KEYS)? {
            config.max_previous_keys = n;
        }
        if let Some(secs) = env_u64(ENV_REKEY_INTERVAL_SECS)? {
            config.rekey_interval = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64(ENV_REKEY_MESSAGE_THRESHOLD)? {
            config.rekey_message_threshold = n;
        }
        if let Some(secs) = env_u64(ENV_MAX_SESSION_AGE_SECS)? {
            config.max_session_age = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64(ENV_NONCE_CLEANUP_INTERVAL_SECS)? {
            config.nonce_cleanup_interval = Duration::from_secs(secs);
        }
        if let Ok(raw) = env::var(ENV_PREFERRED_CIPHERS) {
            config.preferred_ciphers = raw.split(',').map(|s| s.trim().to_string()).collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects a rotation period below the 24h minimum.
    pub fn validate(&self) -> Result<()> {
        if self.rotation_period.as_secs() < MIN_ROTATION_PERIOD_SECS as u64 {
            return Err(Error::PeriodTooShort);
        }
        Ok(())
    }
}

/// Mirrors [`CoreConfig`]'s overridable fields as they appear in
/// `config.toml`. Every field is optional — an absent field in the file
/// simply leaves the built-in default (or a later env-var override) in
/// place.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    rotation_period_secs: Option<u64>,
    max_previous_keys: Option<usize>,
    rekey_interval_secs: Option<u64>,
    rekey_message_threshold: Option<u64>,
    max_session_age_secs: Option<u64>,
    nonce_cleanup_interval_secs: Option<u64>,
    preferred_ciphers: Option<Vec<String>>,
}

impl FileConfig {
    fn apply_to(self, config: &mut CoreConfig) {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(secs) = self.rotation_period_secs {
            config.rotation_period = Duration::from_secs(secs);
        }
        if let Some(n) = self.max_previous_keys {
            config.max_previous_keys = n;
        }
        if let Some(secs) = self.rekey_interval_secs {
            config.rekey_interval = Duration::from_secs(secs);
        }
        if let Some(n) = self.rekey_message_threshold {
            config.rekey_message_threshold = n;
        }
        if let Some(secs) = self.max_session_age_secs {
            config.max_session_age = Duration::from_secs(secs);
        }
        if let Some(secs) = self.nonce_cleanup_interval_secs {
            config.nonce_cleanup_interval = Duration::from_secs(secs);
        }
        if let Some(ciphers) = self.preferred_ciphers {
            config.preferred_ciphers = ciphers;
        }
    }
}

/// Resolves the config file path per §10.3's lookup order, without checking
/// existence — callers decide what "not found" means.
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(ENV_CONFIG_PATH) {
        return Some(PathBuf::from(path));
    }
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("noisevault").join("config.toml"));
    }
    let home = env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config").join("noisevault").join("config.toml"))
}

/// Reads and parses the config file at `path`, returning `Ok(None)` if it
/// simply doesn't exist (not an error — the file tier is optional).
fn read_file_config(path: &std::path::Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::ConfigFile(path.display().to_string(), e.to_string()))?;
    let parsed = toml::from_str(&text)
        .map_err(|e| Error::ConfigFile(path.display().to_string(), e.to_string()))?;
    Ok(Some(parsed))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::InvalidHex(format!("{name} is not a valid non-negative integer"))),
        Err(_) => Ok(None),
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| Error::InvalidHex(format!("{name} is not a valid non-negative integer"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests that touch process env vars serialize through this lock so they
    // don't stomp on each other when the test binary runs them in parallel.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_spec_constants() {
        let config = CoreConfig::defaults(PathBuf::from("/tmp/noisevault-test"));
        assert_eq!(config.max_previous_keys, 3);
        assert_eq!(config.nonce_window_secs, 360);
        assert_eq!(config.rekey_message_threshold, 1_000_000);
        assert_eq!(config.preferred_ciphers[0], "Noise_IK_25519_ChaChaPoly_SHA256");
    }

    #[test]
    fn validate_rejects_short_rotation_period() {
        let mut config = CoreConfig::defaults(PathBuf::from("/tmp/noisevault-test"));
        config.rotation_period = Duration::from_secs(60);
        assert!(matches!(config.validate(), Err(Error::PeriodTooShort)));
    }

    // Points NOISEVAULT_CONFIG at a path guaranteed not to exist, so tests
    // that don't care about the file tier don't pick up a real config file
    // sitting at the test machine's $HOME/.config/noisevault/config.toml.
    fn no_config_file_guard() -> PathBuf {
        let path = std::env::temp_dir().join(format!("noisevault-no-such-config-{}.toml", std::process::id()));
        env::set_var(ENV_CONFIG_PATH, &path);
        path
    }

    #[test]
    fn env_override_takes_precedence_over_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        no_config_file_guard();
        env::set_var(ENV_MAX_PREVIOUS_KEYS, "7");
        let config = CoreConfig::from_env(PathBuf::from("/tmp/noisevault-test")).unwrap();
        env::remove_var(ENV_MAX_PREVIOUS_KEYS);
        env::remove_var(ENV_CONFIG_PATH);
        assert_eq!(config.max_previous_keys, 7);
    }

    #[test]
    fn data_dir_env_override_wins_over_fallback() {
        let _guard = ENV_LOCK.lock().unwrap();
        no_config_file_guard();
        env::set_var(ENV_DATA_DIR, "/tmp/noisevault-override");
        let config = CoreConfig::from_env(PathBuf::from("/tmp/noisevault-fallback")).unwrap();
        env::remove_var(ENV_DATA_DIR);
        env::remove_var(ENV_CONFIG_PATH);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/noisevault-override"));
    }

    #[test]
    fn config_file_overrides_defaults_but_not_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "max_previous_keys = 9\nrekey_message_threshold = 42\n",
        )
        .unwrap();

        env::set_var(ENV_CONFIG_PATH, &config_path);
        env::set_var(ENV_MAX_PREVIOUS_KEYS, "11");
        let config = CoreConfig::from_env(PathBuf::from("/tmp/noisevault-test")).unwrap();
        env::remove_var(ENV_MAX_PREVIOUS_KEYS);
        env::remove_var(ENV_CONFIG_PATH);

        // File overrides the built-in default...
        assert_eq!(config.rekey_message_threshold, 42);
        // ...but an explicit env var still wins over the file.
        assert_eq!(config.max_previous_keys, 11);
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        no_config_file_guard();
        let config = CoreConfig::from_env(PathBuf::from("/tmp/noisevault-test"));
        env::remove_var(ENV_CONFIG_PATH);
        assert!(config.is_ok());
    }
}
