//! Cloak Configuration
//!
//! Shared configuration crate for the Cloak client components.
//!
//! Handles loading configuration from:
//! 1. CLOAK_CONFIG env var (explicit path)
//! 2. ./cloak.toml (current directory)
//! 3. ~/.cloak/cloak.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<CloakConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "cloak.toml";
const CONFIG_DIR_NAME: &str = ".cloak";

// ============================================================================
// Default Constants
// ============================================================================

pub const DEFAULT_CONTRACT: &str = "0x00000000000000000000000000000000c10a4c01";
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SUCCESS_DISPLAY_MS: u64 = 2000;
const DEFAULT_ERROR_DISPLAY_MS: u64 = 3000;
const DEFAULT_MAX_ID_ATTEMPTS: u32 = 5;
const DEFAULT_PURPOSE_LABEL: &str = "Alumni Support Request";

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloakConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub create: CreateConfig,
}

/// Ledger connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Request contract address; the target context for encryption
    #[serde(default = "default_contract")]
    pub contract_address: String,
    /// How long to wait for a write to be included in a block
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    /// Upper bound on any single ledger read
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT.into(),
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

fn default_contract() -> String {
    DEFAULT_CONTRACT.into()
}
fn default_confirmation_timeout() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}
fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT_SECS
}

/// Status notification display policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_success_display")]
    pub success_display_ms: u64,
    #[serde(default = "default_error_display")]
    pub error_display_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            success_display_ms: DEFAULT_SUCCESS_DISPLAY_MS,
            error_display_ms: DEFAULT_ERROR_DISPLAY_MS,
        }
    }
}

fn default_success_display() -> u64 {
    DEFAULT_SUCCESS_DISPLAY_MS
}
fn default_error_display() -> u64 {
    DEFAULT_ERROR_DISPLAY_MS
}

/// Record creation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConfig {
    /// Id generation attempts before giving up on collisions
    #[serde(default = "default_max_id_attempts")]
    pub max_id_attempts: u32,
    /// Description label stored with every record
    #[serde(default = "default_purpose_label")]
    pub purpose_label: String,
}

impl Default for CreateConfig {
    fn default() -> Self {
        Self {
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
            purpose_label: DEFAULT_PURPOSE_LABEL.into(),
        }
    }
}

fn default_max_id_attempts() -> u32 {
    DEFAULT_MAX_ID_ATTEMPTS
}
fn default_purpose_label() -> String {
    DEFAULT_PURPOSE_LABEL.into()
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl CloakConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("CLOAK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Ledger
        env_string("CLOAK_CONTRACT", &mut self.ledger.contract_address);
        env_parse(
            "CLOAK_CONFIRMATION_TIMEOUT_SECS",
            &mut self.ledger.confirmation_timeout_secs,
        );
        env_parse("CLOAK_READ_TIMEOUT_SECS", &mut self.ledger.read_timeout_secs);

        // Status
        env_parse("CLOAK_SUCCESS_DISPLAY_MS", &mut self.status.success_display_ms);
        env_parse("CLOAK_ERROR_DISPLAY_MS", &mut self.status.error_display_ms);

        // Create
        env_parse("CLOAK_MAX_ID_ATTEMPTS", &mut self.create.max_id_attempts);
        env_string("CLOAK_PURPOSE_LABEL", &mut self.create.purpose_label);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger.confirmation_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger.read_timeout_secs)
    }

    pub fn success_display(&self) -> Duration {
        Duration::from_millis(self.status.success_display_ms)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_millis(self.status.error_display_ms)
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static CloakConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: CloakConfig) -> Result<(), CloakConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `CloakConfig::global()`.
#[inline]
pub fn global_config() -> &'static CloakConfig {
    CloakConfig::global()
}

// ============================================================================
// Tests
// ============================================================================
