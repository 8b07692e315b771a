//! Configuration for a migration run
//!
//! OAuth client credentials are loaded from (in order of priority):
//! 1. Compile-time embedded credentials (for release builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)
//!
//! Tunables live in an optional `settings.json`; per-run choices are carried
//! in [`MigrationOptions`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dedup::DEFAULT_DUPLICATE_THRESHOLD;
use crate::migrate::DEFAULT_LABEL_NAME;
use crate::retry::RetryPolicy;

/// Credentials filename in the mailsplit config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Settings filename in the mailsplit config directory
const SETTINGS_FILE: &str = "settings.json";

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials (for production builds)
    /// 2. JSON file (~/.config/mailsplit/google-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        // Embedded credentials first (release builds)
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        // Fall back to runtime environment variables
        Self::from_env()
    }

    /// Load credentials embedded at compile time via environment variables.
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    /// Parse credentials from a GoogleCredentialFile
    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Load from an explicit file if given, otherwise via [`Self::load`]
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::load().with_context(|| {
                format!(
                    "No Gmail OAuth credentials found; place them in {} or pass --credentials",
                    Self::default_credentials_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| CREDENTIALS_FILE.to_string())
                )
            }),
        }
    }

    /// Get the default credentials file path (~/.config/mailsplit/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// Tunables read from `~/.config/mailsplit/settings.json`
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Retries after the first attempt of a remote call
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    /// SimHash distance below which multipart messages are duplicates
    pub duplicate_threshold: u32,
    /// Label attached to migrated messages
    pub label_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_retries: RetryPolicy::DEFAULT_MAX_RETRIES,
            retry_delay_secs: RetryPolicy::DEFAULT_DELAY.as_secs(),
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            label_name: DEFAULT_LABEL_NAME.to_string(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent
    pub fn load() -> Result<Self> {
        config::load_json_or_default(SETTINGS_FILE)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings JSON")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }
}

/// What a single run should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Addresses whose correspondence is moved
    pub correspondents: Vec<String>,
    /// Log mutations instead of performing them
    pub dry_run: bool,
    /// Insert without searching the destination for copies
    pub skip_deduplicate: bool,
    /// Stop after this many messages
    pub limit: Option<usize>,
    pub duplicate_threshold: u32,
    pub label_name: String,
}

impl MigrationOptions {
    pub fn new(correspondents: Vec<String>) -> Self {
        Self::with_settings(correspondents, &Settings::default())
    }

    /// Options seeded from `settings`
    pub fn with_settings(correspondents: Vec<String>, settings: &Settings) -> Self {
        Self {
            correspondents,
            dry_run: false,
            skip_deduplicate: false,
            limit: None,
            duplicate_threshold: settings.duplicate_threshold,
            label_name: settings.label_name.clone(),
        }
    }
}
