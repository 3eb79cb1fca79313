use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::catalog::Environment;
use crate::orchestrator::LookupConfig;
use crate::wsaa::DEFAULT_SKEW_MINUTES;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Selects production endpoints for both login and registry services.
    #[serde(default)]
    pub production: bool,
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub ticket: TicketConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
}

impl Config {
    pub fn environment(&self) -> Environment {
        Environment::from_production_flag(self.production)
    }
}

/// Signing material. Both files are PEM.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    /// Passphrase for an encrypted private key.
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// Ticket request configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TicketConfig {
    /// Minutes subtracted from now for `generationTime`; the request window
    /// is twice this long.
    #[serde(default = "default_skew_minutes")]
    pub skew_minutes: u32,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            skew_minutes: default_skew_minutes(),
        }
    }
}

fn default_skew_minutes() -> u32 {
    DEFAULT_SKEW_MINUTES
}

/// Sanitized config for display (passphrase redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub environment: String,
    pub credentials: SanitizedCredentialsConfig,
    pub ticket: TicketConfig,
    pub lookup: LookupConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCredentialsConfig {
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    pub passphrase_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            environment: config.environment().as_str().to_string(),
            credentials: SanitizedCredentialsConfig {
                certificate_path: config.credentials.certificate_path.clone(),
                private_key_path: config.credentials.private_key_path.clone(),
                passphrase_configured: config
                    .credentials
                    .passphrase
                    .as_deref()
                    .is_some_and(|p| !p.is_empty()),
            },
            ticket: config.ticket.clone(),
            lookup: config.lookup.clone(),
        }
    }
}
