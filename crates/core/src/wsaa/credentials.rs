//! Loading of the X.509 certificate and private key used for signing.

use std::fmt;
use std::path::Path;

use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use tracing::{debug, info};

use super::AuthError;

/// Certificate and matching private key, loaded once and held read-only.
pub struct SigningCredentials {
    certificate: X509,
    private_key: PKey<Private>,
}

impl SigningCredentials {
    /// Load PEM material from disk. The key may be passphrase-protected.
    pub fn load(
        certificate_path: &Path,
        private_key_path: &Path,
        passphrase: Option<&str>,
    ) -> Result<Self, AuthError> {
        let certificate = load_certificate(certificate_path)?;
        let private_key = load_private_key(private_key_path, passphrase)?;
        info!(
            certificate = %certificate_path.display(),
            "Signing credentials loaded"
        );
        Ok(Self {
            certificate,
            private_key,
        })
    }

    /// Build from already-parsed PEM bytes.
    pub fn from_pem(
        certificate_pem: &[u8],
        private_key_pem: &[u8],
        passphrase: Option<&str>,
    ) -> Result<Self, AuthError> {
        let certificate = X509::from_pem(certificate_pem)
            .map_err(|e| credential_error("<certificate>", e))?;
        let private_key = parse_private_key(private_key_pem, passphrase)
            .map_err(|e| credential_error("<private key>", e))?;
        Ok(Self {
            certificate,
            private_key,
        })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// Subject of the certificate, for logs.
    pub fn subject(&self) -> String {
        self.certificate
            .subject_name()
            .entries()
            .filter_map(|entry| {
                let key = entry.object().nid().short_name().ok()?;
                let value = entry.data().to_string().ok()?;
                Some(format!("{}={}", key, value))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("subject", &self.subject())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn load_certificate(path: &Path) -> Result<X509, AuthError> {
    debug!(path = %path.display(), "Loading certificate");
    let bytes = std::fs::read(path).map_err(|e| credential_error(path, e))?;
    X509::from_pem(&bytes).map_err(|e| credential_error(path, e))
}

fn load_private_key(path: &Path, passphrase: Option<&str>) -> Result<PKey<Private>, AuthError> {
    debug!(path = %path.display(), encrypted = passphrase.is_some(), "Loading private key");
    let bytes = std::fs::read(path).map_err(|e| credential_error(path, e))?;
    parse_private_key(&bytes, passphrase).map_err(|e| credential_error(path, e))
}

fn parse_private_key(
    pem: &[u8],
    passphrase: Option<&str>,
) -> Result<PKey<Private>, openssl::error::ErrorStack> {
    match passphrase {
        Some(passphrase) => PKey::private_key_from_pem_passphrase(pem, passphrase.as_bytes()),
        // Empty passphrase callback: an encrypted key fails instead of prompting on a tty.
        None => PKey::private_key_from_pem_callback(pem, |_| Ok(0)),
    }
}

fn credential_error(path: impl AsRef<Path>, reason: impl fmt::Display) -> AuthError {
    AuthError::CredentialLoad {
        path: path.as_ref().display().to_string(),
        reason: reason.to_string(),
    }
}
