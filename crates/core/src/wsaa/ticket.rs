//! Authorization ticket value object.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::login::LoginResponse;
use super::AuthError;

static PRINCIPAL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"CUIT (\d+)").unwrap());

/// Short-lived credential issued by the login service.
///
/// Immutable once built. `principal_id` is the tax id the ticket was issued
/// for; it is optional here and checked by the orchestrator before any
/// resource call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationTicket {
    pub token: String,
    pub sign: String,
    pub expiration: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
}

impl AuthorizationTicket {
    pub fn new(
        token: impl Into<String>,
        sign: impl Into<String>,
        expiration: DateTime<FixedOffset>,
        principal_id: Option<String>,
    ) -> Self {
        Self {
            token: token.into(),
            sign: sign.into(),
            expiration,
            principal_id,
        }
    }

    /// Build a ticket from the login response fields.
    pub fn from_response(response: LoginResponse) -> Result<Self, AuthError> {
        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedTicket("token is missing".to_string()))?;
        let sign = response
            .sign
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::MalformedTicket("sign is missing".to_string()))?;
        let raw_expiration = response
            .expiration_time
            .ok_or_else(|| AuthError::MalformedTicket("expirationTime is missing".to_string()))?;
        let expiration = parse_expiration(&raw_expiration)?;

        let principal_id = response.destination.as_deref().and_then(extract_principal);
        if principal_id.is_none() {
            warn!(
                destination = response.destination.as_deref().unwrap_or(""),
                "No CUIT found in ticket destination"
            );
        }

        Ok(Self {
            token,
            sign,
            expiration,
            principal_id,
        })
    }

    /// True while `now` is strictly before the expiration instant.
    pub fn is_valid(&self, now: DateTime<FixedOffset>) -> bool {
        now < self.expiration
    }

    /// Principal id as the numeric value the registry services expect.
    pub fn principal_number(&self) -> Option<u64> {
        self.principal_id.as_deref().and_then(|p| p.parse().ok())
    }
}

/// The expiration must carry an explicit UTC offset; naive timestamps are
/// rejected so that validity checks always compare instants.
fn parse_expiration(value: &str) -> Result<DateTime<FixedOffset>, AuthError> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|e| {
        AuthError::MalformedTicket(format!("invalid expirationTime '{}': {}", value, e))
    })
}

/// Digits following `CUIT ` in the ticket destination, if any.
pub fn extract_principal(destination: &str) -> Option<String> {
    PRINCIPAL_PATTERN
        .captures(destination)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

impl fmt::Display for AuthorizationTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Token: {}", abbreviate(&self.token))?;
        writeln!(f, "Sign: {}", abbreviate(&self.sign))?;
        writeln!(f, "Expiration Time: {}", self.expiration.to_rfc3339())?;
        write!(
            f,
            "CUIT: {}",
            self.principal_id.as_deref().unwrap_or("<absent>")
        )
    }
}

fn abbreviate(value: &str) -> String {
    if value.chars().count() <= 12 {
        value.to_string()
    } else {
        let head: String = value.chars().take(12).collect();
        format!("{}... ({} chars)", head, value.chars().count())
    }
}
