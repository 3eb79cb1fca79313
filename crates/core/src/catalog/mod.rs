//! Static catalog of the remote services this crate can talk to.
//!
//! Every service variant resolves to a `ServiceDescriptor` holding its
//! testing/production endpoints, the name used in ticket requests, the SOAP
//! namespace of its operations and the lookup method it exposes. The tables
//! are `'static` and never change at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Login endpoint used in production.
pub const LOGIN_PRODUCTION_ENDPOINT: &str = "https://wsaa.afip.gov.ar/ws/services/LoginCms";

/// Login endpoint used in the testing (homologation) environment.
pub const LOGIN_TESTING_ENDPOINT: &str = "https://wsaahomo.afip.gov.ar/ws/services/LoginCms";

/// Which environment to target. Switches the login endpoint and every
/// resource endpoint at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Testing,
    Production,
}

impl Environment {
    pub fn from_production_flag(is_production: bool) -> Self {
        if is_production {
            Environment::Production
        } else {
            Environment::Testing
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Login endpoint for this environment.
    pub fn login_endpoint(&self) -> &'static str {
        match self {
            Environment::Production => LOGIN_PRODUCTION_ENDPOINT,
            Environment::Testing => LOGIN_TESTING_ENDPOINT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Testing => "testing",
            Environment::Production => "production",
        }
    }
}

/// How a service answers a multi-identifier query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// One call carries the whole identifier list (`getPersonaList_v2`).
    Batch,
    /// One call per identifier (`getPersona`).
    PerItem,
}

impl LookupMode {
    /// Remote operation name implementing this mode.
    pub fn operation(&self) -> &'static str {
        match self {
            LookupMode::Batch => "getPersonaList_v2",
            LookupMode::PerItem => "getPersona",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LookupMode::Batch => "batch",
            LookupMode::PerItem => "per_item",
        }
    }
}

/// Immutable description of one remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub testing_endpoint: &'static str,
    pub production_endpoint: &'static str,
    /// Name placed in the ticket request's `service` element.
    pub service_name: &'static str,
    /// Target namespace of the service's SOAP operations.
    pub namespace: &'static str,
    pub lookup_mode: LookupMode,
}

impl ServiceDescriptor {
    /// Resource endpoint for the given environment.
    pub fn endpoint(&self, environment: Environment) -> &'static str {
        match environment {
            Environment::Production => self.production_endpoint,
            Environment::Testing => self.testing_endpoint,
        }
    }
}

static CONSTANCIA_INSCRIPCION: ServiceDescriptor = ServiceDescriptor {
    testing_endpoint: "https://awshomo.afip.gov.ar/sr-padron/webservices/personaServiceA5",
    production_endpoint: "https://aws.afip.gov.ar/sr-padron/webservices/personaServiceA5",
    service_name: "ws_sr_constancia_inscripcion",
    namespace: "http://a5.soap.ws.server.puc.sr/",
    lookup_mode: LookupMode::Batch,
};

static PADRON_A13: ServiceDescriptor = ServiceDescriptor {
    testing_endpoint: "https://awshomo.afip.gov.ar/sr-padron/webservices/personaServiceA13",
    production_endpoint: "https://aws.afip.gov.ar/sr-padron/webservices/personaServiceA13",
    service_name: "ws_sr_padron_a13",
    namespace: "http://a13.soap.ws.server.puc.sr/",
    lookup_mode: LookupMode::PerItem,
};

/// The service variants known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Registration certificate service (A5), batch lookups.
    ConstanciaInscripcion,
    /// Taxpayer registry A13, per-item lookups.
    PadronA13,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 2] = [ServiceKind::ConstanciaInscripcion, ServiceKind::PadronA13];

    pub fn descriptor(&self) -> &'static ServiceDescriptor {
        match self {
            ServiceKind::ConstanciaInscripcion => &CONSTANCIA_INSCRIPCION,
            ServiceKind::PadronA13 => &PADRON_A13,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::ConstanciaInscripcion => "constancia_inscripcion",
            ServiceKind::PadronA13 => "padron_a13",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    /// Accepts both the short kind name and the remote service name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.descriptor().service_name == s)
            .ok_or_else(|| format!("unknown service: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_switches_every_endpoint() {
        for kind in ServiceKind::ALL {
            let descriptor = kind.descriptor();
            let prod = descriptor.endpoint(Environment::Production);
            let test = descriptor.endpoint(Environment::Testing);
            assert!(prod.starts_with("https://aws.afip.gov.ar/"));
            assert!(test.starts_with("https://awshomo.afip.gov.ar/"));
        }
        assert_eq!(
            Environment::Production.login_endpoint(),
            LOGIN_PRODUCTION_ENDPOINT
        );
        assert_eq!(Environment::Testing.login_endpoint(), LOGIN_TESTING_ENDPOINT);
    }

    #[test]
    fn test_lookup_modes() {
        assert_eq!(
            ServiceKind::ConstanciaInscripcion.descriptor().lookup_mode,
            LookupMode::Batch
        );
        assert_eq!(
            ServiceKind::PadronA13.descriptor().lookup_mode,
            LookupMode::PerItem
        );
        assert_eq!(LookupMode::Batch.operation(), "getPersonaList_v2");
        assert_eq!(LookupMode::PerItem.operation(), "getPersona");
    }

    #[test]
    fn test_service_kind_from_str() {
        assert_eq!(
            "padron_a13".parse::<ServiceKind>().unwrap(),
            ServiceKind::PadronA13
        );
        assert_eq!(
            "ws_sr_constancia_inscripcion".parse::<ServiceKind>().unwrap(),
            ServiceKind::ConstanciaInscripcion
        );
        assert!("ws_unknown".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_environment_from_flag() {
        assert_eq!(
            Environment::from_production_flag(true),
            Environment::Production
        );
        assert!(!Environment::from_production_flag(false).is_production());
    }
}
