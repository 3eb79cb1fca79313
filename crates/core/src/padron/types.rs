//! Typed views over registry responses.

use serde::{Deserialize, Serialize};

use crate::soap::XmlElement;

/// Sections of an A5 record that may carry per-identifier error lists.
const ERROR_SECTIONS: [&str; 3] = ["errorConstancia", "errorRegimenGeneral", "errorMonotributo"];

/// One taxpayer record.
///
/// The commonly used fields are lifted out with explicit presence; the full
/// element tree stays available in `raw` for anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    /// `FISICA` or `JURIDICA`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    /// Registration status, e.g. `ACTIVO`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_address: Option<Address>,
    /// Error messages the service attached to this record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remote_errors: Vec<String>,
    pub raw: XmlElement,
}

impl PersonaRecord {
    /// Read a `persona` element. A5 nests the data under `datosGenerales`,
    /// A13 keeps it at the top level.
    pub fn from_element(element: &XmlElement) -> Self {
        let general = element.child("datosGenerales").unwrap_or(element);
        let text = |name: &str| general.child_text(name).map(str::to_string);

        let fiscal_address = general
            .child("domicilioFiscal")
            .or_else(|| {
                element
                    .children_named("domicilio")
                    .find(|d| d.child_text("tipoDomicilio") == Some("FISCAL"))
            })
            .map(Address::from_element);

        let remote_errors: Vec<String> = ERROR_SECTIONS
            .iter()
            .filter_map(|section| element.child(section))
            .flat_map(|section| section.children_named("error"))
            .filter_map(|e| e.text.clone())
            .collect();

        let tax_id = text("idPersona").or_else(|| {
            ERROR_SECTIONS
                .iter()
                .filter_map(|section| element.path(&[*section, "idPersona"]))
                .find_map(|e| e.text.clone())
        });

        Self {
            tax_id,
            person_type: text("tipoPersona"),
            first_name: text("nombre"),
            last_name: text("apellido"),
            business_name: text("razonSocial"),
            key_status: text("estadoClave"),
            fiscal_address,
            remote_errors,
            raw: element.clone(),
        }
    }

    /// Display name: business name for companies, "last, first" for people.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = &self.business_name {
            return Some(name.clone());
        }
        match (&self.last_name, &self.first_name) {
            (Some(last), Some(first)) => Some(format!("{}, {}", last, first)),
            (Some(last), None) => Some(last.clone()),
            (None, Some(first)) => Some(first.clone()),
            (None, None) => None,
        }
    }

    pub fn has_remote_errors(&self) -> bool {
        !self.remote_errors.is_empty()
    }
}

/// Postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
}

impl Address {
    fn from_element(element: &XmlElement) -> Self {
        let text = |name: &str| element.child_text(name).map(str::to_string);
        Self {
            street: text("direccion"),
            locality: text("localidad"),
            postal_code: text("codPostal").or_else(|| text("codigoPostal")),
            province: text("descripcionProvincia"),
        }
    }
}

/// Result of the service health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub app_server: String,
    pub auth_server: String,
    pub db_server: String,
}

impl ServerStatus {
    pub fn from_element(element: &XmlElement) -> Self {
        let text = |name: &str| element.child_text(name).unwrap_or_default().to_string();
        Self {
            app_server: text("appserver"),
            auth_server: text("authserver"),
            db_server: text("dbserver"),
        }
    }

    /// All three components report `OK`.
    pub fn is_operational(&self) -> bool {
        [&self.app_server, &self.auth_server, &self.db_server]
            .iter()
            .all(|s| s.as_str() == "OK")
    }
}
