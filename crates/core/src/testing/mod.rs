//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the transport and ticket
//! traits, so lookups can be exercised end to end without the remote
//! services.
//!
//! # Example
//!
//! ```rust,ignore
//! use padron_core::testing::{MockPadronTransport, MockTicketProvider};
//!
//! let provider = MockTicketProvider::new(clock.clone());
//! let transport = MockPadronTransport::new();
//!
//! // Configure mock behavior
//! provider.set_principal(None).await;
//! transport.fail_id(20123456789, "No existe persona con ese Id").await;
//! ```

mod mock_login_transport;
mod mock_padron_transport;
mod mock_ticket_provider;

pub use mock_login_transport::MockLoginTransport;
pub use mock_padron_transport::{MockPadronTransport, RecordedCall};
pub use mock_ticket_provider::MockTicketProvider;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::DateTime;
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::symm::Cipher;
    use openssl::x509::{X509Builder, X509NameBuilder};
    use quick_xml::escape::escape;

    use crate::padron::PersonaRecord;
    use crate::soap::XmlElement;
    use crate::wsaa::{AuthorizationTicket, LoginResponse};

    /// Token returned by `login_ticket_response`.
    pub const TOKEN: &str = "PD94bWwgdG9rZW4=";
    /// Sign returned by `login_ticket_response`.
    pub const SIGN: &str = "c2lnbmF0dXJl";

    /// Self-signed certificate and key in PEM form.
    pub struct TestCredentials {
        pub certificate_pem: Vec<u8>,
        pub private_key_pem: Vec<u8>,
        key: PKey<Private>,
    }

    impl TestCredentials {
        /// The same key as PKCS#8, encrypted with AES-256-CBC.
        pub fn encrypted_private_key_pem(&self, passphrase: &str) -> Vec<u8> {
            self.key
                .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), passphrase.as_bytes())
                .expect("encrypt test key")
        }
    }

    /// Generate a fresh RSA key and a self-signed certificate with subject
    /// `CN=padron-test, serialNumber=CUIT <cuit>`.
    pub fn test_credentials(cuit: &str) -> TestCredentials {
        let key = PKey::from_rsa(Rsa::generate(2048).expect("generate RSA key"))
            .expect("wrap RSA key");

        let mut name = X509NameBuilder::new().expect("name builder");
        name.append_entry_by_nid(Nid::COMMONNAME, "padron-test")
            .expect("CN");
        name.append_entry_by_nid(Nid::SERIALNUMBER, &format!("CUIT {}", cuit))
            .expect("serialNumber");
        let name = name.build();

        let serial = BigNum::from_u32(1)
            .and_then(|n| n.to_asn1_integer())
            .expect("serial");
        let not_before = Asn1Time::days_from_now(0).expect("not_before");
        let not_after = Asn1Time::days_from_now(365).expect("not_after");

        let mut builder = X509Builder::new().expect("x509 builder");
        builder.set_version(2).expect("version");
        builder.set_serial_number(&serial).expect("serial number");
        builder.set_subject_name(&name).expect("subject");
        builder.set_issuer_name(&name).expect("issuer");
        builder.set_not_before(&not_before).expect("not_before");
        builder.set_not_after(&not_after).expect("not_after");
        builder.set_pubkey(&key).expect("pubkey");
        builder
            .sign(&key, MessageDigest::sha256())
            .expect("self-sign");
        let certificate = builder.build();

        TestCredentials {
            certificate_pem: certificate.to_pem().expect("certificate pem"),
            private_key_pem: key.private_key_to_pem_pkcs8().expect("key pem"),
            key,
        }
    }

    /// A `loginTicketResponse` document as the login service returns it.
    pub fn login_ticket_response(destination: &str, expiration: Option<&str>) -> String {
        let expiration = expiration
            .map(|e| format!("<expirationTime>{}</expirationTime>", e))
            .unwrap_or_default();
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<loginTicketResponse version="1.0">"#,
                "<header>",
                "<source>CN=wsaa, O=AFIP, C=AR</source>",
                "<destination>{destination}</destination>",
                "<uniqueId>383798577</uniqueId>",
                "<generationTime>2024-05-01T09:50:00.000-03:00</generationTime>",
                "{expiration}",
                "</header>",
                "<credentials><token>{token}</token><sign>{sign}</sign></credentials>",
                "</loginTicketResponse>"
            ),
            destination = escape(destination),
            expiration = expiration,
            token = TOKEN,
            sign = SIGN,
        )
    }

    /// A `loginCms` SOAP response carrying `inner` as escaped text.
    pub fn login_cms_envelope(inner: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
                "<soapenv:Body>",
                r#"<loginCmsResponse xmlns="http://wsaa.view.sua.dvadac.desein.afip.gov">"#,
                "<loginCmsReturn>{}</loginCmsReturn>",
                "</loginCmsResponse>",
                "</soapenv:Body>",
                "</soapenv:Envelope>"
            ),
            escape(inner)
        )
    }

    pub fn login_response(destination: &str, expiration: Option<&str>) -> LoginResponse {
        LoginResponse {
            source: Some("CN=wsaa, O=AFIP, C=AR".to_string()),
            destination: Some(destination.to_string()),
            unique_id: Some("383798577".to_string()),
            generation_time: Some("2024-05-01T09:50:00.000-03:00".to_string()),
            expiration_time: expiration.map(str::to_string),
            token: Some(TOKEN.to_string()),
            sign: Some(SIGN.to_string()),
        }
    }

    /// A ticket expiring at `expiration` (RFC 3339).
    pub fn ticket(expiration: &str, principal: Option<&str>) -> AuthorizationTicket {
        AuthorizationTicket::new(
            TOKEN,
            SIGN,
            DateTime::parse_from_rfc3339(expiration).expect("RFC 3339 expiration"),
            principal.map(str::to_string),
        )
    }

    /// An A5 `persona` element for a natural person.
    pub fn a5_persona(id: &str, last_name: &str, first_name: &str) -> XmlElement {
        XmlElement::new("persona").with_child(
            XmlElement::new("datosGenerales")
                .with_child(XmlElement::new("apellido").with_text(last_name))
                .with_child(
                    XmlElement::new("domicilioFiscal")
                        .with_child(XmlElement::new("codPostal").with_text("1001"))
                        .with_child(
                            XmlElement::new("descripcionProvincia")
                                .with_text("CIUDAD AUTONOMA BUENOS AIRES"),
                        )
                        .with_child(XmlElement::new("direccion").with_text("AV CORRIENTES 1234"))
                        .with_child(
                            XmlElement::new("localidad").with_text("CIUDAD AUTONOMA BUENOS AIRES"),
                        ),
                )
                .with_child(XmlElement::new("estadoClave").with_text("ACTIVO"))
                .with_child(XmlElement::new("idPersona").with_text(id))
                .with_child(XmlElement::new("nombre").with_text(first_name))
                .with_child(XmlElement::new("tipoPersona").with_text("FISICA")),
        )
    }

    /// An A13 `persona` element for a company, with a legal and a fiscal domicile.
    pub fn a13_persona(id: &str, business_name: &str) -> XmlElement {
        XmlElement::new("persona")
            .with_child(
                XmlElement::new("domicilio")
                    .with_child(XmlElement::new("direccion").with_text("CALLE FALSA 123"))
                    .with_child(XmlElement::new("tipoDomicilio").with_text("LEGAL/REAL")),
            )
            .with_child(
                XmlElement::new("domicilio")
                    .with_child(XmlElement::new("codigoPostal").with_text("5000"))
                    .with_child(XmlElement::new("descripcionProvincia").with_text("CORDOBA"))
                    .with_child(XmlElement::new("direccion").with_text("AV SIEMPRE VIVA 742"))
                    .with_child(XmlElement::new("localidad").with_text("CORDOBA"))
                    .with_child(XmlElement::new("tipoDomicilio").with_text("FISCAL")),
            )
            .with_child(XmlElement::new("estadoClave").with_text("ACTIVO"))
            .with_child(XmlElement::new("idPersona").with_text(id))
            .with_child(XmlElement::new("razonSocial").with_text(business_name))
            .with_child(XmlElement::new("tipoPersona").with_text("JURIDICA"))
    }

    /// A parsed record whose tax id is `id`.
    pub fn persona_record(id: &str) -> PersonaRecord {
        PersonaRecord::from_element(&a13_persona(id, &format!("PERSONA {}", id)))
    }
}
