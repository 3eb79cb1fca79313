//! CMS (PKCS#7 signed-data) signing of ticket requests.
//!
//! The document is signed in binary mode and written as an S/MIME message.
//! The transportable payload is the base64 body of the part whose filename
//! starts with `smime.p7`.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::X509;
use tracing::debug;

use super::credentials::SigningCredentials;
use super::AuthError;

const SIGNED_PART_PREFIX: &str = "smime.p7";

/// Base64 CMS payload, ready to be sent to the login service once.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedRequest(String);

impl SignedRequest {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Decoded DER bytes of the CMS structure.
    pub fn to_der(&self) -> Result<Vec<u8>, AuthError> {
        STANDARD
            .decode(&self.0)
            .map_err(|e| AuthError::Signing(format!("signed payload is not base64: {}", e)))
    }
}

impl fmt::Debug for SignedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedRequest({} bytes)", self.0.len())
    }
}

/// Signs documents with a certificate and its private key.
#[derive(Debug, Clone)]
pub struct MessageSigner {
    credentials: Arc<SigningCredentials>,
}

impl MessageSigner {
    pub fn new(credentials: Arc<SigningCredentials>) -> Self {
        Self { credentials }
    }

    pub fn sign(&self, document: &[u8]) -> Result<SignedRequest, AuthError> {
        let certificate = self.credentials.certificate();
        let private_key = self.credentials.private_key();

        let certificate_key = certificate.public_key().map_err(signing_error)?;
        if !certificate_key.public_eq(private_key) {
            return Err(AuthError::Signing(
                "private key does not match the certificate".to_string(),
            ));
        }

        let extra_certs = Stack::<X509>::new().map_err(signing_error)?;
        // The digest is OpenSSL's default for the key type, SHA-256 for RSA.
        let pkcs7 = Pkcs7::sign(
            certificate,
            private_key,
            &extra_certs,
            document,
            Pkcs7Flags::BINARY,
        )
        .map_err(signing_error)?;

        let smime = pkcs7
            .to_smime(document, Pkcs7Flags::BINARY)
            .map_err(signing_error)?;
        let smime = String::from_utf8(smime)
            .map_err(|e| AuthError::Signing(format!("S/MIME output is not UTF-8: {}", e)))?;

        let signed = extract_signed_part(&smime)?;
        debug!(payload_len = signed.as_str().len(), "Ticket request signed");
        Ok(signed)
    }
}

fn signing_error(error: openssl::error::ErrorStack) -> AuthError {
    AuthError::Signing(error.to_string())
}

/// Walk a MIME message (and its multipart children) and return the base64
/// body of the first part whose filename starts with `smime.p7`.
pub(crate) fn extract_signed_part(message: &str) -> Result<SignedRequest, AuthError> {
    let payload = find_signed_part(message).ok_or_else(|| {
        AuthError::Signing("signed-data part not found in S/MIME envelope".to_string())
    })?;

    let payload: String = payload.split_whitespace().collect();
    let decoded = STANDARD
        .decode(&payload)
        .map_err(|e| AuthError::Signing(format!("signed-data part is not base64: {}", e)))?;
    if decoded.is_empty() {
        return Err(AuthError::Signing("signed-data part is empty".to_string()));
    }

    Ok(SignedRequest(payload))
}

fn find_signed_part(message: &str) -> Option<&str> {
    let (headers, body) = split_headers(message);

    let filename = header_value(&headers, "content-disposition")
        .and_then(|v| header_param(v, "filename"))
        .or_else(|| header_value(&headers, "content-type").and_then(|v| header_param(v, "name")));
    if filename.is_some_and(|name| name.starts_with(SIGNED_PART_PREFIX)) {
        return Some(body);
    }

    let content_type = header_value(&headers, "content-type")?;
    if !content_type.to_ascii_lowercase().starts_with("multipart/") {
        return None;
    }
    let boundary = header_param(content_type, "boundary")?;
    let delimiter = format!("--{}", boundary);

    body.split(delimiter.as_str())
        // Preamble before the first delimiter, epilogue after the closing one.
        .skip(1)
        .take_while(|part| !part.starts_with("--"))
        .find_map(|part| find_signed_part(part.trim_start_matches(['\r', '\n'])))
}

/// Split a MIME entity into unfolded `(name, value)` headers and its body.
fn split_headers(entity: &str) -> (Vec<(String, String)>, &str) {
    let (head, body) = match entity.find("\r\n\r\n") {
        Some(idx) if entity.find("\n\n").map_or(true, |lf| idx < lf) => {
            (&entity[..idx], &entity[idx + 4..])
        }
        _ => match entity.find("\n\n") {
            Some(idx) => (&entity[..idx], &entity[idx + 2..]),
            None => (entity, ""),
        },
    };

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in head.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    (headers, body)
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Extract `param` from a header value like `attachment; filename="smime.p7m"`.
fn header_param<'a>(value: &'a str, param: &str) -> Option<&'a str> {
    value.split(';').skip(1).find_map(|segment| {
        let (key, val) = segment.split_once('=')?;
        if key.trim().eq_ignore_ascii_case(param) {
            Some(val.trim().trim_matches('"'))
        } else {
            None
        }
    })
}
