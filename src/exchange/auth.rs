//! Request signing for the exchange API
//!
//! The signature is a hex HMAC-SHA256, keyed with the shared secret, over
//! `timestamp + METHOD + path`, with `sha256_hex(body)` appended when the
//! request has a body.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::common::errors::{EngineError, Result};
use crate::config::types::ApiCredentials;

type HmacSha256 = Hmac<Sha256>;

/// Build the canonical string that gets signed
pub fn canonical_string(timestamp_ms: i64, method: &str, path: &str, body: Option<&str>) -> String {
    match body.filter(|b| !b.is_empty()) {
        Some(body) => {
            let body_hash = hex::encode(Sha256::digest(body.as_bytes()));
            format!("{}{}{}{}", timestamp_ms, method.to_uppercase(), path, body_hash)
        }
        None => format!("{}{}{}", timestamp_ms, method.to_uppercase(), path),
    }
}

/// Generate the hex HMAC-SHA256 signature for a request
///
/// # Arguments
/// * `secret` - Shared API secret (raw UTF-8)
/// * `timestamp_ms` - Unix timestamp in milliseconds
/// * `method` - HTTP method (GET, POST, etc.)
/// * `path` - Request path including any base path prefix
/// * `body` - Request body, `None` for GET requests
pub fn sign_request(
    secret: &str,
    timestamp_ms: i64,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<String> {
    let message = canonical_string(timestamp_ms, method, path, body);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| EngineError::Authentication(format!("Failed to create HMAC: {}", e)))?;
    mac.update(message.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Generate signed headers for a request, stamped with the current time
pub fn generate_auth_headers(
    credentials: &ApiCredentials,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<AuthHeaders> {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let signature = sign_request(&credentials.api_secret, timestamp, method, path, body)?;

    Ok(AuthHeaders {
        api_key: credentials.api_key.clone(),
        signature,
        timestamp,
    })
}

/// Authentication headers for API requests
#[derive(Debug, Clone)]
pub struct AuthHeaders {
    pub api_key: String,
    pub signature: String,
    pub timestamp: i64,
}

impl AuthHeaders {
    pub const KEY_HEADER: &'static str = "ACCESS-KEY";
    pub const TIMESTAMP_HEADER: &'static str = "ACCESS-TIMESTAMP";
    pub const SIGNATURE_HEADER: &'static str = "ACCESS-SIGNATURE";

    /// Add authentication headers to a reqwest RequestBuilder
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(Self::KEY_HEADER, &self.api_key)
            .header(Self::TIMESTAMP_HEADER, self.timestamp.to_string())
            .header(Self::SIGNATURE_HEADER, &self.signature)
    }
}
