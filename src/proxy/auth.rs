//! Exchange-specific request signing.
//!
//! Each exchange defines its own canonical-string construction, digest and
//! credential encoding:
//!
//! - Binance: HMAC-SHA256 over the url-encoded query string, hex signature
//!   appended as a query parameter, key in `X-MBX-APIKEY`
//! - Kraken: HMAC-SHA512 over `path + SHA256(nonce + postdata)` with a
//!   base64-decoded secret, base64 signature in `API-Sign`
//! - Coinbase: HMAC-SHA256 over `timestamp + method + path + body` with a
//!   base64-decoded secret, base64 signature in `CB-ACCESS-SIGN`
//! - Gemini: HMAC-SHA384 over the base64 JSON payload with the raw UTF-8
//!   secret, hex signature in `X-GEMINI-SIGNATURE`, everything in headers
//!
//! Parameter maps are `serde_json::Map` built with `preserve_order`, so the
//! canonical strings are produced in caller insertion order end-to-end.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::time::{SystemTime, UNIX_EPOCH};

use super::config::{ExchangeConfig, ExchangeType};
use super::errors::ProxyError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;
type HmacSha512 = Hmac<Sha512>;

/// Request parameters in insertion order.
pub type Params = Map<String, Value>;

/// Kraken routes authentication by path prefix.
const KRAKEN_PRIVATE_PREFIX: &str = "/0/private/";

/// A request after signing: headers to attach plus the payload to send.
#[derive(Debug, Default)]
pub struct SignedRequest {
    pub headers: Vec<(String, String)>,
    /// Fully replaces the caller's params when set; `Some(empty)` means
    /// the payload moved into the headers and nothing else may be sent.
    pub params: Option<Params>,
    /// Raw body the signature covered; must be sent verbatim (Coinbase POST).
    pub body: Option<String>,
}

/// Per-exchange signing capability.
///
/// Handlers capture their credentials at construction time and are
/// stateless otherwise. Signing either fully succeeds or fails with
/// `ProxyError::Authentication` before any network activity.
pub trait AuthHandler: Send + Sync + std::fmt::Debug {
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        params: Option<&Params>,
    ) -> Result<SignedRequest, ProxyError>;
}

/// Map an exchange type to its auth handler.
///
/// Total match over `ExchangeType`: an unmapped tag (`Test`) is a
/// configuration error, never a silent default.
pub fn auth_handler_for(config: &ExchangeConfig) -> Result<Box<dyn AuthHandler>, ProxyError> {
    match config.exchange_type {
        ExchangeType::Binance => Ok(Box::new(BinanceAuthHandler::new(config))),
        ExchangeType::Kraken => Ok(Box::new(KrakenAuthHandler::new(config))),
        ExchangeType::Coinbase => Ok(Box::new(CoinbaseAuthHandler::new(config))),
        ExchangeType::Gemini => Ok(Box::new(GeminiAuthHandler::new(config))),
        ExchangeType::Test => Err(ProxyError::Authentication(format!(
            "no auth handler for exchange type: {}",
            config.exchange_type
        ))),
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as u64
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs()
}

/// Render a parameter value the way it appears on the wire.
fn param_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// URL-encode a parameter map in iteration order (`key=value&...`).
pub fn urlencode_params(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding::encode(k),
                urlencoding::encode(&param_str(v))
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Flatten a parameter map into string pairs for query/form transmission.
pub(crate) fn query_pairs(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), param_str(v)))
        .collect()
}

// =================================================================
// Binance
// =================================================================

/// Binance API authentication handler (HMAC-SHA256).
#[derive(Debug)]
pub struct BinanceAuthHandler {
    api_key: String,
    api_secret: String,
}

impl BinanceAuthHandler {
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        }
    }

    /// Add `timestamp`, sign the url-encoded map, append `signature` last.
    fn signed_params(
        &self,
        params: Option<&Params>,
        timestamp_ms: u64,
    ) -> Result<Params, ProxyError> {
        let mut params = params.cloned().unwrap_or_default();
        params.insert("timestamp".to_string(), Value::from(timestamp_ms));

        let query_string = urlencode_params(&params);
        let signature = self.compute_signature(&query_string)?;
        params.insert("signature".to_string(), Value::String(signature));

        Ok(params)
    }

    /// Lowercase hex HMAC-SHA256 of the canonical query string.
    fn compute_signature(&self, data: &str) -> Result<String, ProxyError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes()).map_err(|e| {
            ProxyError::Authentication(format!("failed to generate Binance signature: {}", e))
        })?;
        mac.update(data.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl AuthHandler for BinanceAuthHandler {
    fn sign_request(
        &self,
        _method: &str,
        _endpoint: &str,
        params: Option<&Params>,
    ) -> Result<SignedRequest, ProxyError> {
        let params = self.signed_params(params, epoch_millis())?;

        Ok(SignedRequest {
            headers: vec![
                ("X-MBX-APIKEY".to_string(), self.api_key.clone()),
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
            ],
            params: Some(params),
            body: None,
        })
    }
}

// =================================================================
// Kraken
// =================================================================

/// Kraken API authentication handler (HMAC-SHA512, base64 credentials).
#[derive(Debug)]
pub struct KrakenAuthHandler {
    api_key: String,
    /// Still base64 text; decoded at signing time so a malformed secret
    /// only fails private calls.
    api_secret: String,
}

impl KrakenAuthHandler {
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        }
    }

    /// `base64(HMAC-SHA512(secret, path + SHA256(nonce + postdata)))`
    fn sign_payload(
        &self,
        uri_path: &str,
        post_data: &str,
        nonce: &str,
    ) -> Result<String, ProxyError> {
        let secret = BASE64.decode(&self.api_secret).map_err(|e| {
            ProxyError::Authentication(format!(
                "failed to generate Kraken signature: invalid base64 secret: {}",
                e
            ))
        })?;

        let mut sha256 = Sha256::new();
        sha256.update(nonce.as_bytes());
        sha256.update(post_data.as_bytes());
        let digest = sha256.finalize();

        let mut mac = HmacSha512::new_from_slice(&secret).map_err(|e| {
            ProxyError::Authentication(format!("failed to generate Kraken signature: {}", e))
        })?;
        mac.update(uri_path.as_bytes());
        mac.update(&digest);

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

impl AuthHandler for KrakenAuthHandler {
    fn sign_request(
        &self,
        _method: &str,
        endpoint: &str,
        params: Option<&Params>,
    ) -> Result<SignedRequest, ProxyError> {
        let mut params = params.cloned().unwrap_or_default();
        let nonce = epoch_millis().to_string();
        params.insert("nonce".to_string(), Value::String(nonce.clone()));

        // Public endpoints carry the nonce but no auth headers.
        let headers = if endpoint.starts_with(KRAKEN_PRIVATE_PREFIX) {
            let post_data = urlencode_params(&params);
            let signature = self.sign_payload(endpoint, &post_data, &nonce)?;
            vec![
                ("API-Key".to_string(), self.api_key.clone()),
                ("API-Sign".to_string(), signature),
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
            ]
        } else {
            vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )]
        };

        Ok(SignedRequest {
            headers,
            params: Some(params),
            body: None,
        })
    }
}

// =================================================================
// Coinbase
// =================================================================

/// Coinbase API authentication handler (HMAC-SHA256 over
/// `timestamp + method + path + body`, passphrase header).
#[derive(Debug)]
pub struct CoinbaseAuthHandler {
    api_key: String,
    api_secret: String,
    passphrase: String,
}

impl CoinbaseAuthHandler {
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            passphrase: config.passphrase().unwrap_or_default().to_string(),
        }
    }

    fn sign_payload(
        &self,
        timestamp: &str,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> Result<String, ProxyError> {
        let key = BASE64.decode(&self.api_secret).map_err(|e| {
            ProxyError::Authentication(format!(
                "failed to generate Coinbase signature: invalid base64 secret: {}",
                e
            ))
        })?;

        let mut mac = HmacSha256::new_from_slice(&key).map_err(|e| {
            ProxyError::Authentication(format!("failed to generate Coinbase signature: {}", e))
        })?;
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(request_path.as_bytes());
        mac.update(body.as_bytes());

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

impl AuthHandler for CoinbaseAuthHandler {
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        params: Option<&Params>,
    ) -> Result<SignedRequest, ProxyError> {
        let timestamp = epoch_secs().to_string();

        // POST params move into the JSON body; GET params pass through as
        // query parameters, unchanged.
        let mut body = String::new();
        let mut outgoing = params.cloned();
        if method == "POST" {
            if let Some(p) = params.filter(|p| !p.is_empty()) {
                body = serde_json::to_string(p).map_err(|e| {
                    ProxyError::Authentication(format!(
                        "failed to generate Coinbase signature: {}",
                        e
                    ))
                })?;
                outgoing = None;
            }
        }

        let signature = self.sign_payload(&timestamp, method, endpoint, &body)?;

        Ok(SignedRequest {
            headers: vec![
                ("CB-ACCESS-KEY".to_string(), self.api_key.clone()),
                ("CB-ACCESS-SIGN".to_string(), signature),
                ("CB-ACCESS-TIMESTAMP".to_string(), timestamp),
                ("CB-ACCESS-PASSPHRASE".to_string(), self.passphrase.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            params: outgoing,
            body: if body.is_empty() { None } else { Some(body) },
        })
    }
}

// =================================================================
// Gemini
// =================================================================

/// Gemini API authentication handler (HMAC-SHA384 over a base64 JSON
/// payload; the secret is used as raw UTF-8, not base64-decoded).
#[derive(Debug)]
pub struct GeminiAuthHandler {
    api_key: String,
    api_secret: String,
}

impl GeminiAuthHandler {
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        }
    }

    /// Base64 of the JSON payload: original params + nonce + request path.
    fn encode_payload(
        params: Option<&Params>,
        endpoint: &str,
        nonce: &str,
    ) -> Result<String, ProxyError> {
        let mut payload = params.cloned().unwrap_or_default();
        payload.insert("nonce".to_string(), Value::String(nonce.to_string()));
        payload.insert("request".to_string(), Value::String(endpoint.to_string()));

        let json = serde_json::to_string(&payload).map_err(|e| {
            ProxyError::Authentication(format!("failed to generate Gemini signature: {}", e))
        })?;
        Ok(BASE64.encode(json))
    }

    /// Lowercase hex HMAC-SHA384 of the base64 payload.
    fn sign_payload(&self, payload_b64: &str) -> Result<String, ProxyError> {
        let mut mac = HmacSha384::new_from_slice(self.api_secret.as_bytes()).map_err(|e| {
            ProxyError::Authentication(format!("failed to generate Gemini signature: {}", e))
        })?;
        mac.update(payload_b64.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl AuthHandler for GeminiAuthHandler {
    fn sign_request(
        &self,
        _method: &str,
        endpoint: &str,
        params: Option<&Params>,
    ) -> Result<SignedRequest, ProxyError> {
        let nonce = epoch_millis().to_string();
        let payload_b64 = Self::encode_payload(params, endpoint, &nonce)?;
        let signature = self.sign_payload(&payload_b64)?;

        Ok(SignedRequest {
            headers: vec![
                ("X-GEMINI-APIKEY".to_string(), self.api_key.clone()),
                ("X-GEMINI-PAYLOAD".to_string(), payload_b64),
                ("X-GEMINI-SIGNATURE".to_string(), signature),
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("Content-Length".to_string(), "0".to_string()),
                ("Cache-Control".to_string(), "no-cache".to_string()),
            ],
            // All state travels in the headers; the caller must send no body.
            params: Some(Params::new()),
            body: None,
        })
    }
}
