// =================================================================
// proxy/client.rs - API Proxy Core
// =================================================================

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::auth::{auth_handler_for, query_pairs, AuthHandler, Params};
use super::config::ExchangeConfig;
use super::errors::ProxyError;

/// Minimum interval between outbound requests on one proxy instance.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);
/// Per-call transport timeout unless the caller overrides it.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Retry-After fallback when a 429 omits the header.
const DEFAULT_RETRY_AFTER_SECS: &str = "60";

/// Centralized API proxy for crypto exchanges.
///
/// Owns one exchange configuration, the matching auth handler, and a
/// reusable HTTP client (connection pooling is reqwest's concern). The
/// rate gate is the only mutable state; the mutex is held across its sleep
/// so concurrent callers on a shared instance stay serialized at least
/// `min_request_interval` apart.
#[derive(Debug)]
pub struct ApiProxy {
    config: ExchangeConfig,
    auth_handler: Box<dyn AuthHandler>,
    client: Client,
    last_request: Mutex<Option<Instant>>,
    min_request_interval: Duration,
}

impl ApiProxy {
    /// Create a proxy for the given exchange configuration.
    ///
    /// Fails with `ProxyError::Authentication` when no auth handler is
    /// mapped for the configured exchange type.
    pub fn new(config: ExchangeConfig) -> Result<Self, ProxyError> {
        let auth_handler = auth_handler_for(&config)?;
        Ok(Self {
            config,
            auth_handler,
            client: Client::new(),
            last_request: Mutex::new(None),
            min_request_interval: MIN_REQUEST_INTERVAL,
        })
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn min_request_interval(&self) -> Duration {
        self.min_request_interval
    }

    /// Make an authenticated or public API request.
    ///
    /// `params` is the query string for GET or the form body for POST;
    /// `json_body` takes precedence over `params` on the wire for POST.
    /// Returns the parsed JSON payload or a classified `ProxyError`.
    pub async fn make_request(
        &self,
        method: &str,
        endpoint: &str,
        params: Option<Params>,
        json_body: Option<Value>,
        auth_required: bool,
        timeout: Option<Duration>,
    ) -> Result<Value, ProxyError> {
        let method = method.to_uppercase();
        let is_get = match method.as_str() {
            "GET" => true,
            "POST" => false,
            other => {
                return Err(ProxyError::Api(format!(
                    "unsupported HTTP method: {}",
                    other
                )))
            }
        };

        self.enforce_rate_limit().await;

        let url = format!("{}{}", self.config.api_url, endpoint);

        // Signing fully replaces the caller's params; a returned body is
        // the exact byte sequence the signature covered.
        let mut headers = Vec::new();
        let mut params = params;
        let mut signed_body = None;
        if auth_required {
            let signed = self
                .auth_handler
                .sign_request(&method, endpoint, params.as_ref())?;
            headers = signed.headers;
            params = signed.params;
            signed_body = signed.body;
        }

        debug!("making {} request to {}", method, url);

        let mut request = if is_get {
            let mut request = self.client.get(&url);
            if let Some(p) = params.as_ref().filter(|p| !p.is_empty()) {
                request = request.query(&query_pairs(p));
            }
            request
        } else {
            let mut request = self.client.post(&url);
            if let Some(json) = json_body {
                request = request.json(&json);
            } else if let Some(body) = signed_body {
                request = request.body(body);
            } else if let Some(p) = params.as_ref().filter(|p| !p.is_empty()) {
                request = request.form(&query_pairs(p));
            }
            request
        };
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::Api(format!("unexpected error in API request: {}", e)))?;

        classify_response(status, retry_after.as_deref(), &body)
    }

    /// Make a public (non-authenticated) API request.
    pub async fn make_public_request(
        &self,
        method: &str,
        endpoint: &str,
        params: Option<Params>,
        timeout: Option<Duration>,
    ) -> Result<Value, ProxyError> {
        self.make_request(method, endpoint, params, None, false, timeout)
            .await
    }

    /// Release the underlying HTTP transport.
    ///
    /// Consumes the proxy, so a second close or a use-after-close is a
    /// compile error rather than a runtime fault.
    pub fn close(self) {
        debug!("closing API proxy for {}", self.config.exchange_type);
    }

    /// Block until at least `min_request_interval` has passed since the
    /// previous request, then stamp the gate.
    async fn enforce_rate_limit(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.min_request_interval {
                tokio::time::sleep(self.min_request_interval - elapsed).await;
            }
        }
        *last_request = Some(Instant::now());
    }

    fn transport_error(&self, err: reqwest::Error) -> ProxyError {
        if err.is_timeout() {
            ProxyError::Connection(format!(
                "request timeout to {}",
                self.config.exchange_type
            ))
        } else if err.is_connect() {
            ProxyError::Connection(format!(
                "connection error to {}",
                self.config.exchange_type
            ))
        } else {
            ProxyError::Api(format!("unexpected error in API request: {}", err))
        }
    }
}

/// Classify an HTTP response into a parsed payload or a typed error.
///
/// Pure function of status code, Retry-After header, and body; no side
/// effects, independently testable.
pub fn classify_response(
    status: StatusCode,
    retry_after: Option<&str>,
    body: &str,
) -> Result<Value, ProxyError> {
    match status.as_u16() {
        429 => Err(ProxyError::RateLimit(
            retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS).to_string(),
        )),
        200 => Ok(serde_json::from_str(body)?),
        401 => Err(ProxyError::Authentication(
            "invalid API credentials".to_string(),
        )),
        403 => Err(ProxyError::Authentication(
            "API access forbidden".to_string(),
        )),
        404 => Err(ProxyError::Api("API endpoint not found".to_string())),
        code if code >= 500 => Err(ProxyError::Connection(format!(
            "exchange server error: {}",
            code
        ))),
        code => {
            // Surface the exchange's own message when the body carries one.
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| {
                    v.get("msg")
                        .or_else(|| v.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                })
                .unwrap_or_else(|| format!("HTTP {}", code));
            Err(ProxyError::Api(format!("API request failed: {}", message)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::config::ExchangeType;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn proxy_for(server: &MockServer) -> ApiProxy {
        let config = ExchangeConfig::new(
            ExchangeType::Binance,
            server.uri(),
            "test_key",
            "test_secret",
        );
        ApiProxy::new(config).unwrap()
    }

    fn params_from(pairs: &[(&str, &str)]) -> Params {
        let mut params = Params::new();
        for (k, v) in pairs {
            params.insert(k.to_string(), Value::String(v.to_string()));
        }
        params
    }

    // ---- classification (pure) ----

    #[test]
    fn test_classify_ok_parses_json() {
        let value = classify_response(StatusCode::OK, None, r#"{"result": "success"}"#).unwrap();
        assert_eq!(value["result"], "success");
    }

    #[test]
    fn test_classify_ok_invalid_json() {
        let err = classify_response(StatusCode::OK, None, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, ProxyError::InvalidResponse(_)));
        assert!(err.to_string().contains("invalid JSON in response"));
    }

    #[test]
    fn test_classify_rate_limit_uses_retry_after() {
        let err =
            classify_response(StatusCode::TOO_MANY_REQUESTS, Some("30"), "").unwrap_err();
        assert!(matches!(err, ProxyError::RateLimit(_)));
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_classify_rate_limit_default_hint() {
        let err = classify_response(StatusCode::TOO_MANY_REQUESTS, None, "").unwrap_err();
        assert_eq!(err.retry_after_secs(), Some(60));
    }

    #[test]
    fn test_classify_auth_errors() {
        let err = classify_response(StatusCode::UNAUTHORIZED, None, "").unwrap_err();
        assert!(matches!(err, ProxyError::Authentication(_)));
        assert!(err.to_string().contains("invalid API credentials"));

        let err = classify_response(StatusCode::FORBIDDEN, None, "").unwrap_err();
        assert!(err.to_string().contains("API access forbidden"));
    }

    #[test]
    fn test_classify_not_found() {
        let err = classify_response(StatusCode::NOT_FOUND, None, "").unwrap_err();
        assert!(matches!(err, ProxyError::Api(_)));
        assert!(err.to_string().contains("API endpoint not found"));
    }

    #[test]
    fn test_classify_server_errors() {
        for code in [500u16, 502, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = classify_response(status, None, "").unwrap_err();
            assert!(matches!(err, ProxyError::Connection(_)));
            assert!(err.to_string().contains(&code.to_string()));
        }
    }

    #[test]
    fn test_classify_unclassified_code_prefers_body_message() {
        let err =
            classify_response(StatusCode::BAD_REQUEST, None, r#"{"msg": "Invalid symbol"}"#)
                .unwrap_err();
        assert!(err.to_string().contains("Invalid symbol"));

        let err =
            classify_response(StatusCode::BAD_REQUEST, None, r#"{"error": "bad nonce"}"#)
                .unwrap_err();
        assert!(err.to_string().contains("bad nonce"));

        // Unparsable or message-less bodies fall back to the status code.
        let err = classify_response(StatusCode::BAD_REQUEST, None, "not json").unwrap_err();
        assert!(err.to_string().contains("HTTP 400"));
    }

    // ---- transport behavior (mocked server) ----

    #[tokio::test]
    async fn test_public_request_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let value = proxy
            .make_public_request("GET", "/api/v3/ping", None, None)
            .await
            .unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn test_get_sends_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .and(query_param("symbol", "BTCUSD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"price": "50000.00"})))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let value = proxy
            .make_public_request(
                "GET",
                "/api/v3/ticker/price",
                Some(params_from(&[("symbol", "BTCUSD")])),
                None,
            )
            .await
            .unwrap();
        assert_eq!(value["price"], "50000.00");
    }

    #[tokio::test]
    async fn test_authenticated_request_carries_signed_query_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/account"))
            .and(header("X-MBX-APIKEY", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"account": "data"})))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let value = proxy
            .make_request("GET", "/api/v3/account", None, None, true, None)
            .await
            .unwrap();
        assert_eq!(value["account"], "data");

        let requests = server.received_requests().await.unwrap();
        let query = requests[0].url.query().unwrap_or_default();
        assert!(query.contains("timestamp="));
        assert!(query.contains("signature="));
    }

    #[tokio::test]
    async fn test_post_json_body_passthrough() {
        let server = MockServer::start().await;
        let order = json!({"symbol": "BTCUSD", "side": "BUY"});
        Mock::given(method("POST"))
            .and(path("/api/v3/order"))
            .and(body_json(order.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order": "created"})))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let value = proxy
            .make_request("POST", "/api/v3/order", None, Some(order), false, None)
            .await
            .unwrap();
        assert_eq!(value["order"], "created");
    }

    #[tokio::test]
    async fn test_post_form_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/order/test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        proxy
            .make_request(
                "POST",
                "/api/v3/order/test",
                Some(params_from(&[("symbol", "BTCUSD"), ("side", "BUY")])),
                None,
                false,
                None,
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        assert!(body.contains("symbol=BTCUSD"));
        assert!(body.contains("side=BUY"));
    }

    #[tokio::test]
    async fn test_unsupported_method_makes_no_network_call() {
        let server = MockServer::start().await;
        let proxy = proxy_for(&server);

        let err = proxy
            .make_request("DELETE", "/api/v3/order", None, None, true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Api(_)));
        assert!(err.to_string().contains("DELETE"));

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_response_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ping"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let err = proxy
            .make_public_request("GET", "/api/v3/ping", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::RateLimit(_)));
        assert!(err.to_string().contains("30"));
    }

    #[tokio::test]
    async fn test_unauthorized_response_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/account"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let err = proxy
            .make_request("GET", "/api/v3/account", None, None, true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_server_error_response_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let err = proxy
            .make_public_request("GET", "/api/v3/ping", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Connection(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_invalid_json_response_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>down</html>"))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let err = proxy
            .make_public_request("GET", "/api/v3/ping", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_connection_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ping"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let err = proxy
            .make_public_request(
                "GET",
                "/api/v3/ping",
                None,
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Connection(_)));
        assert!(err.to_string().contains("request timeout to binance"));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_connection_error() {
        // Grab a port nothing is listening on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ExchangeConfig::new(
            ExchangeType::Binance,
            format!("http://127.0.0.1:{}", port),
            "test_key",
            "test_secret",
        );
        let proxy = ApiProxy::new(config).unwrap();

        let err = proxy
            .make_public_request("GET", "/api/v3/ping", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Connection(_)));
        assert!(err.to_string().contains("connection error to binance"));
    }

    #[tokio::test]
    async fn test_rate_gate_spaces_consecutive_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server);
        let started = Instant::now();
        proxy
            .make_public_request("GET", "/api/v3/ping", None, None)
            .await
            .unwrap();
        proxy
            .make_public_request("GET", "/api/v3/ping", None, None)
            .await
            .unwrap();

        assert!(started.elapsed() >= proxy.min_request_interval());
    }

    #[tokio::test]
    async fn test_proxy_rejects_unmapped_exchange_type() {
        let err = ApiProxy::new(ExchangeConfig::test()).unwrap_err();
        assert!(matches!(err, ProxyError::Authentication(_)));
        assert!(err.to_string().contains("test"));
    }
}
