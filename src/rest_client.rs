use std::fmt;
use std::sync::Arc;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::audit::{AuditEntry, AuditSink, TracingAuditSink};
use crate::config::{ClientConfig, Credentials};
use crate::error::{ConfigError, ExchangeError, NetworkError, NetworkPhase};
use crate::models::order::{
    order_params, ApiError, OrderRequest, OrderResponse, OrderType, Side, TimeInForce,
};
use crate::sign::{QueryParams, Signer};

// Header names must be lowercase for `HeaderName::from_static`.
pub const API_KEY_HEADER: &str = "x-mbx-apikey";
pub const TIME_ENDPOINT: &str = "/fapi/v1/time";

/// Order submission seam between the order service and the exchange.
pub trait RestClient {
    fn submit_order(&self, request: &OrderRequest) -> Result<OrderResponse, ExchangeError>;
}

#[derive(Debug, Deserialize)]
struct ServerTime {
    #[serde(rename = "serverTime")]
    server_time: i64,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Connectivity,
    PlaceOrder,
}

impl Operation {
    fn network_error(self, err: reqwest::Error) -> NetworkError {
        // The URL carries the signed query string.
        let err = err.without_url();
        let phase = NetworkPhase::of(&err);
        let message = match (self, phase) {
            (_, NetworkPhase::PreSend) if err.is_timeout() => {
                "Connection timeout. Please check your internet connection."
            }
            (_, NetworkPhase::PreSend) => "Network error. Please check your connection.",
            (Operation::PlaceOrder, NetworkPhase::InFlight) if err.is_timeout() => {
                "Request timeout. The order may or may not have been placed."
            }
            (Operation::PlaceOrder, NetworkPhase::InFlight) => {
                "Connection lost after the request was sent. The order may or may not have been placed."
            }
            (Operation::Connectivity, NetworkPhase::InFlight) if err.is_timeout() => {
                "Connection timeout. Please check your internet connection."
            }
            (Operation::Connectivity, NetworkPhase::InFlight) => {
                "Network error. Please check your internet connection."
            }
        };
        NetworkError::new(phase, message).with_cause(err)
    }
}

/// Blocking client for the USDT-M futures REST API.
///
/// Owns one HTTP connection pool for its lifetime; it is released by
/// [`BinanceClient::close`] or when the client is dropped.
pub struct BinanceClient {
    http: Client,
    base_url: String,
    signer: Signer,
    audit: Arc<dyn AuditSink>,
    max_logged_body: usize,
}

impl BinanceClient {
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self, ConfigError> {
        Self::with_audit_sink(credentials, config, Arc::new(TracingAuditSink))
    }

    pub fn with_audit_sink(
        credentials: Credentials,
        config: ClientConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        credentials.validate()?;
        config.validate()?;

        let mut api_key = HeaderValue::from_str(&credentials.api_key).map_err(|_| {
            ConfigError::Invalid("API key is not a valid header value".to_string())
        })?;
        api_key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);

        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!("Exchange client ready for {}", base_url);

        Ok(Self {
            http,
            base_url,
            signer: Signer::new(credentials.api_secret, config.recv_window),
            audit,
            max_logged_body: config.max_logged_body,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Reads the exchange clock. Unauthenticated.
    pub fn server_time(&self) -> Result<i64, ExchangeError> {
        let path = TIME_ENDPOINT;
        info!("Testing connectivity: GET {}", path);

        let url = self.url(path, None)?;
        self.audit
            .record(&AuditEntry::request("GET", path, &QueryParams::new()));
        let (status, body) =
            self.round_trip(self.http.get(url), "GET", path, Operation::Connectivity)?;
        info!("Connectivity test response: status={}", status.as_u16());

        if status != StatusCode::OK {
            return Err(NetworkError::new(
                NetworkPhase::InFlight,
                format!("Connectivity test failed: HTTP {}", status.as_u16()),
            )
            .into());
        }

        let time: ServerTime = serde_json::from_str(&body).map_err(|e| {
            NetworkError::new(
                NetworkPhase::InFlight,
                format!("Connectivity test failed: unreadable server time: {}", e),
            )
            .with_cause(e)
        })?;
        info!("Server time: {}", time.server_time);
        Ok(time.server_time)
    }

    /// `true` when `GET /fapi/v1/time` answers 200 with a readable body.
    pub fn test_connectivity(&self) -> Result<bool, ExchangeError> {
        self.server_time().map(|_| true)
    }

    /// Signs and submits one order. Never retries.
    ///
    /// A rejection from the exchange comes back as [`ExchangeError::Client`].
    /// A failure after the request left the process is reported as an
    /// in-flight [`NetworkError`]: the order may exist on the exchange.
    pub fn place_order(
        &self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        price: Option<Decimal>,
        time_in_force: Option<TimeInForce>,
    ) -> Result<OrderResponse, ExchangeError> {
        let path = order_type.endpoint();
        let params = order_params(symbol, side, order_type, quantity, price, time_in_force)?;
        let signed = self.signer.sign_params(params);

        info!("Placing order: POST {}", path);
        debug!("Request params: {:?}", signed.redacted());
        self.audit
            .record(&AuditEntry::request("POST", path, signed.params()));

        let url = self.url(path, Some(&signed.to_query_string()))?;
        let (status, body) =
            self.round_trip(self.http.post(url), "POST", path, Operation::PlaceOrder)?;
        info!("Order response: status={}", status.as_u16());

        let data: Value = serde_json::from_str(&body).map_err(|e| {
            NetworkError::new(
                NetworkPhase::InFlight,
                format!(
                    "Unexpected response (HTTP {}). The order may or may not have been placed.",
                    status.as_u16()
                ),
            )
            .with_cause(e)
        })?;

        if status != StatusCode::OK {
            let api_error = ApiError::from_api_response(&data);
            error!("API error: {}", api_error);
            return Err(ExchangeError::Client(api_error));
        }

        let response = OrderResponse::from_api_response(data).map_err(|e| {
            NetworkError::new(
                NetworkPhase::InFlight,
                "Unexpected order payload. The order may or may not have been placed.",
            )
            .with_cause(e)
        })?;
        info!("Order placed successfully: {}", response.order_id);
        Ok(response)
    }

    /// Releases the connection pool.
    pub fn close(self) {
        debug!("Closing exchange client for {}", self.base_url);
    }

    fn url(&self, path: &str, query: Option<&str>) -> Result<Url, NetworkError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path)).map_err(|e| {
            NetworkError::new(NetworkPhase::PreSend, format!("Invalid request URL: {}", e))
                .with_cause(e)
        })?;
        url.set_query(query);
        Ok(url)
    }

    fn round_trip(
        &self,
        request: RequestBuilder,
        method: &str,
        path: &str,
        operation: Operation,
    ) -> Result<(StatusCode, String), NetworkError> {
        let response = request.send().map_err(|e| self.transport_failure(e, method, path, operation))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| self.transport_failure(e, method, path, operation))?;

        self.audit.record(&AuditEntry::response(
            method,
            path,
            status.as_u16(),
            &body,
            self.max_logged_body,
        ));
        Ok((status, body))
    }

    fn transport_failure(
        &self,
        err: reqwest::Error,
        method: &str,
        path: &str,
        operation: Operation,
    ) -> NetworkError {
        let err = operation.network_error(err);
        error!("{} {} failed ({:?}): {}", method, path, err.phase, err);
        self.audit
            .record(&AuditEntry::failure(method, path, &err.to_string()));
        err
    }
}

impl RestClient for BinanceClient {
    fn submit_order(&self, request: &OrderRequest) -> Result<OrderResponse, ExchangeError> {
        self.place_order(
            request.symbol(),
            request.side(),
            request.order_type(),
            request.quantity(),
            request.price(),
            request.time_in_force(),
        )
    }
}

impl fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}
