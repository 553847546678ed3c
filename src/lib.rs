//! Signed-request client for the Binance USDT-M futures REST API.
//!
//! Raw order fields go through the [`validator`], are signed by [`sign`],
//! sent by the [`rest_client`] and come back as typed results or classified
//! errors. [`execution::OrderService`] ties these together.

pub mod audit;
pub mod config;
pub mod error;
pub mod execution;
pub mod models;
pub mod rest_client;
pub mod sign;
pub mod validator;

pub use audit::{AuditEntry, AuditSink, MemoryAuditSink, NullAuditSink, TracingAuditSink};
pub use config::{ClientConfig, Credentials};
pub use error::{
    ErrorHandler, ExchangeError, NetworkError, NetworkPhase, OrderError, PlacementStatus,
    ValidationError,
};
pub use execution::{OrderService, Submission};
pub use models::order::{ApiError, OrderRequest, OrderResponse, OrderType, Side, TimeInForce};
pub use rest_client::{BinanceClient, RestClient};
pub use sign::{QueryParams, SignedParameters, Signer};
pub use validator::Validator;
