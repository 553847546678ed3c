use thiserror::Error;

use crate::models::order::ApiError;

/// Rejection of a single order field. Raised before anything is signed or sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid side: {0}")]
    InvalidSide(String),

    #[error("Invalid order type: {0}")]
    InvalidOrderType(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Missing price: {0}")]
    MissingPrice(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),
}

impl ValidationError {
    /// Wire name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidSymbol(_) => "symbol",
            ValidationError::InvalidSide(_) => "side",
            ValidationError::InvalidOrderType(_) => "type",
            ValidationError::InvalidQuantity(_) => "quantity",
            ValidationError::MissingPrice(_) | ValidationError::InvalidPrice(_) => "price",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ValidationError::InvalidSymbol(reason)
            | ValidationError::InvalidSide(reason)
            | ValidationError::InvalidOrderType(reason)
            | ValidationError::InvalidQuantity(reason)
            | ValidationError::MissingPrice(reason)
            | ValidationError::InvalidPrice(reason) => reason,
        }
    }
}

/// Where a transport failure happened relative to the request leaving the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkPhase {
    /// Nothing reached the exchange: DNS, connect refused, malformed URL.
    PreSend,
    /// The request may have reached the exchange before the failure.
    InFlight,
}

impl NetworkPhase {
    pub fn of(err: &reqwest::Error) -> Self {
        if err.is_builder() || err.is_connect() {
            NetworkPhase::PreSend
        } else {
            NetworkPhase::InFlight
        }
    }
}

#[derive(Error, Debug)]
#[error("{message}")]
pub struct NetworkError {
    pub phase: NetworkPhase,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl NetworkError {
    pub fn new(phase: NetworkPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase == NetworkPhase::InFlight
    }
}

/// Whether a failed placement left the order in a known state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStatus {
    /// The order definitely did not reach the book.
    NotPlaced,
    /// The request may have been accepted; check the exchange before retrying.
    Unknown,
}

/// Every way the exchange client can fail.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("{0}")]
    Client(ApiError),
}

impl ExchangeError {
    pub fn placement_status(&self) -> PlacementStatus {
        match self {
            ExchangeError::Network(err) if err.is_in_flight() => PlacementStatus::Unknown,
            _ => PlacementStatus::NotPlaced,
        }
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ExchangeError::Client(api) => Some(api),
            _ => None,
        }
    }
}

impl From<ApiError> for ExchangeError {
    fn from(err: ApiError) -> Self {
        ExchangeError::Client(err)
    }
}

/// The single failure kind surfaced by the order service.
#[derive(Error, Debug)]
#[error("Order placement failed: {cause}")]
pub struct OrderError {
    #[source]
    pub cause: ExchangeError,
}

impl OrderError {
    pub fn placement_status(&self) -> PlacementStatus {
        self.cause.placement_status()
    }
}

impl From<ExchangeError> for OrderError {
    fn from(cause: ExchangeError) -> Self {
        OrderError { cause }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to build HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Renders failures as the one-line classified messages shown to users.
pub struct ErrorHandler;

impl ErrorHandler {
    pub fn render_exchange(error: &ExchangeError) -> String {
        match error {
            ExchangeError::Validation(err) => format!("Validation Error: {}", err),
            ExchangeError::Network(err) => format!("Network Error: {}", err),
            ExchangeError::Client(err) => format!("API Error: {} {}", err.code, err.msg),
        }
    }

    pub fn render_validation(error: &ValidationError) -> String {
        format!("Validation Error: {}", error)
    }

    pub fn render_order(error: &OrderError) -> String {
        let line = format!("Order Error: {}", Self::render_exchange(&error.cause));
        tracing::error!("{}", line);
        line
    }
}
