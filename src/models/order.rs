use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::sign::QueryParams;

pub const ORDER_ENDPOINT: &str = "/fapi/v1/order";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(ValidationError::InvalidSide(format!(
                "'{}' must be 'BUY' or 'SELL'",
                s
            ))),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order kinds accepted by the core. Each kind carries the endpoint it is
/// routed to and the fields it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            OrderType::Market | OrderType::Limit => ORDER_ENDPOINT,
        }
    }

    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit)
    }

    pub fn uses_time_in_force(&self) -> bool {
        matches!(self, OrderType::Limit)
    }
}

impl FromStr for OrderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MARKET" => Ok(OrderType::Market),
            "LIMIT" => Ok(OrderType::Limit),
            _ => Err(ValidationError::InvalidOrderType(format!(
                "'{}' must be 'MARKET' or 'LIMIT'",
                s
            ))),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    #[default]
    Gtc,
    Ioc,
    Fok,
    Gtx,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
            TimeInForce::Gtx => "GTX",
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact decimal text sent to the exchange, without trailing zeros.
pub fn wire_decimal(value: &Decimal) -> String {
    value.normalize().to_string()
}

/// Builds the unsigned wire parameters for an order in their signing order:
/// `symbol, side, type, quantity[, price, timeInForce]`.
///
/// Price and time in force are only emitted for LIMIT orders. A LIMIT order
/// without a positive price is refused here, before anything is signed.
pub fn order_params(
    symbol: &str,
    side: Side,
    order_type: OrderType,
    quantity: Decimal,
    price: Option<Decimal>,
    time_in_force: Option<TimeInForce>,
) -> Result<QueryParams, ValidationError> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::InvalidQuantity(format!(
            "refusing to place order of size {} for {}",
            quantity, symbol
        )));
    }

    let mut params = QueryParams::new();
    params.push("symbol", symbol);
    params.push("side", side.as_str());
    params.push("type", order_type.as_str());
    params.push("quantity", wire_decimal(&quantity));

    if order_type.requires_price() {
        let price = price.ok_or_else(|| {
            ValidationError::MissingPrice(format!(
                "Price is required for {} orders",
                order_type
            ))
        })?;
        if price <= Decimal::ZERO {
            return Err(ValidationError::InvalidPrice(format!(
                "'{}' must be greater than 0",
                price
            )));
        }
        params.push("price", wire_decimal(&price));
    }
    if order_type.uses_time_in_force() {
        params.push("timeInForce", time_in_force.unwrap_or_default().as_str());
    }

    Ok(params)
}

/// A validated order. Only the validator constructs these, so the
/// price/time-in-force invariants always hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    symbol: String,
    side: Side,
    order_type: OrderType,
    quantity: Decimal,
    price: Option<Decimal>,
    time_in_force: Option<TimeInForce>,
}

impl OrderRequest {
    pub(crate) fn new(
        symbol: String,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        price: Option<Decimal>,
    ) -> Self {
        let (price, time_in_force) = match order_type {
            OrderType::Limit => (price, Some(TimeInForce::Gtc)),
            OrderType::Market => (None, None),
        };

        Self {
            symbol,
            side,
            order_type,
            quantity,
            price,
            time_in_force,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn price(&self) -> Option<Decimal> {
        self.price
    }

    pub fn time_in_force(&self) -> Option<TimeInForce> {
        self.time_in_force
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Symbol:        {}", self.symbol)?;
        writeln!(f, "Side:          {}", self.side)?;
        writeln!(f, "Type:          {}", self.order_type)?;
        write!(f, "Quantity:      {}", wire_decimal(&self.quantity))?;
        if let Some(price) = &self.price {
            write!(f, "\nPrice:         {}", wire_decimal(price))?;
        }
        if let Some(tif) = &self.time_in_force {
            write!(f, "\nTime in Force: {}", tif)?;
        }
        Ok(())
    }
}

fn zero_qty() -> String {
    "0".to_string()
}

/// A successfully placed order as reported by the exchange. Quantities and
/// prices keep the exchange's own formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(rename = "orderId", default)]
    pub order_id: i64,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub side: String,
    #[serde(rename = "type", default)]
    pub order_type: String,
    #[serde(rename = "origQty", default = "zero_qty")]
    pub quantity: String,
    #[serde(rename = "executedQty", default = "zero_qty")]
    pub executed_qty: String,
    #[serde(rename = "avgPrice", default, skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

impl OrderResponse {
    pub fn from_api_response(data: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(data)
    }
}

impl fmt::Display for OrderResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Order ID: {}", self.order_id)?;
        writeln!(f, "Symbol: {}", self.symbol)?;
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Side: {}", self.side)?;
        writeln!(f, "Type: {}", self.order_type)?;
        writeln!(f, "Quantity: {}", self.quantity)?;
        write!(f, "Executed Qty: {}", self.executed_qty)?;

        match (self.avg_price.as_deref(), self.price.as_deref()) {
            (Some(avg), _) if !avg.is_empty() => write!(f, "\nAverage Price: {}", avg),
            (_, Some(price)) if !price.is_empty() => write!(f, "\nPrice: {}", price),
            _ => Ok(()),
        }
    }
}

fn unknown_code() -> i64 {
    -1
}

fn unknown_msg() -> String {
    "Unknown error".to_string()
}

/// Error payload returned by the exchange on a non-200 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default = "unknown_code")]
    pub code: i64,
    #[serde(default = "unknown_msg")]
    pub msg: String,
}

impl ApiError {
    pub fn new(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    /// Reads `{code, msg}` from an error body, falling back to `-1` and
    /// "Unknown error" for missing or mistyped fields.
    pub fn from_api_response(data: &Value) -> Self {
        Self {
            code: data.get("code").and_then(Value::as_i64).unwrap_or(-1),
            msg: data
                .get("msg")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(unknown_msg),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.code, self.msg)
    }
}
