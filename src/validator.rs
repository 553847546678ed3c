use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::models::order::{OrderRequest, OrderType, Side};

pub const DEFAULT_QUOTE_ASSET: &str = "USDT";

/// Normalizes raw order fields and rejects anything the exchange would refuse.
///
/// Fields are checked in a fixed order (symbol, side, type, quantity, price)
/// and the first failure is returned.
#[derive(Debug, Clone)]
pub struct Validator {
    quote_asset: String,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_ASSET)
    }
}

impl Validator {
    pub fn new(quote_asset: impl Into<String>) -> Self {
        Self {
            quote_asset: quote_asset.into().trim().to_uppercase(),
        }
    }

    pub fn quote_asset(&self) -> &str {
        &self.quote_asset
    }

    pub fn validate(
        &self,
        symbol: &str,
        side: &str,
        order_type: &str,
        quantity: &str,
        price: Option<&str>,
    ) -> Result<OrderRequest, ValidationError> {
        let symbol = self.validate_symbol(symbol)?;
        let side = validate_side(side)?;
        let order_type = validate_order_type(order_type)?;
        let quantity = validate_quantity(quantity)?;
        let price = validate_price(price, order_type)?;

        Ok(OrderRequest::new(symbol, side, order_type, quantity, price))
    }

    pub fn validate_symbol(&self, symbol: &str) -> Result<String, ValidationError> {
        if symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol(
                "Symbol cannot be empty".to_string(),
            ));
        }

        let symbol = symbol.trim().to_uppercase();
        match symbol.strip_suffix(self.quote_asset.as_str()) {
            Some(base) if !base.is_empty() => Ok(symbol),
            _ => Err(ValidationError::InvalidSymbol(format!(
                "'{}' must end with '{}' for {}-M futures",
                symbol, self.quote_asset, self.quote_asset
            ))),
        }
    }
}

pub fn validate_side(side: &str) -> Result<Side, ValidationError> {
    Side::from_str(side)
}

pub fn validate_order_type(order_type: &str) -> Result<OrderType, ValidationError> {
    OrderType::from_str(order_type)
}

pub fn validate_quantity(quantity: &str) -> Result<Decimal, ValidationError> {
    let qty = parse_decimal(quantity).ok_or_else(|| {
        ValidationError::InvalidQuantity(format!("'{}' must be a valid number", quantity))
    })?;

    if qty <= Decimal::ZERO {
        return Err(ValidationError::InvalidQuantity(format!(
            "'{}' must be greater than 0",
            quantity
        )));
    }

    Ok(qty)
}

/// LIMIT orders need a positive price. Any price given with a MARKET order
/// is dropped.
pub fn validate_price(
    price: Option<&str>,
    order_type: OrderType,
) -> Result<Option<Decimal>, ValidationError> {
    if !order_type.requires_price() {
        if price.is_some() {
            tracing::debug!("Ignoring price supplied with {} order", order_type);
        }
        return Ok(None);
    }

    let raw = price.ok_or_else(|| {
        ValidationError::MissingPrice(format!("Price is required for {} orders", order_type))
    })?;
    let value = parse_decimal(raw).ok_or_else(|| {
        ValidationError::InvalidPrice(format!("'{}' must be a valid number", raw))
    })?;

    if value <= Decimal::ZERO {
        return Err(ValidationError::InvalidPrice(format!(
            "'{}' must be greater than 0",
            raw
        )));
    }

    Ok(Some(value))
}

/// Plain or scientific notation. `inf`, `nan` and out-of-range values give `None`.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}
