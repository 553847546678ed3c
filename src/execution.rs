// ORDER SERVICE

use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::error::{OrderError, ValidationError};
use crate::models::order::{OrderRequest, OrderResponse};
use crate::rest_client::RestClient;
use crate::validator::Validator;

/// Result of [`OrderService::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Validated but not sent.
    DryRun(OrderRequest),
    Placed(OrderResponse),
}

/// Validates raw order input and places orders through a [`RestClient`].
///
/// Orders move `Unvalidated -> Validated -> Signed -> Sent` and end either
/// accepted, rejected, or ambiguous after an in-flight failure. Nothing is
/// retried and no client order id is attached, so an ambiguous order has to
/// be reconciled by the caller against the exchange.
#[derive(Debug, Clone, Default)]
pub struct OrderService {
    validator: Validator,
}

impl OrderService {
    pub fn new(validator: Validator) -> Self {
        Self { validator }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(Validator::new(config.quote_asset.as_str()))
    }

    pub fn create_order_request(
        &self,
        symbol: &str,
        side: &str,
        order_type: &str,
        quantity: &str,
        price: Option<&str>,
    ) -> Result<OrderRequest, ValidationError> {
        info!(
            "Creating order request: {} {} {} {}",
            symbol, side, order_type, quantity
        );
        let request = self
            .validator
            .validate(symbol, side, order_type, quantity, price)?;
        debug!("Order request created: {:?}", request);
        Ok(request)
    }

    pub fn place_validated_order<C>(
        &self,
        client: &C,
        request: &OrderRequest,
    ) -> Result<OrderResponse, OrderError>
    where
        C: RestClient + ?Sized,
    {
        info!(
            "Placing order: {} {} {}",
            request.symbol(),
            request.side(),
            request.order_type()
        );

        match client.submit_order(request) {
            Ok(response) => {
                info!("Order placed successfully: Order ID {}", response.order_id);
                Ok(response)
            }
            Err(cause) => {
                let err = OrderError::from(cause);
                error!("Failed to place order: {} ({:?})", err, err.placement_status());
                Err(err)
            }
        }
    }

    pub fn submit<C>(
        &self,
        client: &C,
        request: OrderRequest,
        dry_run: bool,
    ) -> Result<Submission, OrderError>
    where
        C: RestClient + ?Sized,
    {
        if dry_run {
            info!("Dry run: order for {} not sent", request.symbol());
            return Ok(Submission::DryRun(request));
        }
        self.place_validated_order(client, &request)
            .map(Submission::Placed)
    }
}
