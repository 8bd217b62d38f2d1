//! Rejections
//!
//! The structured `{error, failingProductId?}` shape returned at the request boundary, built
//! from any error the core raises.

use serde::{Deserialize, Serialize};

use crate::{
    cart::CartError,
    checkout::CheckoutError,
    inventory::InsufficientStock,
    lines::LineError,
    orders::OrderError,
    pricing::PricingError,
    products::ProductId,
    store::LedgerError,
    storefront::StorefrontError,
};

/// Category of a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Stored product data cannot be priced
    InvalidProductState,

    /// Product is unpublished, deleted or out of stock
    ProductUnavailable,

    /// Quantity is not a positive integer
    InvalidQuantity,

    /// Not enough stock for the requested change
    InsufficientStock,

    /// Malformed request, such as an unknown variant or shipping method
    InvalidRequest,

    /// Referenced cart line does not exist
    NotFound,

    /// Stock or order state changed underneath the request
    Conflict,

    /// Arithmetic overflow or another internal failure
    Internal,
}

/// A user-facing rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Category
    pub kind: RejectionKind,

    /// Message for the user
    pub error: String,

    /// Product that caused the rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failing_product_id: Option<ProductId>,
}

impl Rejection {
    fn new(kind: RejectionKind, error: &impl ToString, product: Option<&ProductId>) -> Self {
        Self {
            kind,
            error: error.to_string(),
            failing_product_id: product.cloned(),
        }
    }

    /// Whether the user can fix the request and retry.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind,
            RejectionKind::InvalidProductState | RejectionKind::Internal
        )
    }

    /// HTTP status equivalent.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.kind {
            RejectionKind::InvalidProductState | RejectionKind::Internal => 500,
            RejectionKind::NotFound => 404,
            RejectionKind::Conflict => 409,
            RejectionKind::ProductUnavailable
            | RejectionKind::InvalidQuantity
            | RejectionKind::InsufficientStock
            | RejectionKind::InvalidRequest => 400,
        }
    }
}

impl From<&LineError> for Rejection {
    fn from(error: &LineError) -> Self {
        let kind = match error {
            LineError::InvalidQuantity { .. } => RejectionKind::InvalidQuantity,
            LineError::ProductUnavailable { .. } => RejectionKind::ProductUnavailable,
            LineError::UnknownVariant { .. } | LineError::CurrencyMismatch { .. } => {
                RejectionKind::InvalidRequest
            }
            LineError::Pricing(PricingError::InvalidProductState { .. }) => {
                RejectionKind::InvalidProductState
            }
            LineError::Overflow(_) | LineError::Pricing(PricingError::Discount(_)) => {
                RejectionKind::Internal
            }
        };

        Self::new(kind, error, error.product())
    }
}

impl From<&InsufficientStock> for Rejection {
    fn from(error: &InsufficientStock) -> Self {
        Self::new(RejectionKind::InsufficientStock, error, Some(&error.product))
    }
}

impl From<&CartError> for Rejection {
    fn from(error: &CartError) -> Self {
        match error {
            CartError::Line(line) => line.into(),
            CartError::Stock(stock) => stock.into(),
            CartError::LineNotFound(key) => {
                Self::new(RejectionKind::NotFound, error, Some(&key.product_id))
            }
        }
    }
}

impl From<&CheckoutError> for Rejection {
    fn from(error: &CheckoutError) -> Self {
        match error {
            CheckoutError::Line(line) => line.into(),
            CheckoutError::Stock(stock) => stock.into(),
            CheckoutError::EmptyOrder | CheckoutError::UnknownShippingMethod(_) => {
                Self::new(RejectionKind::InvalidRequest, error, None)
            }
            CheckoutError::NegativeTotal(_) => {
                Self::new(RejectionKind::InvalidProductState, error, None)
            }
            CheckoutError::Discount(_) | CheckoutError::Overflow => {
                Self::new(RejectionKind::Internal, error, None)
            }
        }
    }
}

impl From<&OrderError> for Rejection {
    fn from(error: &OrderError) -> Self {
        Self::new(RejectionKind::Conflict, error, None)
    }
}

impl From<&LedgerError> for Rejection {
    fn from(error: &LedgerError) -> Self {
        match error {
            LedgerError::InsufficientStock { product, .. } => {
                Self::new(RejectionKind::Conflict, error, Some(product))
            }
            LedgerError::UnknownProduct(product) => {
                Self::new(RejectionKind::ProductUnavailable, error, Some(product))
            }
            LedgerError::StockOverflow(product) => {
                Self::new(RejectionKind::Internal, error, Some(product))
            }
        }
    }
}

impl From<&StorefrontError> for Rejection {
    fn from(error: &StorefrontError) -> Self {
        match error {
            StorefrontError::Cart(source) => source.into(),
            StorefrontError::Checkout(source) => source.into(),
            StorefrontError::Order(source) => source.into(),
            StorefrontError::Ledger(source) => source.into(),
        }
    }
}
