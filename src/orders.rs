//! Orders
//!
//! Orders created at checkout. Line snapshots and totals are fixed at creation; afterwards
//! only payment and shipping status change, driven by [`OrderEvent`]s.

use std::fmt;

use jiff::Timestamp;
use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    cart::UserId,
    checkout::{Breakdown, ShippingMethod},
    inventory::StockDirective,
    lines::LineSnapshot,
};

/// Errors raised by order status changes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The event is not allowed in the order's current state.
    #[error(
        "cannot apply {event} to order {order} (payment {payment}, shipping {shipping})"
    )]
    InvalidTransition {
        /// Order the event was applied to
        order: OrderNumber,
        /// Rejected event
        event: OrderEvent,
        /// Payment status at the time
        payment: PaymentStatus,
        /// Shipping status at the time
        shipping: ShippingStatus,
    },
}

/// Human-facing order reference, also passed to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Create an order number.
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Order number for a sequence value, e.g. `ORD-000042`.
    #[must_use]
    pub fn sequential(sequence: u64) -> Self {
        Self(format!("ORD-{sequence:06}"))
    }

    /// The raw order number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderNumber {
    fn from(number: &str) -> Self {
        Self::new(number)
    }
}

/// Fields fixed when an order is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHeader {
    /// Order reference
    pub order_number: OrderNumber,

    /// Buyer
    pub user_id: UserId,

    /// When the order was placed
    pub placed_at: Timestamp,
}

impl OrderHeader {
    /// Create a header.
    pub fn new(
        order_number: impl Into<OrderNumber>,
        user_id: impl Into<UserId>,
        placed_at: Timestamp,
    ) -> Self {
        Self {
            order_number: order_number.into(),
            user_id: user_id.into(),
            placed_at,
        }
    }
}

/// Payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting the gateway
    Pending,

    /// Funds captured
    Captured,

    /// Capture failed; may be retried
    Failed,

    /// Captured funds returned
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Captured => "captured",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        })
    }
}

/// Shipping state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    /// Not yet handed to the carrier
    Processing,

    /// With the carrier
    Shipped,

    /// Received by the buyer
    Delivered,

    /// Will not be shipped
    Cancelled,
}

impl fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        })
    }
}

/// A status change reported by the payment gateway or fulfilment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    /// Payment captured
    PaymentCaptured,

    /// Payment failed
    PaymentFailed,

    /// Payment refunded
    Refunded,

    /// Handed to the carrier
    Shipped,

    /// Delivered to the buyer
    Delivered,

    /// Cancelled before shipping
    Cancelled,
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PaymentCaptured => "payment captured",
            Self::PaymentFailed => "payment failed",
            Self::Refunded => "refund",
            Self::Shipped => "shipment",
            Self::Delivered => "delivery",
            Self::Cancelled => "cancellation",
        })
    }
}

/// An order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order<'a> {
    header: OrderHeader,
    currency: &'a Currency,
    lines: SmallVec<[LineSnapshot<'a>; 8]>,
    breakdown: Breakdown<'a>,
    shipping_method: ShippingMethod<'a>,
    payment: PaymentStatus,
    shipping: ShippingStatus,
}

impl<'a> Order<'a> {
    pub(crate) fn new(
        header: OrderHeader,
        lines: SmallVec<[LineSnapshot<'a>; 8]>,
        breakdown: Breakdown<'a>,
        shipping_method: ShippingMethod<'a>,
    ) -> Self {
        Self {
            header,
            currency: breakdown.total.currency(),
            lines,
            breakdown,
            shipping_method,
            payment: PaymentStatus::Pending,
            shipping: ShippingStatus::Processing,
        }
    }

    /// Header
    #[must_use]
    pub fn header(&self) -> &OrderHeader {
        &self.header
    }

    /// Order reference
    #[must_use]
    pub fn order_number(&self) -> &OrderNumber {
        &self.header.order_number
    }

    /// Currency of every amount
    #[must_use]
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Line snapshots at the time of purchase
    #[must_use]
    pub fn lines(&self) -> &[LineSnapshot<'a>] {
        &self.lines
    }

    /// Totals at the time of purchase
    #[must_use]
    pub fn breakdown(&self) -> &Breakdown<'a> {
        &self.breakdown
    }

    /// Shipping method chosen at checkout
    #[must_use]
    pub fn shipping_method(&self) -> &ShippingMethod<'a> {
        &self.shipping_method
    }

    /// Payment status
    #[must_use]
    pub fn payment_status(&self) -> PaymentStatus {
        self.payment
    }

    /// Shipping status
    #[must_use]
    pub fn shipping_status(&self) -> ShippingStatus {
        self.shipping
    }

    /// Grand total in minor units, as sent to the payment gateway.
    #[must_use]
    pub fn amount_due(&self) -> i64 {
        self.breakdown.total.to_minor_units()
    }

    /// Apply a status event, returning the updated order.
    ///
    /// Payment moves `pending -> captured | failed`, `failed -> captured` and
    /// `captured -> refunded`. Shipping moves `processing -> shipped -> delivered` or
    /// `processing -> cancelled`, and an order only ships once payment is captured.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] if the event is not allowed.
    pub fn apply(&self, event: OrderEvent) -> Result<Self, OrderError> {
        use OrderEvent as E;
        use PaymentStatus as P;
        use ShippingStatus as S;

        let next = match (event, self.payment, self.shipping) {
            (E::PaymentCaptured, P::Pending | P::Failed, S::Processing) => (P::Captured, S::Processing),
            (E::PaymentFailed, P::Pending, shipping) => (P::Failed, shipping),
            (E::Refunded, P::Captured, shipping) => (P::Refunded, shipping),
            (E::Shipped, P::Captured, S::Processing) => (P::Captured, S::Shipped),
            (E::Delivered, payment, S::Shipped) => (payment, S::Delivered),
            (E::Cancelled, payment, S::Processing) => (payment, S::Cancelled),
            _ => {
                return Err(OrderError::InvalidTransition {
                    order: self.header.order_number.clone(),
                    event,
                    payment: self.payment,
                    shipping: self.shipping,
                });
            }
        };

        let mut order = self.clone();
        (order.payment, order.shipping) = next;

        Ok(order)
    }

    /// Directives returning every purchased unit to stock, merged per product.
    #[must_use]
    pub fn restock_directives(&self) -> SmallVec<[StockDirective; 8]> {
        let mut directives: SmallVec<[StockDirective; 8]> = SmallVec::new();

        for line in &self.lines {
            let quantity = i64::from(line.quantity());

            match directives
                .iter_mut()
                .find(|directive| directive.product_id == *line.product_id())
            {
                Some(directive) => {
                    directive.stock_delta += quantity;
                    directive.sales_count_delta -= quantity;
                }
                None => directives.push(StockDirective::for_delta(
                    line.product_id().clone(),
                    -quantity,
                )),
            }
        }

        directives
    }
}
