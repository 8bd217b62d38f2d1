//! Events
//!
//! Notifications published after a mutation has been committed. Publishers are injected, so
//! the transport (sockets, queues, logs) stays outside the core.

use std::{fmt, sync::mpsc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cart::UserId,
    inventory::StockDirective,
    orders::{OrderNumber, PaymentStatus, ShippingStatus},
};

/// Something that happened in the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A cart was changed and its stock directives applied.
    CartUpdated {
        /// Owner of the cart
        user_id: UserId,
        /// Lines now in the cart
        lines: usize,
        /// Directives that were applied
        directives: Vec<StockDirective>,
    },

    /// An order was created and its stock taken.
    OrderPlaced {
        /// Order reference
        order_number: OrderNumber,
        /// Buyer
        user_id: UserId,
        /// Grand total in minor units
        total: i64,
        /// ISO currency code
        currency: String,
    },

    /// An order's payment or shipping status changed.
    OrderStatusChanged {
        /// Order reference
        order_number: OrderNumber,
        /// New payment status
        payment: PaymentStatus,
        /// New shipping status
        shipping: ShippingStatus,
    },
}

/// Receives events after mutations succeed.
pub trait Publisher: fmt::Debug {
    /// Publish an event. Delivery is best effort and never fails the mutation.
    fn publish(&self, event: &StoreEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(&self, _event: &StoreEvent) {}
}

/// Sends events down a channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<StoreEvent>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<StoreEvent>) {
        let (sender, receiver) = mpsc::channel();

        (Self { sender }, receiver)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, event: &StoreEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!(?event, "event receiver dropped");
        }
    }
}
