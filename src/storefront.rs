//! Storefront
//!
//! Composes the pure calculations with a [`ProductStore`] and a [`Publisher`]: compute the
//! next state and its directives, apply the directives, then publish.

use jiff::Timestamp;
use thiserror::Error;
use tracing::{Span, error, info, warn};

use crate::{
    cart::{Cart, CartError, CartMutation},
    checkout::{Breakdown, CheckoutError, ShippingMethods, checkout, quote},
    discounts::{ActiveTagDiscounts, TagDiscount},
    events::{Publisher, StoreEvent},
    inventory::StockDirective,
    lines::{Aggregate, LineKey, LineRequest},
    orders::{Order, OrderError, OrderEvent, OrderHeader},
    rejection::Rejection,
    store::{LedgerError, ProductStore},
};

/// Errors raised by storefront operations.
#[derive(Debug, Error, PartialEq)]
pub enum StorefrontError {
    /// Cart mutation was rejected.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Checkout was rejected.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Order status change was rejected.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The store refused the stock directives.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl StorefrontError {
    /// The user-facing rejection for this error.
    #[must_use]
    pub fn rejection(&self) -> Rejection {
        Rejection::from(self)
    }
}

/// Cart and checkout operations over a product store.
#[derive(Debug)]
pub struct Storefront<'a, S, P> {
    store: S,
    publisher: P,
    tag_discounts: Vec<TagDiscount>,
    active: ActiveTagDiscounts,
    shipping: ShippingMethods<'a>,
}

impl<'a, S, P> Storefront<'a, S, P>
where
    S: ProductStore<'a>,
    P: Publisher,
{
    /// Create a storefront with no tag discounts.
    pub fn new(store: S, publisher: P, shipping: ShippingMethods<'a>) -> Self {
        Self {
            store,
            publisher,
            tag_discounts: Vec::new(),
            active: ActiveTagDiscounts::none(),
            shipping,
        }
    }

    /// Set the tag discounts and evaluate which are active at `now`.
    #[must_use]
    pub fn with_tag_discounts(mut self, tag_discounts: Vec<TagDiscount>, now: Timestamp) -> Self {
        self.tag_discounts = tag_discounts;
        self.refresh_discounts(now);
        self
    }

    /// Re-evaluate which tag discounts are active at `now`.
    pub fn refresh_discounts(&mut self, now: Timestamp) {
        self.active = ActiveTagDiscounts::active_at(&self.tag_discounts, now);
    }

    /// Tag discounts currently applied
    #[must_use]
    pub fn active_discounts(&self) -> &ActiveTagDiscounts {
        &self.active
    }

    /// The product store
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the product store, for admin edits.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Configured shipping methods
    #[must_use]
    pub fn shipping(&self) -> &ShippingMethods<'a> {
        &self.shipping
    }

    /// Add a line to a cart.
    ///
    /// # Errors
    ///
    /// Returns a [`StorefrontError`] if the line is rejected or the store refuses the stock
    /// change. The store is unchanged on error.
    #[tracing::instrument(
        name = "storefront.add_to_cart",
        skip(self, cart, request),
        fields(user_id = %cart.user_id(), product_id = %request.product_id, quantity = request.quantity)
    )]
    pub fn add_to_cart(
        &mut self,
        cart: &Cart<'a>,
        request: &LineRequest,
    ) -> Result<Cart<'a>, StorefrontError> {
        let mutation = cart
            .add(self.store.catalog(), &self.active, request)
            .map_err(StorefrontError::from)
            .inspect_err(log_rejection)?;

        self.commit_cart(mutation)
    }

    /// Change the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns a [`StorefrontError`] if the change is rejected. The store is unchanged on error.
    #[tracing::instrument(
        name = "storefront.update_cart_line",
        skip(self, cart, key),
        fields(user_id = %cart.user_id(), line = %key)
    )]
    pub fn update_cart_line(
        &mut self,
        cart: &Cart<'a>,
        key: &LineKey,
        quantity: i64,
    ) -> Result<Cart<'a>, StorefrontError> {
        let mutation = cart
            .update_quantity(self.store.catalog(), &self.active, key, quantity)
            .map_err(StorefrontError::from)
            .inspect_err(log_rejection)?;

        self.commit_cart(mutation)
    }

    /// Remove a cart line and return its stock.
    ///
    /// # Errors
    ///
    /// Returns a [`StorefrontError`] if there is no such line.
    #[tracing::instrument(
        name = "storefront.remove_cart_line",
        skip(self, cart, key),
        fields(user_id = %cart.user_id(), line = %key)
    )]
    pub fn remove_cart_line(
        &mut self,
        cart: &Cart<'a>,
        key: &LineKey,
    ) -> Result<Cart<'a>, StorefrontError> {
        let mutation = cart
            .remove(self.store.catalog(), key)
            .map_err(StorefrontError::from)
            .inspect_err(log_rejection)?;

        self.commit_cart(mutation)
    }

    /// Replace a cart's contents, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`StorefrontError`] if any line is rejected; no stock changes in that case.
    #[tracing::instrument(
        name = "storefront.replace_cart",
        skip(self, cart, requests),
        fields(user_id = %cart.user_id(), lines = requests.len())
    )]
    pub fn replace_cart(
        &mut self,
        cart: &Cart<'a>,
        requests: &[LineRequest],
    ) -> Result<Cart<'a>, StorefrontError> {
        let mutation = cart
            .replace(self.store.catalog(), &self.active, requests)
            .map_err(StorefrontError::from)
            .inspect_err(log_rejection)?;

        self.commit_cart(mutation)
    }

    /// Price lines and compute totals without reserving stock.
    ///
    /// # Errors
    ///
    /// Returns a [`StorefrontError`] if a line or the shipping method is rejected.
    #[tracing::instrument(
        name = "storefront.quote",
        skip(self, shipping_code, requests),
        fields(shipping = %shipping_code, lines = requests.len(), total = tracing::field::Empty)
    )]
    pub fn quote(
        &self,
        shipping_code: &str,
        requests: &[LineRequest],
    ) -> Result<(Aggregate<'a>, Breakdown<'a>), StorefrontError> {
        let (aggregate, breakdown) = quote(
            self.store.catalog(),
            &self.active,
            &self.shipping,
            shipping_code,
            requests,
        )
        .map_err(StorefrontError::from)
        .inspect_err(log_rejection)?;

        Span::current().record("total", breakdown.total.to_minor_units());

        Ok((aggregate, breakdown))
    }

    /// Create an order and take its stock.
    ///
    /// # Errors
    ///
    /// Returns a [`StorefrontError`] if checkout is rejected or the store refuses the stock
    /// change. No stock changes on error.
    #[tracing::instrument(
        name = "storefront.place_order",
        skip(self, header, shipping_code, requests),
        fields(
            order_number = %header.order_number,
            user_id = %header.user_id,
            shipping = %shipping_code,
            total = tracing::field::Empty
        )
    )]
    pub fn place_order(
        &mut self,
        header: OrderHeader,
        shipping_code: &str,
        requests: &[LineRequest],
    ) -> Result<Order<'a>, StorefrontError> {
        let placed = checkout(
            self.store.catalog(),
            &self.active,
            &self.shipping,
            shipping_code,
            header,
            requests,
        )
        .map_err(StorefrontError::from)
        .inspect_err(log_rejection)?;

        self.apply_directives(&placed.directives)?;

        let order = placed.order;

        Span::current().record("total", order.amount_due());

        info!(
            order_number = %order.order_number(),
            total = order.amount_due(),
            directives = placed.directives.len(),
            "placed order"
        );

        self.publisher.publish(&StoreEvent::OrderPlaced {
            order_number: order.order_number().clone(),
            user_id: order.header().user_id.clone(),
            total: order.amount_due(),
            currency: order.currency().iso_alpha_code.to_string(),
        });

        Ok(order)
    }

    /// Apply a payment or shipping event to an order. Cancelling returns its stock.
    ///
    /// # Errors
    ///
    /// Returns a [`StorefrontError`] if the transition is not allowed.
    #[tracing::instrument(
        name = "storefront.apply_order_event",
        skip(self, order),
        fields(order_number = %order.order_number())
    )]
    pub fn apply_order_event(
        &mut self,
        order: &Order<'a>,
        event: OrderEvent,
    ) -> Result<Order<'a>, StorefrontError> {
        let next = order
            .apply(event)
            .map_err(StorefrontError::from)
            .inspect_err(log_rejection)?;

        if event == OrderEvent::Cancelled {
            let catalog = self.store.catalog();

            let restock: Vec<StockDirective> = next
                .restock_directives()
                .into_iter()
                .filter(|directive| catalog.get_by_id(&directive.product_id).is_some())
                .collect();

            self.apply_directives(&restock)?;
        }

        info!(
            payment = %next.payment_status(),
            shipping = %next.shipping_status(),
            "order status changed"
        );

        self.publisher.publish(&StoreEvent::OrderStatusChanged {
            order_number: next.order_number().clone(),
            payment: next.payment_status(),
            shipping: next.shipping_status(),
        });

        Ok(next)
    }

    fn commit_cart(&mut self, mutation: CartMutation<'a>) -> Result<Cart<'a>, StorefrontError> {
        let CartMutation { cart, directives } = mutation;

        self.apply_directives(&directives)?;

        info!(lines = cart.len(), directives = directives.len(), "updated cart");

        self.publisher.publish(&StoreEvent::CartUpdated {
            user_id: cart.user_id().clone(),
            lines: cart.len(),
            directives: directives.into_vec(),
        });

        Ok(cart)
    }

    fn apply_directives(&mut self, directives: &[StockDirective]) -> Result<(), StorefrontError> {
        if directives.is_empty() {
            return Ok(());
        }

        self.store
            .apply(directives)
            .map_err(StorefrontError::from)
            .inspect_err(log_rejection)
    }
}

fn log_rejection(error: &StorefrontError) {
    let rejection = error.rejection();

    if rejection.is_recoverable() {
        warn!(
            kind = ?rejection.kind,
            product_id = rejection.failing_product_id.as_ref().map(tracing::field::display),
            "{}",
            rejection.error
        );
    } else {
        error!(
            kind = ?rejection.kind,
            product_id = rejection.failing_product_id.as_ref().map(tracing::field::display),
            "{}",
            rejection.error
        );
    }
}
