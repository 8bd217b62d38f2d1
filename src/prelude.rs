//! Tally prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, CartError, CartMutation, UserId, Wishlist},
    catalog::{Catalog, CatalogError},
    checkout::{
        Breakdown, Checkout, CheckoutError, ShippingMethod, ShippingMethods, TotalsBody, checkout,
        quote,
    },
    discounts::{ActiveTagDiscounts, DiscountError, DiscountPercent, TagDiscount},
    events::{ChannelPublisher, NoopPublisher, Publisher, StoreEvent},
    fixtures::{Fixture, FixtureError},
    inventory::{BatchReconciler, InsufficientStock, Reconciliation, StockDirective, reconcile},
    lines::{
        Aggregate, LineError, LineKey, LineRequest, LineSnapshot, Unavailable, aggregate,
        aggregate_requests,
    },
    orders::{Order, OrderError, OrderEvent, OrderHeader, OrderNumber, PaymentStatus, ShippingStatus},
    pricing::{DiscountSource, PricingError, ResolvedPrice, resolve_price},
    products::{ColorVariant, Product, ProductId, ProductKey, VariantKey},
    receipt::{Receipt, ReceiptError},
    rejection::{Rejection, RejectionKind},
    store::{LedgerError, MemoryStore, ProductStore},
    storefront::{Storefront, StorefrontError},
    tags::{collection::TagCollection, string::StringTagCollection},
};
