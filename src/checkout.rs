//! Checkout
//!
//! Shipping methods, the tax and grand total breakdown, and order creation.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    catalog::Catalog,
    discounts::{ActiveTagDiscounts, DiscountError, percent_of_minor},
    inventory::{BatchReconciler, InsufficientStock, StockDirective},
    lines::{Aggregate, LineError, LineInput, LineRequest, aggregate, merge_requests},
    orders::{Order, OrderHeader},
};

/// Errors that can occur during checkout.
#[derive(Debug, Error, PartialEq)]
pub enum CheckoutError {
    /// The order has no lines.
    #[error("order has no lines")]
    EmptyOrder,

    /// No shipping method has this code.
    #[error("unknown shipping method {0}")]
    UnknownShippingMethod(String),

    /// A line failed validation or pricing.
    #[error(transparent)]
    Line(#[from] LineError),

    /// Not enough stock to fulfil a line.
    #[error(transparent)]
    Stock(#[from] InsufficientStock),

    /// Tax could not be calculated.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// A total does not fit in minor units.
    #[error("order totals overflowed")]
    Overflow,

    /// Discounts exceed subtotal, shipping and tax together.
    #[error("discounts exceed the order value, leaving a total of {0} minor units")]
    NegativeTotal(i64),
}

/// A way of shipping an order.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingMethod<'a> {
    /// Lookup code
    pub code: String,

    /// Display name
    pub name: String,

    /// Flat shipping cost
    pub cost: Money<'a, Currency>,

    /// GST in percent points, charged on subtotal plus shipping
    pub gst_percent: Decimal,

    /// Estimated delivery time
    pub estimated_days: u32,
}

impl<'a> ShippingMethod<'a> {
    /// Create a method with no GST and no delivery estimate.
    pub fn new(code: impl Into<String>, name: impl Into<String>, cost: Money<'a, Currency>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            cost,
            gst_percent: Decimal::ZERO,
            estimated_days: 0,
        }
    }

    /// Set the GST percentage.
    #[must_use]
    pub fn with_gst(mut self, gst_percent: impl Into<Decimal>) -> Self {
        self.gst_percent = gst_percent.into();
        self
    }

    /// Set the delivery estimate.
    #[must_use]
    pub fn with_estimated_days(mut self, days: u32) -> Self {
        self.estimated_days = days;
        self
    }
}

/// Configured shipping methods keyed by code.
#[derive(Debug, Clone, Default)]
pub struct ShippingMethods<'a> {
    by_code: FxHashMap<String, ShippingMethod<'a>>,
}

impl<'a> ShippingMethods<'a> {
    /// Look up a method by code.
    pub fn get(&self, code: &str) -> Option<&ShippingMethod<'a>> {
        self.by_code.get(code)
    }

    /// Add a method, replacing any with the same code.
    pub fn insert(&mut self, method: ShippingMethod<'a>) {
        self.by_code.insert(method.code.clone(), method);
    }

    /// Iterate over methods in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ShippingMethod<'a>> {
        self.by_code.values()
    }

    /// Number of methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Whether no methods are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

impl<'a> FromIterator<ShippingMethod<'a>> for ShippingMethods<'a> {
    fn from_iter<I: IntoIterator<Item = ShippingMethod<'a>>>(iter: I) -> Self {
        let mut methods = Self::default();

        for method in iter {
            methods.insert(method);
        }

        methods
    }
}

/// Order totals.
///
/// `tax = round((subtotal + shipping) * gst / 100)` and
/// `total = subtotal + shipping + tax - discount`, never negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakdown<'a> {
    /// Sum of line totals
    pub subtotal: Money<'a, Currency>,

    /// Shipping cost
    pub shipping: Money<'a, Currency>,

    /// GST on subtotal plus shipping
    pub tax: Money<'a, Currency>,

    /// Sum of line savings
    pub discount: Money<'a, Currency>,

    /// Grand total
    pub total: Money<'a, Currency>,
}

impl<'a> Breakdown<'a> {
    /// Compute totals for an aggregate shipped with `method`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Overflow`] or [`CheckoutError::Discount`] if an amount cannot be
    /// represented in minor units, or [`CheckoutError::NegativeTotal`] if the discount is larger
    /// than everything else.
    pub fn compute(
        aggregate: &Aggregate<'a>,
        method: &ShippingMethod<'a>,
    ) -> Result<Self, CheckoutError> {
        let currency = aggregate.currency();

        let subtotal = aggregate.subtotal().to_minor_units();
        let shipping = method.cost.to_minor_units();
        let discount = aggregate.total_discount().to_minor_units();

        let taxable = subtotal.checked_add(shipping).ok_or(CheckoutError::Overflow)?;
        let tax = percent_of_minor(taxable, method.gst_percent)?;

        let total = taxable
            .checked_add(tax)
            .and_then(|gross| gross.checked_sub(discount))
            .ok_or(CheckoutError::Overflow)?;

        if total < 0 {
            return Err(CheckoutError::NegativeTotal(total));
        }

        Ok(Self {
            subtotal: Money::from_minor(subtotal, currency),
            shipping: Money::from_minor(shipping, currency),
            tax: Money::from_minor(tax, currency),
            discount: Money::from_minor(discount, currency),
            total: Money::from_minor(total, currency),
        })
    }

    /// The boundary shape of these totals, in minor units.
    #[must_use]
    pub fn to_body(&self) -> TotalsBody {
        TotalsBody {
            subtotal: self.subtotal.to_minor_units(),
            shipping: self.shipping.to_minor_units(),
            tax: self.tax.to_minor_units(),
            discount: self.discount.to_minor_units(),
            total: self.total.to_minor_units(),
            currency: self.total.currency().iso_alpha_code.to_string(),
        }
    }
}

/// Totals as returned to the storefront, in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsBody {
    /// Sum of line totals
    pub subtotal: i64,

    /// Shipping cost
    pub shipping: i64,

    /// GST
    pub tax: i64,

    /// Sum of line savings
    pub discount: i64,

    /// Grand total
    pub total: i64,

    /// ISO currency code
    pub currency: String,
}

/// A created order and the stock directives that finalise it.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkout<'a> {
    /// The new order
    pub order: Order<'a>,

    /// Stock decrements to apply, all or nothing
    pub directives: SmallVec<[StockDirective; 8]>,
}

/// Price and validate the requested lines without creating an order.
///
/// # Errors
///
/// Returns [`CheckoutError::UnknownShippingMethod`], the first line error, or
/// [`CheckoutError::NegativeTotal`] when discounts exceed the order value.
pub fn quote<'a>(
    catalog: &Catalog<'a>,
    tag_discounts: &ActiveTagDiscounts,
    shipping: &ShippingMethods<'a>,
    shipping_code: &str,
    requests: &[LineRequest],
) -> Result<(Aggregate<'a>, Breakdown<'a>), CheckoutError> {
    let method = shipping_method(shipping, shipping_code)?;

    price_lines(catalog, tag_discounts, method, requests)
}

fn shipping_method<'s, 'a>(
    shipping: &'s ShippingMethods<'a>,
    code: &str,
) -> Result<&'s ShippingMethod<'a>, CheckoutError> {
    shipping
        .get(code)
        .ok_or_else(|| CheckoutError::UnknownShippingMethod(code.to_string()))
}

fn price_lines<'a>(
    catalog: &Catalog<'a>,
    tag_discounts: &ActiveTagDiscounts,
    method: &ShippingMethod<'a>,
    requests: &[LineRequest],
) -> Result<(Aggregate<'a>, Breakdown<'a>), CheckoutError> {
    let merged = merge_requests(catalog, requests)?;

    let inputs: Vec<LineInput<'_, 'a>> = merged
        .iter()
        .map(|(key, line)| LineInput {
            product: line.product,
            quantity: i64::from(line.quantity),
            variant: key.variant.clone(),
        })
        .collect();

    let aggregate = aggregate(&inputs, tag_discounts, method.cost.currency())?;
    let breakdown = Breakdown::compute(&aggregate, method)?;

    Ok((aggregate, breakdown))
}

/// Create an order from the requested lines.
///
/// Lines sharing a key are merged. Every line is priced and stock-checked as a fresh
/// decrement before any directive is emitted; the order starts pending and processing.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyOrder`] for an empty request, otherwise the first error from
/// [`quote`] or stock reconciliation.
pub fn checkout<'a>(
    catalog: &Catalog<'a>,
    tag_discounts: &ActiveTagDiscounts,
    shipping: &ShippingMethods<'a>,
    shipping_code: &str,
    header: OrderHeader,
    requests: &[LineRequest],
) -> Result<Checkout<'a>, CheckoutError> {
    if requests.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }

    let method = shipping_method(shipping, shipping_code)?;
    let (aggregate, breakdown) = price_lines(catalog, tag_discounts, method, requests)?;

    let mut batch = BatchReconciler::new();

    for line in aggregate.lines() {
        let stock = catalog.stock_of(line.product_id()).unwrap_or_default();

        batch.push(line.product_id(), line.variant(), 0, line.quantity(), stock)?;
    }

    Ok(Checkout {
        order: Order::new(header, aggregate.into_lines(), breakdown, method.clone()),
        directives: batch.finish(),
    })
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{INR, USD};
    use testresult::TestResult;

    use crate::{
        discounts::DiscountPercent,
        lines::Unavailable,
        products::Product,
        tags::string::StringTagCollection,
    };

    use super::*;

    fn catalog() -> Result<Catalog<'static>, crate::catalog::CatalogError> {
        Catalog::with_products([
            Product::new("a", "Product A", Money::from_minor(800, INR), 5),
            Product::new("b", "Product B", Money::from_minor(500, INR), 1),
            Product::new("c", "Product C", Money::from_minor(1000, INR), 4)
                .with_tags(StringTagCollection::from_strs(&["sale"])),
        ])
    }

    fn shipping() -> ShippingMethods<'static> {
        [
            ShippingMethod::new("standard", "Standard", Money::from_minor(100, INR))
                .with_gst(18)
                .with_estimated_days(5),
            ShippingMethod::new("intl", "International", Money::from_minor(100, USD)),
        ]
        .into_iter()
        .collect()
    }

    fn header() -> Result<OrderHeader, jiff::Error> {
        Ok(OrderHeader::new("ORD-000007", "user-1", "2025-06-01T10:00:00Z".parse()?))
    }

    #[test]
    fn grand_total_includes_shipping_and_tax() -> TestResult {
        let placed = checkout(
            &catalog()?,
            &ActiveTagDiscounts::none(),
            &shipping(),
            "standard",
            header()?,
            &[LineRequest::new("a", 2), LineRequest::new("b", 1)],
        )?;

        assert_eq!(
            placed.order.breakdown().to_body(),
            TotalsBody {
                subtotal: 2100,
                shipping: 100,
                tax: 396,
                discount: 0,
                total: 2596,
                currency: "INR".to_string(),
            }
        );
        assert_eq!(placed.order.amount_due(), 2596);
        assert_eq!(
            placed.directives.as_slice(),
            &[StockDirective::for_delta("a", 2), StockDirective::for_delta("b", 1)]
        );

        Ok(())
    }

    #[test]
    fn discount_is_subtracted_from_grand_total() -> TestResult {
        let sale: ActiveTagDiscounts = [("sale".to_string(), DiscountPercent::new(20)?)]
            .into_iter()
            .collect();

        let (aggregate, breakdown) = quote(&catalog()?, &sale, &shipping(), "standard", &[
            LineRequest::new("c", 1),
        ])?;

        // subtotal 800, tax round(900 * 0.18) = 162, discount 200
        assert_eq!(aggregate.subtotal(), Money::from_minor(800, INR));
        assert_eq!(breakdown.tax, Money::from_minor(162, INR));
        assert_eq!(breakdown.discount, Money::from_minor(200, INR));
        assert_eq!(breakdown.total, Money::from_minor(862, INR));

        Ok(())
    }

    #[test]
    fn total_decomposes_into_its_parts() -> TestResult {
        let (_, breakdown) = quote(&catalog()?, &ActiveTagDiscounts::none(), &shipping(), "standard", &[
            LineRequest::new("a", 3),
            LineRequest::new("c", 2),
        ])?;

        let body = breakdown.to_body();

        assert_eq!(body.subtotal + body.shipping + body.tax - body.discount, body.total);

        Ok(())
    }

    #[test]
    fn duplicate_lines_are_merged() -> TestResult {
        let placed = checkout(
            &catalog()?,
            &ActiveTagDiscounts::none(),
            &shipping(),
            "standard",
            header()?,
            &[LineRequest::new("a", 1), LineRequest::new("a", 2)],
        )?;

        assert_eq!(placed.order.lines().len(), 1);
        assert_eq!(placed.directives.as_slice(), &[StockDirective::for_delta("a", 3)]);

        Ok(())
    }

    #[test]
    fn over_stock_rejects_the_whole_order() -> TestResult {
        let result = checkout(
            &catalog()?,
            &ActiveTagDiscounts::none(),
            &shipping(),
            "standard",
            header()?,
            &[LineRequest::new("a", 1), LineRequest::new("b", 2)],
        );

        assert!(matches!(
            result,
            Err(CheckoutError::Line(LineError::ProductUnavailable {
                reason: Unavailable::OutOfStock { available: 1 },
                ..
            }))
        ));

        Ok(())
    }

    #[test]
    fn empty_order_is_rejected() -> TestResult {
        let result = checkout(
            &catalog()?,
            &ActiveTagDiscounts::none(),
            &shipping(),
            "standard",
            header()?,
            &[],
        );

        assert_eq!(result, Err(CheckoutError::EmptyOrder));

        Ok(())
    }

    #[test]
    fn unknown_shipping_method_is_rejected() -> TestResult {
        let result = quote(&catalog()?, &ActiveTagDiscounts::none(), &shipping(), "drone", &[
            LineRequest::new("a", 1),
        ]);

        assert!(matches!(result, Err(CheckoutError::UnknownShippingMethod(code)) if code == "drone"));

        Ok(())
    }

    #[test]
    fn shipping_currency_must_match_products() -> TestResult {
        let result = quote(&catalog()?, &ActiveTagDiscounts::none(), &shipping(), "intl", &[
            LineRequest::new("a", 1),
        ]);

        assert!(matches!(
            result,
            Err(CheckoutError::Line(LineError::CurrencyMismatch { .. }))
        ));

        Ok(())
    }

    #[test]
    fn order_snapshots_survive_catalog_changes() -> TestResult {
        let mut catalog = catalog()?;

        let placed = checkout(
            &catalog,
            &ActiveTagDiscounts::none(),
            &shipping(),
            "standard",
            header()?,
            &[LineRequest::new("a", 1)],
        )?;

        if let Some(product) = catalog.get_by_id_mut(&"a".into()) {
            product.price = Some(Money::from_minor(9_999, INR));
            product.name = "Renamed".to_string();
        }

        let line = placed.order.lines().first().ok_or("missing line")?;

        assert_eq!(line.name(), "Product A");
        assert_eq!(line.unit_price(), Money::from_minor(800, INR));

        Ok(())
    }

    #[test]
    fn discount_beyond_order_value_is_rejected() -> TestResult {
        let catalog = Catalog::with_products([
            Product::new("d", "Product D", Money::from_minor(1000, INR), 1).with_discount(60),
        ])?;

        let free: ShippingMethods<'static> =
            [ShippingMethod::new("pickup", "Pickup", Money::from_minor(0, INR))]
                .into_iter()
                .collect();

        let result = quote(&catalog, &ActiveTagDiscounts::none(), &free, "pickup", &[
            LineRequest::new("d", 1),
        ]);

        assert_eq!(result.err(), Some(CheckoutError::NegativeTotal(400 - 600)));

        Ok(())
    }
}
