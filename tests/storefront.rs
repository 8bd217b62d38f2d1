//! Storefront flows over the `storefront` fixture set.
//!
//! During the festive window (2025-10-01 to 2025-11-15) the kurta is 20% off through its
//! "festive" tag. The scarf keeps its own 10% because the 5% "silk" tag is smaller.
//!
//! The `festive` request (2 indigo kurtas and 1 scarf) with standard shipping:
//!
//! - Kurta: ₹10.00 -> ₹8.00, 2 units = 1600 paise (saves 400)
//! - Scarf: ₹5.00 -> ₹4.50, 1 unit = 450 paise (saves 50)
//! - Subtotal 2050, shipping 100, tax round(2150 x 18%) = 387, discount 450
//! - Total 2050 + 100 + 387 - 450 = 2087 paise

use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::INR};
use testresult::TestResult;

use tally::prelude::*;

fn during_festival() -> Result<Timestamp, jiff::Error> {
    "2025-10-20T12:00:00Z".parse()
}

fn after_festival() -> Result<Timestamp, jiff::Error> {
    "2025-12-01T12:00:00Z".parse()
}

fn storefront(
    now: Timestamp,
) -> Result<(Fixture<'static>, Storefront<'static, MemoryStore<'static>, NoopPublisher>), FixtureError>
{
    let fixture = Fixture::from_set("storefront")?;
    let storefront = Fixture::from_set("storefront")?.into_storefront(NoopPublisher, now);

    Ok((fixture, storefront))
}

fn stock_of<'a, S: ProductStore<'a>>(store: &S, id: &str) -> Option<u32> {
    store.catalog().stock_of(&ProductId::from(id))
}

#[test]
fn festive_quote_applies_tag_discount() -> TestResult {
    let (fixture, storefront) = storefront(during_festival()?)?;

    let (aggregate, breakdown) = storefront.quote("standard", fixture.request("festive")?)?;

    let kurta = aggregate
        .lines()
        .iter()
        .find(|line| line.product_id().as_str() == "kurta")
        .ok_or("kurta line missing")?;

    assert_eq!(kurta.unit_price(), Money::from_minor(800, INR));
    assert_eq!(kurta.variant_name(), Some("Indigo"));
    assert_eq!(
        breakdown.to_body(),
        TotalsBody {
            subtotal: 2050,
            shipping: 100,
            tax: 387,
            discount: 450,
            total: 2087,
            currency: "INR".to_string(),
        }
    );

    Ok(())
}

#[test]
fn expired_tag_discount_no_longer_applies() -> TestResult {
    let (fixture, storefront) = storefront(after_festival()?)?;

    let (_, breakdown) = storefront.quote("standard", fixture.request("festive")?)?;

    // 2000 + 450 = 2450, tax round(2550 x 18%) = 459, only the scarf's 50 saved
    assert_eq!(breakdown.total, Money::from_minor(2959, INR));

    Ok(())
}

#[test]
fn refresh_discounts_follows_the_clock() -> TestResult {
    let (fixture, mut storefront) = storefront(during_festival()?)?;
    let requests = fixture.request("festive")?;

    let (_, during) = storefront.quote("standard", requests)?;

    storefront.refresh_discounts(after_festival()?);

    let (_, after) = storefront.quote("standard", requests)?;

    assert_eq!(during.total.to_minor_units(), 2087);
    assert_eq!(after.total.to_minor_units(), 2959);

    Ok(())
}

#[test]
fn product_discount_loses_to_larger_tag_discount() -> TestResult {
    let (fixture, storefront) = storefront(during_festival()?)?;

    let (aggregate, breakdown) = storefront.quote("express", fixture.request("saree")?)?;

    let saree = aggregate.lines().first().ok_or("saree line missing")?;

    // Own 15% and silk 5% both lose to festive 20%
    assert_eq!(saree.discount_percent().points(), Decimal::from(20));
    assert_eq!(saree.line_total(), Money::from_minor(1600, INR));
    assert_eq!(breakdown.tax, Money::from_minor(333, INR));
    assert_eq!(breakdown.total, Money::from_minor(1783, INR));

    Ok(())
}

#[test]
fn repeated_lines_merge_by_canonical_variant() -> TestResult {
    let (fixture, storefront) = storefront(during_festival()?)?;

    let (aggregate, _) = storefront.quote("pickup", fixture.request("repeated")?)?;

    let quantities: Vec<(Option<&str>, u32)> = aggregate
        .lines()
        .iter()
        .map(|line| (line.variant_name(), line.quantity()))
        .collect();

    assert_eq!(quantities, [(Some("Indigo"), 2), (Some("Maroon"), 1)]);

    Ok(())
}

#[test]
fn placing_an_order_takes_stock_and_counts_sales() -> TestResult {
    let (fixture, mut storefront) = storefront(during_festival()?)?;

    let order = storefront.place_order(
        OrderHeader::new(OrderNumber::sequential(7), "asha", during_festival()?),
        "standard",
        fixture.request("festive")?,
    )?;

    let kurta = storefront
        .store()
        .catalog()
        .get_by_id(&ProductId::from("kurta"))
        .ok_or("kurta missing")?;

    assert_eq!(order.order_number().as_str(), "ORD-000007");
    assert_eq!(order.amount_due(), 2087);
    assert_eq!(order.payment_status(), PaymentStatus::Pending);
    assert_eq!(kurta.stock, 3);
    assert_eq!(kurta.sales_count, 14);
    assert_eq!(stock_of(storefront.store(), "scarf"), Some(1));

    Ok(())
}

#[test]
fn cancelling_an_order_restocks() -> TestResult {
    let (fixture, mut storefront) = storefront(during_festival()?)?;

    let order = storefront.place_order(
        OrderHeader::new("ORD-1", "asha", during_festival()?),
        "standard",
        fixture.request("festive")?,
    )?;

    let cancelled = storefront.apply_order_event(&order, OrderEvent::Cancelled)?;

    assert_eq!(cancelled.shipping_status(), ShippingStatus::Cancelled);
    assert_eq!(stock_of(storefront.store(), "kurta"), Some(5));
    assert_eq!(stock_of(storefront.store(), "scarf"), Some(2));

    Ok(())
}

#[test]
fn unavailable_products_are_rejected_by_name() -> TestResult {
    let (fixture, mut storefront) = storefront(during_festival()?)?;

    let cases = [
        ("sold_out", "diya", "Brass Diya is out of stock"),
        ("unlisted", "dupatta", "Chiffon Dupatta is not currently for sale"),
        ("too_many", "scarf", "Silk Scarf is only 2 left in stock"),
        ("discontinued", "shawl", "shawl is no longer sold"),
    ];

    for (request, product, message) in cases {
        let error = storefront
            .place_order(
                OrderHeader::new("ORD-X", "asha", during_festival()?),
                "standard",
                fixture.request(request)?,
            )
            .err()
            .ok_or_else(|| format!("{request} should be rejected"))?;

        let rejection = error.rejection();

        assert_eq!(rejection.kind, RejectionKind::ProductUnavailable, "{request}");
        assert_eq!(rejection.error, message, "{request}");
        assert_eq!(
            rejection.failing_product_id,
            Some(ProductId::from(product)),
            "{request}"
        );
    }

    assert_eq!(stock_of(storefront.store(), "scarf"), Some(2));

    Ok(())
}

#[test]
fn cart_flow_reserves_and_releases_stock() -> TestResult {
    let (_, mut storefront) = storefront(during_festival()?)?;
    let cart = Cart::new("asha", INR);

    let cart = storefront.add_to_cart(&cart, &LineRequest::new("kurta", 2).with_variant("Maroon"))?;
    let cart = storefront.add_to_cart(&cart, &LineRequest::new("scarf", 1))?;

    assert_eq!(stock_of(storefront.store(), "kurta"), Some(3));
    assert_eq!(stock_of(storefront.store(), "scarf"), Some(1));

    let kurta = LineKey::new("kurta", Some(VariantKey::new("#800000")));

    // Raising to 6 would need 4 more with only 3 left
    let error = storefront
        .update_cart_line(&cart, &kurta, 6)
        .err()
        .ok_or("over-stock update should fail")?;

    assert_eq!(error.rejection().kind, RejectionKind::InsufficientStock);
    assert_eq!(stock_of(storefront.store(), "kurta"), Some(3));

    let cart = storefront.update_cart_line(&cart, &kurta, 5)?;

    assert_eq!(stock_of(storefront.store(), "kurta"), Some(0));
    assert_eq!(cart.quantity_of(&kurta), 5);

    let cart = storefront.remove_cart_line(&cart, &kurta)?;

    assert_eq!(stock_of(storefront.store(), "kurta"), Some(5));
    assert_eq!(cart.len(), 1);

    Ok(())
}

#[test]
fn events_are_published_after_commit() -> TestResult {
    let (publisher, events) = ChannelPublisher::channel();
    let fixture = Fixture::from_set("storefront")?;
    let requests = fixture.request("festive")?.to_vec();

    let mut storefront = fixture.into_storefront(publisher, during_festival()?);

    let rejected = storefront.place_order(
        OrderHeader::new("ORD-0", "asha", during_festival()?),
        "overnight",
        &requests,
    );

    assert!(rejected.is_err(), "unknown shipping method");
    assert!(events.try_recv().is_err(), "nothing published on rejection");

    let order = storefront.place_order(
        OrderHeader::new("ORD-1", "asha", during_festival()?),
        "standard",
        &requests,
    )?;

    storefront.apply_order_event(&order, OrderEvent::PaymentCaptured)?;

    let published: Vec<StoreEvent> = events.try_iter().collect();

    assert!(
        matches!(
            published.as_slice(),
            [
                StoreEvent::OrderPlaced { total: 2087, .. },
                StoreEvent::OrderStatusChanged {
                    payment: PaymentStatus::Captured,
                    ..
                },
            ]
        ),
        "{published:?}"
    );

    Ok(())
}
