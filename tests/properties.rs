//! Properties that hold across ranges of inputs rather than single examples.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::INR};
use testresult::TestResult;

use tally::prelude::*;

fn tagged(price: i64, discount: Option<u32>, tags: &[&str]) -> Product<'static> {
    let product = Product::new("tee", "Tee", Money::from_minor(price, INR), 10)
        .with_tags(StringTagCollection::from_strs(tags));

    match discount {
        Some(points) => product.with_discount(points),
        None => product,
    }
}

#[test]
fn resolving_twice_gives_the_same_price() -> TestResult {
    let product = tagged(1999, Some(15), &["sale", "summer"]);
    let active: ActiveTagDiscounts = [
        ("sale".to_string(), DiscountPercent::new(10)?),
        ("summer".to_string(), DiscountPercent::new(25)?),
    ]
    .into_iter()
    .collect();

    let first = resolve_price(&product, &active)?;
    let second = resolve_price(&product, &active)?;

    assert_eq!(first, second);
    assert_eq!(first.applied_discount.points(), Decimal::from(25));

    Ok(())
}

#[test]
fn larger_discount_never_raises_the_price() -> TestResult {
    for price in [1, 99, 1000, 1999, 123_457] {
        let mut last = i64::MAX;

        for points in 0..=100_u32 {
            let resolved = resolve_price(&tagged(price, Some(points), &[]), &ActiveTagDiscounts::none())?;
            let effective = resolved.effective_price.to_minor_units();

            assert!(
                effective <= last,
                "{points}% on {price} gave {effective}, more than {last}"
            );
            assert!(
                (0..=price).contains(&effective),
                "{points}% on {price} gave {effective}"
            );

            last = effective;
        }

        assert_eq!(last, 0, "100% off {price} should be free");
    }

    Ok(())
}

#[test]
fn tag_and_product_discounts_do_not_stack() -> TestResult {
    let product = tagged(1000, Some(20), &["sale"]);

    for points in [0, 10, 20, 30, 90] {
        let active: ActiveTagDiscounts = [("sale".to_string(), DiscountPercent::new(points)?)]
            .into_iter()
            .collect();

        let resolved = resolve_price(&product, &active)?;
        let expected = Decimal::from(points.max(20));

        assert_eq!(
            resolved.applied_discount.points(),
            expected,
            "tag at {points}% against product at 20%"
        );
    }

    Ok(())
}

#[test]
fn accepted_changes_never_take_stock_below_zero() {
    let product = ProductId::from("tee");

    for stock in 0..=6_u32 {
        for previous in 0..=6_u32 {
            for new in 0..=12_u32 {
                let outcome = reconcile(&product, None, previous, new, stock);

                if let Some(directive) = outcome.directive() {
                    assert!(
                        i64::from(stock) + directive.stock_delta >= 0,
                        "{previous} -> {new} with {stock} in stock went negative"
                    );
                    assert_eq!(
                        directive.stock_delta, -directive.sales_count_delta,
                        "stock and sales move in opposite directions"
                    );
                }

                if let Some(rejection) = &outcome.rejection {
                    assert!(new > previous, "decreases are never rejected");
                    assert!(
                        rejection.max_quantity < new,
                        "max quantity {} should be below the rejected {new}",
                        rejection.max_quantity
                    );
                    assert!(
                        reconcile(&product, None, previous, rejection.max_quantity, stock)
                            .is_accepted(),
                        "max quantity itself should be accepted"
                    );
                }
            }
        }
    }
}

#[test]
fn totals_decompose_for_every_shipping_method() -> TestResult {
    let catalog = Catalog::with_products([
        tagged(1299, Some(10), &["sale"]),
        Product::new("mug", "Mug", Money::from_minor(450, INR), 10),
    ])?;

    let active: ActiveTagDiscounts = [("sale".to_string(), DiscountPercent::new(30)?)]
        .into_iter()
        .collect();

    let shipping: ShippingMethods<'_> = [
        ShippingMethod::new("free", "Free", Money::from_minor(0, INR)),
        ShippingMethod::new("standard", "Standard", Money::from_minor(100, INR)).with_gst(18),
        ShippingMethod::new("express", "Express", Money::from_minor(350, INR)).with_gst(28),
    ]
    .into_iter()
    .collect();

    for method in shipping.iter() {
        let (aggregate, breakdown) = quote(
            &catalog,
            &active,
            &shipping,
            &method.code,
            &[LineRequest::new("tee", 3), LineRequest::new("mug", 2)],
        )?;

        let line_sum: i64 = aggregate
            .lines()
            .iter()
            .map(|line| line.line_total().to_minor_units())
            .sum();

        let savings: i64 = aggregate.lines().iter().map(LineSnapshot::savings_minor).sum();

        let body = breakdown.to_body();

        assert_eq!(body.subtotal, line_sum, "{}", method.code);
        assert_eq!(body.discount, savings, "{}", method.code);
        assert_eq!(
            body.total,
            body.subtotal + body.shipping + body.tax - body.discount,
            "{}",
            method.code
        );
    }

    Ok(())
}

#[test]
fn replacing_a_cart_with_its_own_lines_changes_nothing() -> TestResult {
    let catalog = Catalog::with_products([
        Product::new("kurta", "Kurta", Money::from_minor(1000, INR), 5)
            .with_variant(ColorVariant::new("Indigo", Some("#3F51B5")))
            .with_variant(ColorVariant::new("Maroon", Some("#800000"))),
        Product::new("mug", "Mug", Money::from_minor(450, INR), 3),
    ])?;

    let discounts = ActiveTagDiscounts::none();
    let cart = Cart::new("user-1", INR)
        .replace(
            &catalog,
            &discounts,
            &[
                LineRequest::new("kurta", 2).with_variant("indigo"),
                LineRequest::new("kurta", 1).with_variant("#800000"),
                LineRequest::new("mug", 3),
            ],
        )?
        .cart;

    let again = cart.replace(&catalog, &discounts, &cart.requests())?;

    assert!(again.directives.is_empty(), "{:?}", again.directives);
    assert_eq!(again.cart.lines(), cart.lines());

    Ok(())
}

#[test]
fn rejected_directives_leave_the_store_untouched() -> TestResult {
    let mut store = MemoryStore::new(Catalog::with_products([
        Product::new("a", "A", Money::from_minor(100, INR), 2),
        Product::new("b", "B", Money::from_minor(100, INR), 1),
    ])?);

    let result = store.apply(&[
        StockDirective::for_delta("a", 2),
        StockDirective::for_delta("b", 2),
    ]);

    assert!(result.is_err(), "b only has 1 in stock");
    assert_eq!(store.catalog().stock_of(&ProductId::from("a")), Some(2));
    assert_eq!(store.catalog().stock_of(&ProductId::from("b")), Some(1));

    Ok(())
}
