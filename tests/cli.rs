//! End-to-end runs of the command line over the `storefront` fixture set.

use clap::Parser;
use serde_json::{Value, json};
use testresult::TestResult;

use tally::cli::{Cli, Outcome, run};

fn run_args(args: &[&str]) -> Result<(Outcome, String), Box<dyn std::error::Error>> {
    let cli = Cli::try_parse_from(args)?;
    let mut out = Vec::<u8>::new();
    let outcome = run(&cli, &mut out)?;

    Ok((outcome, String::from_utf8(out)?))
}

#[test]
fn quote_prints_totals_body() -> TestResult {
    let (outcome, out) = run_args(&[
        "tally",
        "--json",
        "quote",
        "--request",
        "festive",
        "--at",
        "2025-10-20T12:00:00Z",
    ])?;

    let body: Value = serde_json::from_str(&out)?;

    assert_eq!(outcome, Outcome::Done, "{out}");
    assert_eq!(body.pointer("/totals/total"), Some(&json!(2087)), "{out}");
    assert_eq!(body.pointer("/totals/currency"), Some(&json!("INR")), "{out}");
    assert_eq!(
        body.pointer("/lines/0/colorVariant"),
        Some(&json!("#3f51b5")),
        "{out}"
    );

    Ok(())
}

#[test]
fn checkout_prints_receipt() -> TestResult {
    let (outcome, out) = run_args(&[
        "tally",
        "checkout",
        "--request",
        "festive",
        "--shipping",
        "express",
        "--order-number",
        "ORD-000042",
        "--at",
        "2025-10-20T12:00:00Z",
    ])?;

    assert_eq!(outcome, Outcome::Done, "{out}");
    assert!(out.contains("Order ORD-000042"), "{out}");
    assert!(out.contains("Cotton Kurta"), "{out}");
    assert!(out.contains("Shipping (Express, 2 days)"), "{out}");

    Ok(())
}

#[test]
fn checkout_json_reports_remaining_stock() -> TestResult {
    let (outcome, out) = run_args(&[
        "tally",
        "--json",
        "checkout",
        "--request",
        "festive",
        "--at",
        "2025-10-20T12:00:00Z",
    ])?;

    let body: Value = serde_json::from_str(&out)?;

    assert_eq!(outcome, Outcome::Done, "{out}");
    assert_eq!(body.pointer("/paymentStatus"), Some(&json!("pending")), "{out}");
    assert_eq!(
        body.pointer("/stock/0"),
        Some(&json!({"productId": "kurta", "stock": 3, "salesCount": 14})),
        "{out}"
    );

    Ok(())
}

#[test]
fn rejected_checkout_prints_rejection() -> TestResult {
    let (outcome, out) = run_args(&["tally", "--json", "checkout", "--request", "sold_out"])?;

    let body: Value = serde_json::from_str(&out)?;

    assert_eq!(outcome, Outcome::Rejected, "{out}");
    assert_eq!(
        body,
        json!({
            "kind": "product_unavailable",
            "error": "Brass Diya is out of stock",
            "failingProductId": "diya",
        })
    );

    Ok(())
}

#[test]
fn price_reports_discount_source() -> TestResult {
    let (outcome, out) = run_args(&[
        "tally",
        "price",
        "--product",
        "scarf",
        "--at",
        "2025-10-20T12:00:00Z",
    ])?;

    assert_eq!(outcome, Outcome::Done, "{out}");
    assert!(out.contains("Silk Scarf"), "{out}");
    assert!(out.contains("10% from product discount"), "{out}");

    Ok(())
}

#[test]
fn missing_fixture_set_is_an_error() -> TestResult {
    let cli = Cli::try_parse_from(["tally", "quote", "--set", "nope", "--request", "festive"])?;

    assert!(run(&cli, &mut Vec::<u8>::new()).is_err(), "unknown set should fail");

    Ok(())
}
