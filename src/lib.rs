//! Tally
//!
//! Tally is the pricing and inventory core of a storefront backend. It resolves effective
//! prices from product and tag discounts, aggregates cart and order lines into totals,
//! and reconciles stock as signed directives that a persistence layer applies atomically.
//!
//! Every calculation is a pure function over already-loaded records. Mutations are
//! expressed as [`inventory::StockDirective`]s and handed to a [`store::ProductStore`],
//! so the arithmetic can be tested without a database.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod cli;
pub mod discounts;
pub mod events;
pub mod fixtures;
pub mod inventory;
pub mod lines;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod products;
pub mod receipt;
pub mod rejection;
pub mod store;
pub mod storefront;
pub mod tags;
