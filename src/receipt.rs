//! Receipt
//!
//! Invoice rendering for a placed order.

use std::io;

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{Alignment, Style, Theme, object::Columns},
};
use thiserror::Error;

use crate::{
    checkout::Breakdown,
    lines::LineSnapshot,
    orders::{Order, OrderNumber},
};

/// Errors that can occur when writing a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Writing to the output failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Printable summary of an order.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    order_number: OrderNumber,
    placed_at: Timestamp,
    shipping_method: String,
    estimated_days: u32,
    lines: SmallVec<[LineSnapshot<'a>; 8]>,
    breakdown: Breakdown<'a>,
}

impl<'a> Receipt<'a> {
    /// Build a receipt from an order's snapshots.
    #[must_use]
    pub fn from_order(order: &Order<'a>) -> Self {
        Self {
            order_number: order.order_number().clone(),
            placed_at: order.header().placed_at,
            shipping_method: order.shipping_method().name.clone(),
            estimated_days: order.shipping_method().estimated_days,
            lines: order.lines().iter().cloned().collect(),
            breakdown: *order.breakdown(),
        }
    }

    /// Grand total
    #[must_use]
    pub fn total(&self) -> Money<'a, Currency> {
        self.breakdown.total
    }

    /// Line totals before any discount.
    #[must_use]
    pub fn gross_subtotal(&self) -> Money<'a, Currency> {
        let gross = self
            .breakdown
            .subtotal
            .to_minor_units()
            .saturating_add(self.breakdown.discount.to_minor_units());

        Money::from_minor(gross, self.breakdown.subtotal.currency())
    }

    /// Discount as a fraction of the gross subtotal.
    #[must_use]
    pub fn savings_percent(&self) -> Percentage {
        let gross = self.gross_subtotal().to_minor_units();

        if gross == 0 {
            return Percentage::from(Decimal::ZERO);
        }

        let savings = Decimal::from(self.breakdown.discount.to_minor_units());

        Percentage::from(savings / Decimal::from(gross))
    }

    /// Write the receipt as a table followed by the totals.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::Io`] if the output cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        writeln!(out, "Order {} ({})", self.order_number, self.placed_at)?;

        let mut builder = Builder::default();

        builder.push_record(["Item", "Variant", "Qty", "Price", "Paid", "Savings"]);

        for line in &self.lines {
            let savings = Money::from_minor(line.savings_minor(), line.unit_price().currency());

            builder.push_record([
                line.name().to_string(),
                line.variant_name().unwrap_or_default().to_string(),
                line.quantity().to_string(),
                line.original_line_total().to_string(),
                line.line_total().to_string(),
                if line.discount_percent().is_zero() {
                    String::new()
                } else {
                    format!("({}) -{savings}", line.discount_percent())
                },
            ]);
        }

        let mut table = builder.build();
        let mut theme = Theme::from(Style::modern_rounded());

        theme.remove_horizontal_lines();
        theme.insert_horizontal_line(
            1,
            HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤')),
        );

        table.with(theme);
        table.modify(Columns::new(2..6), Alignment::right());

        writeln!(out, "{table}")?;

        let breakdown = &self.breakdown;
        let shipping_label = if self.estimated_days > 0 {
            format!("Shipping ({}, {} days)", self.shipping_method, self.estimated_days)
        } else {
            format!("Shipping ({})", self.shipping_method)
        };

        let rows = [
            ("Subtotal".to_string(), breakdown.subtotal.to_string()),
            (shipping_label, breakdown.shipping.to_string()),
            ("Tax".to_string(), breakdown.tax.to_string()),
            ("Discount".to_string(), format!("-{}", breakdown.discount)),
            ("Total".to_string(), breakdown.total.to_string()),
        ];

        let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or_default();
        let value_width = rows.iter().map(|(_, value)| value.chars().count()).max().unwrap_or_default();

        for (label, value) in &rows {
            writeln!(out, " {label:>label_width$}  {value:>value_width$}")?;
        }

        writeln!(out, " You saved {:.2}%", percent_points(self.savings_percent()))?;

        Ok(())
    }
}

/// Percent points for display from a fractional percentage.
fn percent_points(percentage: Percentage) -> Decimal {
    ((percentage * Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
}
