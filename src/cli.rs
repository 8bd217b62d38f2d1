//! Command-line interface
//!
//! Runs quotes, checkouts and stock reconciliations against a fixture set, printing either a
//! table or the JSON bodies a storefront would receive.

use std::{io::Write, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jiff::Timestamp;
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::{
    checkout::{Breakdown, TotalsBody},
    discounts::ActiveTagDiscounts,
    events::NoopPublisher,
    fixtures::Fixture,
    inventory::{StockDirective, reconcile},
    lines::{Aggregate, LineError, LineSnapshot},
    orders::OrderHeader,
    pricing::{DiscountSource, resolve_price},
    products::{ProductId, VariantKey},
    receipt::Receipt,
    rejection::Rejection,
    store::ProductStore,
};

/// Tally command line
#[derive(Debug, Parser)]
#[command(name = "tally", about = "Storefront pricing and stock reconciliation", long_about = None)]
pub struct Cli {
    /// Directory holding the fixture sets
    #[arg(long, env = "TALLY_FIXTURES", default_value = "./fixtures")]
    pub fixtures: PathBuf,

    /// Print JSON bodies instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Logging settings
    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Price a named request without placing an order
    Quote(OrderArgs),

    /// Place an order for a named request and print the receipt
    Checkout(CheckoutArgs),

    /// Resolve the effective price of one product
    Price(PriceArgs),

    /// Reconcile a cart line quantity change against stock
    Reconcile(ReconcileArgs),
}

/// Selects a fixture set, a request from it and a shipping method.
#[derive(Debug, Args)]
pub struct OrderArgs {
    /// Fixture set name
    #[arg(short, long, default_value = "storefront")]
    pub set: String,

    /// Request name within the set
    #[arg(short, long)]
    pub request: String,

    /// Shipping method code
    #[arg(long, default_value = "standard")]
    pub shipping: String,

    /// Evaluate tag discounts at this instant instead of now
    #[arg(long)]
    pub at: Option<Timestamp>,
}

/// Checkout arguments
#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// Request selection
    #[command(flatten)]
    pub order: OrderArgs,

    /// Order number to assign
    #[arg(long, default_value = "ORD-000001")]
    pub order_number: String,

    /// Buyer
    #[arg(long, default_value = "guest")]
    pub user: String,
}

/// Price lookup arguments
#[derive(Debug, Args)]
pub struct PriceArgs {
    /// Fixture set name
    #[arg(short, long, default_value = "storefront")]
    pub set: String,

    /// Product id
    #[arg(short, long)]
    pub product: String,

    /// Evaluate tag discounts at this instant instead of now
    #[arg(long)]
    pub at: Option<Timestamp>,
}

/// Reconciliation arguments
#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Product id
    #[arg(short, long)]
    pub product: String,

    /// Colour variant
    #[arg(long)]
    pub variant: Option<String>,

    /// Quantity currently in the cart
    #[arg(long, default_value_t = 0)]
    pub previous: u32,

    /// Quantity requested
    #[arg(long)]
    pub new: u32,

    /// Units currently in stock
    #[arg(long)]
    pub stock: u32,
}

/// A priced line as printed by `quote --json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LineBody {
    product_id: ProductId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_variant: Option<VariantKey>,
    quantity: u32,
    unit_price: i64,
    original_price: i64,
    discount_percent: String,
    line_total: i64,
}

impl From<&LineSnapshot<'_>> for LineBody {
    fn from(line: &LineSnapshot<'_>) -> Self {
        Self {
            product_id: line.product_id().clone(),
            name: line.name().to_string(),
            color_variant: line.variant().cloned(),
            quantity: line.quantity(),
            unit_price: line.unit_price().to_minor_units(),
            original_price: line.original_price().to_minor_units(),
            discount_percent: line.discount_percent().points().to_string(),
            line_total: line.line_total().to_minor_units(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteBody {
    lines: Vec<LineBody>,
    totals: TotalsBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StockLevel {
    product_id: ProductId,
    stock: u32,
    sales_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderBody {
    order_number: String,
    payment_status: String,
    shipping_status: String,
    lines: Vec<LineBody>,
    totals: TotalsBody,
    stock: Vec<StockLevel>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceBody {
    product_id: ProductId,
    base_price: i64,
    effective_price: i64,
    applied_discount_percent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    discount_tag: Option<String>,
    currency: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileBody {
    accepted: bool,
    delta: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    directive: Option<StockDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection: Option<Rejection>,
}

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command succeeded.
    Done,

    /// The request was rejected; the rejection has been written.
    Rejected,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => ExitCode::SUCCESS,
            Outcome::Rejected => ExitCode::FAILURE,
        }
    }
}

/// Install the global tracing subscriber. Logs go to stderr.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(config: &LoggingArgs) -> Result<(), TryInitError> {
    match config.log_format {
        LogFormat::Compact => init_with_layer(
            config,
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_writer(std::io::stderr),
        ),
        LogFormat::Json => init_with_layer(
            config,
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_writer(std::io::stderr),
        ),
    }
}

fn init_with_layer<L>(config: &LoggingArgs, fmt_layer: L) -> Result<(), TryInitError>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
}

/// Run a command, writing its output to `out`.
///
/// Business rejections are written to `out` and reported as [`Outcome::Rejected`]; anything else
/// is returned as an error.
///
/// # Errors
///
/// Returns an error if the fixture set cannot be loaded or the output cannot be written.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<Outcome> {
    match &cli.command {
        Command::Quote(args) => run_quote(cli, args, out),
        Command::Checkout(args) => run_checkout(cli, args, out),
        Command::Price(args) => run_price(cli, args, out),
        Command::Reconcile(args) => run_reconcile(cli, args, out),
    }
}

fn load(cli: &Cli, set: &str) -> Result<Fixture<'static>> {
    Fixture::from_set_in(&cli.fixtures, set)
        .with_context(|| format!("failed to load fixture set '{set}'"))
}

fn run_quote(cli: &Cli, args: &OrderArgs, out: &mut impl Write) -> Result<Outcome> {
    let fixture = load(cli, &args.set)?;
    let requests = fixture.request(&args.request)?.to_vec();
    let storefront = fixture.into_storefront(NoopPublisher, args.at.unwrap_or_else(Timestamp::now));

    let (aggregate, breakdown) = match storefront.quote(&args.shipping, &requests) {
        Ok(quoted) => quoted,
        Err(error) => return write_rejection(cli, &error.rejection(), out),
    };

    if cli.json {
        let body = QuoteBody {
            lines: aggregate.lines().iter().map(LineBody::from).collect(),
            totals: breakdown.to_body(),
        };

        serde_json::to_writer_pretty(&mut *out, &body)?;
        writeln!(out)?;
    } else {
        write_quote(&aggregate, &breakdown, out)?;
    }

    Ok(Outcome::Done)
}

fn run_checkout(cli: &Cli, args: &CheckoutArgs, out: &mut impl Write) -> Result<Outcome> {
    let fixture = load(cli, &args.order.set)?;
    let requests = fixture.request(&args.order.request)?.to_vec();
    let placed_at = args.order.at.unwrap_or_else(Timestamp::now);
    let mut storefront = fixture.into_storefront(NoopPublisher, placed_at);

    let header = OrderHeader::new(args.order_number.as_str(), args.user.as_str(), placed_at);

    let order = match storefront.place_order(header, &args.order.shipping, &requests) {
        Ok(order) => order,
        Err(error) => return write_rejection(cli, &error.rejection(), out),
    };

    if cli.json {
        let catalog = storefront.store().catalog();
        let mut stock: Vec<StockLevel> = Vec::new();

        for line in order.lines() {
            if stock.iter().any(|level| level.product_id == *line.product_id()) {
                continue;
            }

            if let Some(product) = catalog.get_by_id(line.product_id()) {
                stock.push(StockLevel {
                    product_id: product.id.clone(),
                    stock: product.stock,
                    sales_count: product.sales_count,
                });
            }
        }

        let body = OrderBody {
            order_number: order.order_number().to_string(),
            payment_status: order.payment_status().to_string(),
            shipping_status: order.shipping_status().to_string(),
            lines: order.lines().iter().map(LineBody::from).collect(),
            totals: order.breakdown().to_body(),
            stock,
        };

        serde_json::to_writer_pretty(&mut *out, &body)?;
        writeln!(out)?;
    } else {
        Receipt::from_order(&order).write_to(&mut *out)?;
    }

    Ok(Outcome::Done)
}

fn run_price(cli: &Cli, args: &PriceArgs, out: &mut impl Write) -> Result<Outcome> {
    let fixture = load(cli, &args.set)?;
    let id = ProductId::from(args.product.as_str());

    let product = fixture
        .catalog()
        .get_by_id(&id)
        .with_context(|| format!("product '{id}' is not in set '{}'", args.set))?;

    let active = ActiveTagDiscounts::active_at(
        fixture.tag_discounts(),
        args.at.unwrap_or_else(Timestamp::now),
    );

    let resolved = match resolve_price(product, &active) {
        Ok(resolved) => resolved,
        Err(error) => {
            let rejection = Rejection::from(&LineError::from(error));

            return write_rejection(cli, &rejection, out);
        }
    };

    let discount_tag = match &resolved.source {
        DiscountSource::Tag(tag) => Some(tag.clone()),
        DiscountSource::Product | DiscountSource::None => None,
    };

    if cli.json {
        let body = PriceBody {
            product_id: id,
            base_price: resolved.base_price.to_minor_units(),
            effective_price: resolved.effective_price.to_minor_units(),
            applied_discount_percent: resolved.applied_discount.points().to_string(),
            discount_tag,
            currency: resolved.base_price.currency().iso_alpha_code.to_string(),
        };

        serde_json::to_writer_pretty(&mut *out, &body)?;
        writeln!(out)?;
    } else {
        let source = match &resolved.source {
            DiscountSource::None => "no discount".to_string(),
            DiscountSource::Product => "product discount".to_string(),
            DiscountSource::Tag(tag) => format!("tag '{tag}'"),
        };

        writeln!(
            out,
            "{}: {} -> {} ({} from {source})",
            product.name, resolved.base_price, resolved.effective_price, resolved.applied_discount
        )?;
    }

    Ok(Outcome::Done)
}

fn run_reconcile(cli: &Cli, args: &ReconcileArgs, out: &mut impl Write) -> Result<Outcome> {
    let id = ProductId::from(args.product.as_str());
    let variant = args.variant.as_deref().map(VariantKey::new);

    let reconciliation = reconcile(&id, variant.as_ref(), args.previous, args.new, args.stock);
    let accepted = reconciliation.is_accepted();

    let body = ReconcileBody {
        accepted,
        delta: reconciliation.delta,
        directive: reconciliation.directive(),
        rejection: reconciliation.rejection.as_ref().map(Rejection::from),
    };

    if cli.json {
        serde_json::to_writer_pretty(&mut *out, &body)?;
        writeln!(out)?;
    } else if let Some(rejection) = &body.rejection {
        writeln!(out, "rejected: {}", rejection.error)?;
    } else if let Some(directive) = &body.directive {
        writeln!(
            out,
            "accepted: stock {:+}, sales {:+}",
            directive.stock_delta, directive.sales_count_delta
        )?;
    } else {
        writeln!(out, "accepted: no change")?;
    }

    Ok(if accepted {
        Outcome::Done
    } else {
        Outcome::Rejected
    })
}

fn write_rejection(cli: &Cli, rejection: &Rejection, out: &mut impl Write) -> Result<Outcome> {
    if cli.json {
        serde_json::to_writer_pretty(&mut *out, rejection)?;
        writeln!(out)?;
    } else {
        writeln!(out, "rejected: {}", rejection.error)?;
    }

    Ok(Outcome::Rejected)
}

fn write_quote(
    aggregate: &Aggregate<'_>,
    breakdown: &Breakdown<'_>,
    out: &mut impl Write,
) -> Result<()> {
    let mut builder = Builder::default();

    builder.push_record(["Item", "Variant", "Qty", "Unit", "Discount", "Total"]);

    for line in aggregate.lines() {
        builder.push_record([
            line.name().to_string(),
            line.variant_name().unwrap_or_default().to_string(),
            line.quantity().to_string(),
            line.unit_price().to_string(),
            line.discount_percent().to_string(),
            line.line_total().to_string(),
        ]);
    }

    for (label, amount) in [
        ("Subtotal", breakdown.subtotal),
        ("Shipping", breakdown.shipping),
        ("Tax", breakdown.tax),
        ("Discount", breakdown.discount),
        ("Total", breakdown.total),
    ] {
        builder.push_record([
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            label.to_string(),
            amount.to_string(),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::psql());
    table.modify(Columns::new(2..6), Alignment::right());

    writeln!(out, "{table}")?;

    Ok(())
}
