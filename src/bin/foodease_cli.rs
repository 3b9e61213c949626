use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use foodease_api::{
    auth::{AuthService, ADMIN_ROLE},
    config::{self, AppConfig, PricingConfig},
    models::{LineItem, OrderType, PaymentMethod},
    services::{PriceBreakdown, PricingCalculator},
};
use rust_decimal::Decimal;
use serde::Serialize;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Token(args) => handle_token(args, cli.json),
        Commands::Quote(args) => handle_quote(args, cli.json),
    }
}

#[derive(Parser)]
#[command(name = "foodease", about = "FoodEase operator tooling", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint an access token signed with the configured secret
    Token(TokenArgs),
    /// Price a cart with the configured fees
    Quote(QuoteArgs),
}

#[derive(Args)]
struct TokenArgs {
    #[arg(long, help = "User id placed in the token subject")]
    user: String,
    #[arg(long, action = ArgAction::SetTrue, help = "Grant the admin role")]
    admin: bool,
    #[arg(long, help = "Email used for order notifications")]
    email: Option<String>,
    #[arg(long, help = "Signing secret; defaults to the configured jwt_secret")]
    secret: Option<String>,
    #[arg(long, help = "Lifetime in seconds; defaults to the configured jwt_expiration")]
    ttl: Option<u64>,
}

#[derive(Args)]
struct QuoteArgs {
    #[arg(
        long = "item",
        required = true,
        help = "Cart line as name:price:quantity, repeatable"
    )]
    items: Vec<String>,
    #[arg(long, default_value = "0", help = "Promocode discount in rupees")]
    discount: Decimal,
    #[arg(long, value_enum, default_value_t = OrderKind::Regular)]
    order_type: OrderKind,
    #[arg(long, value_enum, default_value_t = PayWith::Online)]
    payment: PayWith,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderKind {
    Regular,
    Rush,
    Scheduled,
}

impl From<OrderKind> for OrderType {
    fn from(kind: OrderKind) -> Self {
        match kind {
            OrderKind::Regular => OrderType::Regular,
            OrderKind::Rush => OrderType::Rush,
            OrderKind::Scheduled => OrderType::Scheduled,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PayWith {
    Cod,
    Online,
    Partial,
}

impl From<PayWith> for PaymentMethod {
    fn from(method: PayWith) -> Self {
        match method {
            PayWith::Cod => PaymentMethod::Cod,
            PayWith::Online => PaymentMethod::Online,
            PayWith::Partial => PaymentMethod::Partial,
        }
    }
}

#[derive(Serialize)]
struct TokenOutput {
    user_id: String,
    roles: Vec<String>,
    token: String,
}

fn handle_token(args: TokenArgs, json: bool) -> Result<()> {
    let (secret, default_ttl) = match args.secret {
        Some(secret) => (secret, None),
        None => {
            let cfg = config::load_config()
                .context("no --secret given and configuration could not be loaded")?;
            (cfg.jwt_secret, Some(cfg.jwt_expiration))
        }
    };
    let ttl = args.ttl.or(default_ttl).unwrap_or(3600);

    let roles = if args.admin {
        vec![ADMIN_ROLE.to_string()]
    } else {
        Vec::new()
    };
    let token = AuthService::new(&secret, ttl)
        .issue_token(&args.user, roles.clone(), args.email)
        .map_err(|e| anyhow!("failed to mint token: {}", e))?;

    if json {
        print_json(&TokenOutput {
            user_id: args.user,
            roles,
            token,
        })?;
    } else {
        println!("{}", token);
    }
    Ok(())
}

fn handle_quote(args: QuoteArgs, json: bool) -> Result<()> {
    let pricing = match config::load_config() {
        Ok(AppConfig { pricing, .. }) => pricing,
        Err(e) => {
            eprintln!("warning: using default pricing ({})", e);
            PricingConfig::default()
        }
    };
    let items = args
        .items
        .iter()
        .map(|raw| parse_item(raw))
        .collect::<Result<Vec<_>>>()?;

    let breakdown = PricingCalculator::from_config(&pricing)
        .quote(
            &items,
            args.discount,
            args.order_type.into(),
            args.payment.into(),
        )
        .map_err(|e| anyhow!("{}", e))?;

    if json {
        print_json(&breakdown)?;
    } else {
        render_breakdown(&breakdown);
    }
    Ok(())
}

fn parse_item(raw: &str) -> Result<LineItem> {
    let mut parts = raw.rsplitn(3, ':');
    let (Some(quantity), Some(price), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        bail!("item '{}' must look like name:price:quantity", raw);
    };
    let unit_price = Decimal::from_str(price.trim())
        .with_context(|| format!("invalid price in item '{}'", raw))?;
    let quantity = quantity
        .trim()
        .parse::<u32>()
        .with_context(|| format!("invalid quantity in item '{}'", raw))?;
    Ok(LineItem {
        name: name.trim().to_string(),
        unit_price,
        quantity,
    })
}

fn render_breakdown(b: &PriceBreakdown) {
    println!("Subtotal        ₹{}", b.subtotal);
    println!("Discount       -₹{}", b.discount);
    println!("Service fee     ₹{}", b.service_fee);
    if !b.rush_surcharge.is_zero() {
        println!("Rush surcharge  ₹{}", b.rush_surcharge);
    }
    println!("Total           ₹{}", b.total);
    println!("Pay now         ₹{}", b.paid_amount);
    if !b.remaining_amount.is_zero() {
        println!("Due at pickup   ₹{}", b.remaining_amount);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
