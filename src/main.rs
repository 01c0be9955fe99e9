use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use tracing::{info, warn};

use trading_proxy::config::Settings;
use trading_proxy::exchange::{BinanceSpot, Exchange};
use trading_proxy::fees::{self, BinanceFeeCollector, FeeCollector, FeePoint, RatioCalculator};
use trading_proxy::proxy::{ApiProxy, ExchangeConfig, Params, ProxyError};

#[derive(Parser)]
#[command(name = "trading-proxy")]
#[command(about = "Authenticated API proxy for crypto exchanges")]
enum Commands {
    /// Check connectivity to an exchange's public API
    Ping {
        #[arg(short, long, default_value = "binance")]
        exchange: String,
    },
    /// Print the current Binance spot price for a symbol
    Price {
        #[arg(short, long, default_value = "BTCUSD")]
        symbol: String,
    },
    /// Connect a Binance spot client and show the latest candle
    Candle {
        #[arg(short, long, default_value = "USD")]
        currency: String,
        #[arg(short, long, default_value = "BTC")]
        asset: String,
        /// Candle interval in minutes
        #[arg(short, long, default_value = "5")]
        interval: u32,
    },
    /// Run one fee-collection epoch and print ratio-based predictions
    Fees {
        #[arg(short, long, default_value = "BTC")]
        base: String,
        #[arg(short, long, default_value = "USD")]
        quote: String,
        /// Transaction amounts (USD) to predict fees for
        #[arg(short, long)]
        amount: Vec<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let settings = Settings::new().unwrap_or_default();

    match Commands::parse() {
        Commands::Ping { exchange } => ping(&exchange).await?,
        Commands::Price { symbol } => price(&symbol, &settings).await?,
        Commands::Candle {
            currency,
            asset,
            interval,
        } => candle(&currency, &asset, interval, &settings).await?,
        Commands::Fees {
            base,
            quote,
            amount,
        } => collect_fees(&base, &quote, amount, &settings).await?,
    }

    Ok(())
}

async fn ping(exchange: &str) -> anyhow::Result<()> {
    // Public endpoints only; empty credentials are fine here.
    let (config, endpoint) = match exchange {
        "binance" => (ExchangeConfig::binance("", "", false), "/api/v3/ping"),
        "kraken" => (ExchangeConfig::kraken("", ""), "/0/public/Time"),
        "coinbase" => (ExchangeConfig::coinbase("", "", ""), "/v2/time"),
        "gemini" => (ExchangeConfig::gemini("", "", false), "/v1/symbols"),
        other => anyhow::bail!("unknown exchange: {}", other),
    };

    println!("Connecting to {} exchange...", exchange);
    let proxy = ApiProxy::new(config)?;
    match proxy.make_public_request("GET", endpoint, None, None).await {
        Ok(_) => println!("Connected."),
        Err(e) => println!("Could not establish connection to {}: {}", exchange, e),
    }
    proxy.close();

    Ok(())
}

async fn price(symbol: &str, settings: &Settings) -> anyhow::Result<()> {
    let creds = settings.binance_or_public();
    let proxy = ApiProxy::new(ExchangeConfig::binance(creds.api_key, creds.api_secret, false))?;

    let mut params = Params::new();
    params.insert(
        "symbol".to_string(),
        serde_json::Value::String(symbol.to_uppercase()),
    );
    let response = proxy
        .make_public_request("GET", "/api/v3/ticker/price", Some(params), None)
        .await?;

    match response.get("price").and_then(serde_json::Value::as_str) {
        Some(price) => println!("{}: {}", symbol.to_uppercase(), price),
        None => {
            return Err(ProxyError::InvalidResponse(
                "missing price in ticker response".to_string(),
            )
            .into())
        }
    }
    proxy.close();

    Ok(())
}

async fn candle(
    currency: &str,
    asset: &str,
    interval: u32,
    settings: &Settings,
) -> anyhow::Result<()> {
    let creds = settings.binance_or_public();
    let has_credentials = !creds.api_key.is_empty();
    let client = BinanceSpot::new(creds.api_key, creds.api_secret, currency, asset)?;

    println!("Connecting to binance exchange...");
    if !client.connectivity_status().await {
        println!("Could not establish connection to binance exchange");
        return Ok(());
    }
    println!("Connected.");

    if has_credentials {
        let status = client.account_status().await?;
        println!("Account status:\n{}", serde_json::to_string_pretty(&status)?);
    } else {
        info!("no API credentials configured, skipping account status");
    }

    let candle = client.candle_stick_data(interval).await?;
    println!(
        "{} latest {}m candle: open {} high {} low {} close {} volume {}",
        client.currency_asset(),
        interval,
        candle.open_price,
        candle.high_price,
        candle.low_price,
        candle.close_price,
        candle.volume
    );

    Ok(())
}

async fn collect_fees(
    base: &str,
    quote: &str,
    amounts: Vec<f64>,
    settings: &Settings,
) -> anyhow::Result<()> {
    let creds = settings.binance_or_public();
    let collector = BinanceFeeCollector::new(creds.api_key, creds.api_secret, base, quote)?;

    let coin_price = collector.current_price().await?;
    info!("current {} price: ${:.2}", collector.symbol(), coin_price);

    let sizes = fees::transaction_sizes(coin_price);
    info!(
        "{}: testing {} sizes from ${:.2} to ${:.2}",
        collector.name(),
        sizes.len(),
        sizes.first().copied().unwrap_or_default(),
        sizes.last().copied().unwrap_or_default()
    );

    let mut fee_points = Vec::new();
    for size in sizes {
        match collector.trading_fee(size).await {
            Ok(fee) => fee_points.push(FeePoint {
                transaction_size: size,
                fee,
                timestamp: Utc::now(),
                exchange: collector.name().to_string(),
            }),
            Err(e) if e.is_recoverable() => {
                warn!("skipping ${:.0}: {}", size, e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let mut calculator = RatioCalculator::new();
    let ratios = calculator.calculate_ratios(&fee_points, collector.name());
    let (average, count) = RatioCalculator::epoch_average(&ratios);
    calculator.store_ratios(collector.name(), ratios);

    println!(
        "{} epoch average ratio: {:.4} (from {} ratios over {} fee points)",
        collector.name(),
        average,
        count,
        fee_points.len()
    );

    let amounts = if amounts.is_empty() {
        vec![1_000.0, 10_000.0, 100_000.0]
    } else {
        amounts
    };
    for amount in amounts {
        println!(
            "predicted fee for ${:.2}: ${:.4}",
            amount,
            RatioCalculator::predict_fee(amount, average)
        );
    }

    Ok(())
}
