use std::env;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use fapi_trader::{
    BinanceClient, ClientConfig, Credentials, ErrorHandler, OrderService, Submission,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  place_order ping
  place_order <SYMBOL> <BUY|SELL> <MARKET|LIMIT> <QUANTITY> [PRICE] [--dry-run]";

fn load_client() -> Result<(BinanceClient, ClientConfig)> {
    let api_key = env::var("BINANCE_API_KEY").context("BINANCE_API_KEY is not set")?;
    let api_secret = env::var("BINANCE_API_SECRET").context("BINANCE_API_SECRET is not set")?;
    let config = match env::var("BINANCE_BASE_URL") {
        Ok(url) => ClientConfig::new(url),
        Err(_) => ClientConfig::default(),
    };

    let client = BinanceClient::new(Credentials::new(api_key, api_secret), config.clone())?;
    Ok((client, config))
}

fn ping() -> Result<()> {
    let (client, config) = load_client()?;
    println!("Base URL: {}", config.base_url);
    match client.test_connectivity() {
        Ok(_) => println!("Connection successful"),
        Err(e) => bail!(ErrorHandler::render_exchange(&e)),
    }
    client.close();
    Ok(())
}

fn place(args: &[String]) -> Result<()> {
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let fields: Vec<&str> = args
        .iter()
        .filter(|a| *a != "--dry-run")
        .map(String::as_str)
        .collect();
    if fields.len() < 4 || fields.len() > 5 {
        bail!(USAGE);
    }

    let config = ClientConfig::default();
    let service = OrderService::from_config(&config);
    let request = service
        .create_order_request(fields[0], fields[1], fields[2], fields[3], fields.get(4).copied())
        .map_err(|e| anyhow::anyhow!(ErrorHandler::render_validation(&e)))?;

    println!("ORDER REQUEST SUMMARY\n{}\n", request);

    if dry_run {
        println!("DRY RUN MODE: order not sent to exchange.");
        return Ok(());
    }

    let (client, _) = load_client()?;
    let outcome = service
        .submit(&client, request, false)
        .map_err(|e| anyhow::anyhow!(ErrorHandler::render_order(&e)))?;
    client.close();

    if let Submission::Placed(response) = outcome {
        println!("ORDER RESPONSE\n{}", response);
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("ping") => ping(),
        Some(_) => place(&args),
        None => {
            println!("{}", USAGE);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}", e);
            ExitCode::FAILURE
        }
    }
}
