use dotenvy::dotenv;
use eyre::Result;
use std::env;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub esplora_url: String,
    pub port: u16,
    pub max_transactions: usize,
    pub request_delay_ms: u64,
    pub output_dir: String,
}

pub fn load() -> Result<Config> {
    dotenv().ok();

    let esplora_url = env::var("ESPLORA_URL")
        .unwrap_or_else(|_| "https://blockstream.info/api".to_string());

    // Transactions fetched per analysis (default: 30)
    let max_transactions = env::var("MAX_TRANSACTIONS")
        .unwrap_or_else(|_| "30".to_string())
        .parse()
        .unwrap_or(30);

    // Pause between tx-detail requests, in milliseconds (default: 100)
    let request_delay_ms = env::var("REQUEST_DELAY_MS")
        .unwrap_or_else(|_| "100".to_string())
        .parse()
        .unwrap_or(100);

    // API port (default: 5001)
    let port = env::var("PORT")
        .unwrap_or_else(|_| "5001".to_string())
        .parse()
        .unwrap_or(5001);

    // Where bitcoin_analysis_*.json reports are written (default: cwd)
    let output_dir = env::var("OUTPUT_DIR").unwrap_or_else(|_| ".".to_string());

    let cfg = Config {
        esplora_url,
        port,
        max_transactions,
        request_delay_ms,
        output_dir,
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}
