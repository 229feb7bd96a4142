mod aggregator;
mod analyzer;
mod api;
mod charts;
mod config;
mod esplora;
mod export;
mod models;
mod report;

use std::io::Write;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Bitcoin Flow Analyzer starting...");

    let cfg = config::load()?;
    info!("  Esplora URL: {}", cfg.esplora_url);
    info!("  Max transactions: {}", cfg.max_transactions);
    info!("  Request delay: {}ms", cfg.request_delay_ms);
    info!("  Output dir: {}", cfg.output_dir);
    info!("  Port: {}", cfg.port);

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("serve") => {
            let server = tokio::spawn(api::serve(cfg));
            tokio::select! {
                res = server => match res {
                    Ok(Ok(_)) => info!("API exited cleanly"),
                    Ok(Err(e)) => error!("API error: {:?}", e),
                    Err(e) => error!("API task panicked: {:?}", e),
                },
                _ = signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping...");
                }
            }
        }
        Some(address) => analyze_once(&cfg, address).await?,
        None => prompt_loop(&cfg).await,
    }

    info!("Bitcoin Flow Analyzer stopped.");
    Ok(())
}

async fn analyze_once(cfg: &config::Config, address: &str) -> eyre::Result<()> {
    let analysis = analyzer::run_analysis(cfg, address).await?;
    let json_path = export::write_report(&cfg.output_dir, &analysis.report)?;
    charts::write_charts(&cfg.output_dir, &analysis.report)?;

    println!(
        "Analysis complete: {}/{} transactions analyzed, report at {}",
        analysis.report.metadata.transactions_analyzed,
        analysis.report.metadata.transactions_requested,
        json_path.display()
    );
    Ok(())
}

/// Interactive mode: keep asking for addresses until 'quit'
async fn prompt_loop(cfg: &config::Config) {
    loop {
        print!("Enter Bitcoin address to analyze (or 'quit' to exit): ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            break;
        }
        let address = line.trim();
        if address.is_empty() {
            continue;
        }
        if address.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }

        if let Err(e) = esplora::validate_address(address) {
            println!("{}", e);
            continue;
        }

        match analyze_once(cfg, address).await {
            Ok(_) => {}
            Err(e) => error!("Analysis failed: {:?}", e),
        }
    }
}
