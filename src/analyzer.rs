// src/analyzer.rs
//
// Orchestrates one analysis run: fetch the seed's summary and recent
// transactions, pull per-transaction detail with pacing, then aggregate
// and build every projection. A failed detail fetch drops only that
// transaction; the run continues with partial data.
use chrono::Utc;
use eyre::Result;
use rust_decimal::Decimal;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::aggregator;
use crate::config::Config;
use crate::esplora::{self, AddressInfo, Tx};
use crate::models::{sats_u64_to_btc, AddressStats, BubbleData, Metadata, Report};
use crate::report;

/// The persisted report keeps every analyzed transaction; the "recent"
/// section shows only the newest few
const RECENT_TX_LIMIT: usize = 10;

/// One completed analysis: the persistable report plus the bubble
/// projection, built from the same aggregation pass
pub struct Analysis {
    pub report: Report,
    pub bubble_map: BubbleData,
}

pub fn address_stats(info: &AddressInfo) -> AddressStats {
    let stats = &info.chain_stats;
    let total_received_btc = sats_u64_to_btc(stats.funded_txo_sum);
    let total_sent_btc = sats_u64_to_btc(stats.spent_txo_sum);
    let average = if stats.tx_count > 0 {
        (total_received_btc + total_sent_btc) / Decimal::from(stats.tx_count * 2)
    } else {
        Decimal::ZERO
    };

    AddressStats {
        total_received_btc,
        total_sent_btc,
        current_balance_btc: total_received_btc - total_sent_btc,
        transaction_count: stats.tx_count,
        average_transaction_size_btc: average,
    }
}

/// Aggregate a fetched transaction batch and build every projection.
/// Pure: all network work happens before this point.
pub fn build_analysis(
    address: &str,
    info: AddressInfo,
    transactions: Vec<Tx>,
    transactions_requested: usize,
    api_source: &str,
) -> Analysis {
    let stats = address_stats(&info);
    let transactions_analyzed = transactions.len();

    let (flows, edges) = aggregator::aggregate(address, &transactions);

    // Over the full history the seed's net flow equals the chain balance;
    // a bounded window only covers the most recent transactions
    if let Some(seed_flow) = flows.get(address) {
        let window_balance = crate::models::sats_to_btc(seed_flow.net_flow_sats());
        if transactions_analyzed as u64 >= stats.transaction_count
            && window_balance != stats.current_balance_btc
        {
            warn!(
                "Aggregated net flow {} BTC disagrees with chain balance {} BTC",
                window_balance, stats.current_balance_btc
            );
        }
    }

    let bubble_map = report::bubble_data(&flows, address);
    let clustering_analysis = aggregator::clustering(address, &transactions);
    let network_graph = report::network_data(&flows, &edges, address);
    let transaction_timeline = report::timeline_data(address, &transactions);
    let mut recent_transactions = report::process_transactions(address, &transactions);
    recent_transactions.truncate(RECENT_TX_LIMIT);

    let report = Report {
        address_stats: stats,
        address_info: info,
        recent_transactions,
        all_transactions: transactions,
        clustering_analysis,
        network_graph,
        transaction_timeline,
        metadata: Metadata {
            address: address.to_string(),
            analysis_timestamp: Utc::now(),
            api_source: api_source.to_string(),
            transactions_requested,
            transactions_analyzed,
        },
    };

    Analysis { report, bubble_map }
}

/// Run a full analysis for one address. Fails only if the seed itself
/// cannot be fetched; individual transaction failures are skipped.
pub async fn run_analysis(cfg: &Config, address: &str) -> Result<Analysis> {
    esplora::validate_address(address)?;

    info!("Analyzing address {}", address);
    let info = esplora::get_address_info(&cfg.esplora_url, address).await?;
    let stats = address_stats(&info);
    info!(
        "Balance {} BTC over {} transactions",
        stats.current_balance_btc, stats.transaction_count
    );

    let recent = esplora::get_address_txs(&cfg.esplora_url, address).await?;
    let requested: Vec<&Tx> = recent.iter().take(cfg.max_transactions).collect();
    let transactions_requested = requested.len();

    // Re-fetch each transaction for full detail, pacing requests to stay
    // inside the public API's rate limits
    let mut transactions: Vec<Tx> = Vec::with_capacity(transactions_requested);
    for tx in &requested {
        match esplora::get_transaction(&cfg.esplora_url, &tx.txid).await {
            Ok(detail) => transactions.push(detail),
            Err(e) => warn!("Skipping tx {}: {}", tx.txid, e),
        }
        sleep(Duration::from_millis(cfg.request_delay_ms)).await;
    }
    info!(
        "Analyzed {}/{} transactions",
        transactions.len(),
        transactions_requested
    );

    Ok(build_analysis(
        address,
        info,
        transactions,
        transactions_requested,
        &cfg.esplora_url,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esplora::{ChainStats, TxStatus, Vin, Vout};

    fn info(address: &str) -> AddressInfo {
        AddressInfo {
            address: address.to_string(),
            chain_stats: ChainStats::default(),
            mempool_stats: None,
        }
    }

    fn transfer(txid: &str, from: &str, to: &str, value: u64) -> Tx {
        Tx {
            txid: txid.to_string(),
            fee: 0,
            status: TxStatus {
                confirmed: true,
                block_height: None,
                block_time: Some(1_700_000_000),
            },
            vin: vec![Vin {
                prevout: Some(Vout {
                    scriptpubkey_address: Some(from.to_string()),
                    value,
                }),
                is_coinbase: false,
            }],
            vout: vec![Vout {
                scriptpubkey_address: Some(to.to_string()),
                value,
            }],
        }
    }

    #[test]
    fn address_stats_from_chain_stats() {
        let info = AddressInfo {
            address: "1Seed".to_string(),
            chain_stats: ChainStats {
                funded_txo_count: 2,
                funded_txo_sum: 300_000_000,
                spent_txo_count: 1,
                spent_txo_sum: 100_000_000,
                tx_count: 2,
            },
            mempool_stats: None,
        };
        let stats = address_stats(&info);
        assert_eq!(stats.total_received_btc.to_string(), "3.00000000");
        assert_eq!(stats.current_balance_btc.to_string(), "2.00000000");
        assert_eq!(stats.transaction_count, 2);
        assert_eq!(stats.average_transaction_size_btc, Decimal::ONE);
    }

    #[test]
    fn zero_tx_address_has_zero_average() {
        let stats = address_stats(&info("1Empty"));
        assert_eq!(stats.average_transaction_size_btc, Decimal::ZERO);
        assert_eq!(stats.current_balance_btc, Decimal::ZERO);
    }

    #[test]
    fn recent_transactions_capped_while_all_are_kept() {
        let txs: Vec<Tx> = (0..12)
            .map(|i| transfer(&format!("t{}", i), "seed", "peer", 100))
            .collect();
        let analysis = build_analysis("seed", info("seed"), txs, 12, "http://localhost");

        assert_eq!(analysis.report.all_transactions.len(), 12);
        assert_eq!(analysis.report.recent_transactions.len(), RECENT_TX_LIMIT);
        assert_eq!(analysis.report.metadata.transactions_analyzed, 12);
    }

    #[test]
    fn bubble_and_network_come_from_one_aggregation_pass() {
        let txs = vec![transfer("t1", "seed", "peer", 500_000_000)];
        let analysis = build_analysis("seed", info("seed"), txs, 1, "http://localhost");

        // Same flow map feeds both projections: identical node sets
        let bubble_addrs: Vec<&str> = analysis
            .bubble_map
            .points
            .iter()
            .map(|p| p.address.as_str())
            .collect();
        let node_ids: Vec<&str> = analysis
            .report
            .network_graph
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(bubble_addrs, node_ids);
        assert_eq!(analysis.bubble_map.main_address, "seed");
        assert_eq!(analysis.report.network_graph.graph_metrics.total_nodes, 2);
    }
}
