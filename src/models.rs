// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::aggregator::ClusteringAnalysis;
use crate::esplora::{AddressInfo, Tx};

/// Convert satoshis to BTC. Conversion happens only at presentation time;
/// all aggregation runs on integer satoshis.
pub fn sats_to_btc(sats: i64) -> Decimal {
    Decimal::new(sats, 8)
}

// Total BTC supply fits in i64 satoshis with room to spare
pub fn sats_u64_to_btc(sats: u64) -> Decimal {
    Decimal::new(sats as i64, 8)
}

/// Shorten an address for chart labels: "1A1zP1eP...7DivfNa"
pub fn short_address(address: &str) -> String {
    if address.len() > 16 {
        format!("{}...{}", &address[..8], &address[address.len() - 8..])
    } else {
        address.to_string()
    }
}

/// Bubble/node color classes. Every non-primary address is exactly one of
/// positive, negative, or neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeClass {
    Primary,
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxDirection {
    Received,
    Sent,
}

/// Headline numbers from /address/{address}, converted for display
#[derive(Debug, Clone, Serialize)]
pub struct AddressStats {
    pub total_received_btc: Decimal,
    pub total_sent_btc: Decimal,
    pub current_balance_btc: Decimal,
    pub transaction_count: u64,
    pub average_transaction_size_btc: Decimal,
}

/// One analyzed transaction, seed-relative
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedTransaction {
    pub txid: String,
    pub confirmed: bool,
    pub block_time: Option<i64>,
    pub formatted_time: Option<String>,
    pub amount_in_sats: u64,
    pub amount_out_sats: u64,
    pub net_amount_sats: i64,
    pub net_amount_btc: Decimal,
    pub direction: TxDirection,
    pub fee_sats: u64,
    pub fee_btc: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BubblePoint {
    pub address: String,
    pub label: String,
    pub net_flow_btc: Decimal,
    pub total_volume_btc: Decimal,
    pub transaction_count: u64,
    pub size: f64,
    pub class: NodeClass,
}

#[derive(Debug, Clone, Serialize)]
pub struct BubbleData {
    pub main_address: String,
    pub points: Vec<BubblePoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub class: NodeClass,
    pub transaction_count: u64,
    pub size: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub weight_sats: u64,
    pub weight_btc: Decimal,
    pub transaction_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphMetrics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub related_addresses_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkGraph {
    pub main_address: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub graph_metrics: GraphMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelinePoint {
    pub txid: String,
    pub timestamp: i64,
    pub date: DateTime<Utc>,
    pub net_amount_btc: Decimal,
    pub cumulative_balance_btc: Decimal,
    pub direction: TxDirection,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyActivity {
    pub month: String, // "YYYY-MM"
    pub transaction_count: u64,
    pub total_received_btc: Decimal,
    pub total_sent_btc: Decimal,
    pub net_flow_btc: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineSummary {
    pub total_confirmed_transactions: usize,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionTimeline {
    pub address: String,
    pub points: Vec<TimelinePoint>,
    pub monthly_activity: Vec<MonthlyActivity>,
    pub summary_stats: TimelineSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub address: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub api_source: String,
    pub transactions_requested: usize,
    pub transactions_analyzed: usize,
}

/// Full analysis report, persisted as bitcoin_analysis_<prefix>.json
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub address_stats: AddressStats,
    pub address_info: AddressInfo,
    pub recent_transactions: Vec<ProcessedTransaction>,
    pub all_transactions: Vec<Tx>,
    pub clustering_analysis: ClusteringAnalysis,
    pub network_graph: NetworkGraph,
    pub transaction_timeline: TransactionTimeline,
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sats_convert_to_btc_at_scale_8() {
        assert_eq!(sats_to_btc(100_000_000).to_string(), "1.00000000");
        assert_eq!(sats_to_btc(-50_000_000).to_string(), "-0.50000000");
        assert_eq!(sats_u64_to_btc(1).to_string(), "0.00000001");
    }

    #[test]
    fn short_address_truncates_long_only() {
        assert_eq!(
            short_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"),
            "1A1zP1eP...v7DivfNa"
        );
        assert_eq!(short_address("shortaddr"), "shortaddr");
    }
}
