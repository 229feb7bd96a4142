// src/aggregator.rs
//
// Core flow aggregation: walk each transaction's inputs (funds leaving)
// and outputs (funds arriving) and accumulate per-address totals in
// integer satoshis.
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowRecord {
    pub total_received_sats: u64,
    pub total_sent_sats: u64,
    pub transaction_count: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl FlowRecord {
    pub fn net_flow_sats(&self) -> i64 {
        self.total_received_sats as i64 - self.total_sent_sats as i64
    }

    pub fn total_volume_sats(&self) -> u64 {
        self.total_received_sats + self.total_sent_sats
    }

    fn touch(&mut self, seen: Option<DateTime<Utc>>) {
        self.transaction_count += 1;
        if let Some(ts) = seen {
            if self.first_seen.map_or(true, |f| ts < f) {
                self.first_seen = Some(ts);
            }
            if self.last_seen.map_or(true, |l| ts > l) {
                self.last_seen = Some(ts);
            }
        }
    }
}

pub type FlowMap = HashMap<String, FlowRecord>;

/// One input-address -> output-address transfer within a single transaction.
/// Kept only for graph rendering, deduplicated downstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub txid: String,
    pub value_sats: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Likelihood {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterEntry {
    pub address: String,
    pub connection_count: u64,
    pub likelihood: Likelihood,
}

/// One-hop counterparties of the seed address. This is not true
/// common-input-ownership clustering; it records direct transaction
/// counterparties only.
#[derive(Debug, Clone, Serialize)]
pub struct ClusteringAnalysis {
    pub related_addresses: Vec<String>,
    pub connection_details: HashMap<String, u64>,
    pub cluster_analysis: Vec<ClusterEntry>,
}

fn block_date(tx: &crate::esplora::Tx) -> Option<DateTime<Utc>> {
    tx.status
        .block_time
        .and_then(|t| Utc.timestamp_opt(t, 0).single())
}

/// Accumulate per-address sent/received totals over a transaction batch.
///
/// The seed address is always present in the result, even for an empty
/// batch. Transactions with no usable inputs or outputs are skipped; the
/// rest of the batch is unaffected.
pub fn aggregate(seed: &str, transactions: &[crate::esplora::Tx]) -> (FlowMap, Vec<Edge>) {
    let mut flows = FlowMap::new();
    flows.entry(seed.to_string()).or_default();

    let mut edges = Vec::new();

    for tx in transactions {
        let inputs: Vec<&crate::esplora::Vout> = tx
            .vin
            .iter()
            .filter_map(|vin| vin.prevout.as_ref())
            .filter(|p| p.scriptpubkey_address.is_some())
            .collect();
        let outputs: Vec<&crate::esplora::Vout> = tx
            .vout
            .iter()
            .filter(|v| v.scriptpubkey_address.is_some())
            .collect();

        if inputs.is_empty() && outputs.is_empty() {
            debug!("Skipping tx {} with no addressable inputs/outputs", tx.txid);
            continue;
        }

        let seen = block_date(tx);
        let mut touched: HashSet<&str> = HashSet::new();

        for prevout in &inputs {
            let addr = prevout.scriptpubkey_address.as_deref().unwrap_or_default();
            let rec = flows.entry(addr.to_string()).or_default();
            rec.total_sent_sats += prevout.value;
            touched.insert(addr);
        }

        for vout in &outputs {
            let addr = vout.scriptpubkey_address.as_deref().unwrap_or_default();
            let rec = flows.entry(addr.to_string()).or_default();
            rec.total_received_sats += vout.value;
            touched.insert(addr);
        }

        // Count each transaction once per address, not once per txo
        for addr in touched {
            if let Some(rec) = flows.get_mut(addr) {
                rec.touch(seen);
            }
        }

        for prevout in &inputs {
            let source = prevout.scriptpubkey_address.as_deref().unwrap_or_default();
            for vout in &outputs {
                let target = vout.scriptpubkey_address.as_deref().unwrap_or_default();
                if source == target {
                    continue;
                }
                edges.push(Edge {
                    source: source.to_string(),
                    target: target.to_string(),
                    txid: tx.txid.clone(),
                    value_sats: vout.value,
                });
            }
        }
    }

    (flows, edges)
}

/// One-hop clustering: every address sharing a transaction with the seed,
/// with connection counts and a coarse likelihood tier.
pub fn clustering(seed: &str, transactions: &[crate::esplora::Tx]) -> ClusteringAnalysis {
    let mut connections: HashMap<String, u64> = HashMap::new();

    for tx in transactions {
        let mut tx_addresses: HashSet<&str> = HashSet::new();

        for vin in &tx.vin {
            if let Some(addr) = vin.prevout.as_ref().and_then(|p| p.scriptpubkey_address.as_deref()) {
                tx_addresses.insert(addr);
            }
        }
        for vout in &tx.vout {
            if let Some(addr) = vout.scriptpubkey_address.as_deref() {
                tx_addresses.insert(addr);
            }
        }

        if tx_addresses.contains(seed) {
            for addr in tx_addresses {
                if addr != seed {
                    *connections.entry(addr.to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    let mut cluster_analysis: Vec<ClusterEntry> = connections
        .iter()
        .map(|(address, &count)| ClusterEntry {
            address: address.clone(),
            connection_count: count,
            likelihood: if count > 5 {
                Likelihood::High
            } else if count > 2 {
                Likelihood::Medium
            } else {
                Likelihood::Low
            },
        })
        .collect();

    // Count descending, address ascending for reproducible output
    cluster_analysis.sort_by(|a, b| {
        b.connection_count
            .cmp(&a.connection_count)
            .then_with(|| a.address.cmp(&b.address))
    });

    let related_addresses = cluster_analysis.iter().map(|e| e.address.clone()).collect();

    ClusteringAnalysis {
        related_addresses,
        connection_details: connections,
        cluster_analysis,
    }
}
