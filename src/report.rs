// src/report.rs
//
// Pure projections of an aggregated FlowMap into the shapes the charts
// and the JSON export consume. No side effects, no network.
use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

use crate::aggregator::{Edge, FlowMap, FlowRecord};
use crate::esplora::Tx;
use crate::models::{
    sats_to_btc, sats_u64_to_btc, short_address, BubbleData, BubblePoint, GraphEdge, GraphMetrics,
    GraphNode, MonthlyActivity, NetworkGraph, NodeClass, ProcessedTransaction, TimelinePoint,
    TimelineSummary, TransactionTimeline, TxDirection,
};

/// Total and exclusive: the seed is primary, everything else falls into
/// exactly one of positive/negative/neutral by net flow.
pub fn classify(is_seed: bool, net_flow_sats: i64) -> NodeClass {
    if is_seed {
        NodeClass::Primary
    } else if net_flow_sats > 0 {
        NodeClass::Positive
    } else if net_flow_sats < 0 {
        NodeClass::Negative
    } else {
        NodeClass::Neutral
    }
}

/// Bubble diameter from activity and volume, matching the original chart
/// sizing: base grows with transaction count, scaled up to 3x by volume.
fn bubble_size(record: &FlowRecord) -> f64 {
    let base = f64::max(15.0, record.transaction_count as f64 * 3.0);
    let volume_btc = sats_u64_to_btc(record.total_volume_sats())
        .to_f64()
        .unwrap_or(0.0);
    let flow_factor = f64::min(2.0, volume_btc / 1000.0);
    base * (1.0 + flow_factor)
}

/// Seed first, then by total volume descending; address as tie-break so
/// identical inputs produce identical output order.
fn ordered_addresses<'a>(flows: &'a FlowMap, seed: &str) -> Vec<&'a str> {
    let mut addresses: Vec<&str> = flows.keys().map(String::as_str).collect();
    addresses.sort_by(|&a, &b| {
        let seed_rank = |x: &str| if x == seed { 0 } else { 1 };
        seed_rank(a)
            .cmp(&seed_rank(b))
            .then_with(|| {
                flows[b]
                    .total_volume_sats()
                    .cmp(&flows[a].total_volume_sats())
            })
            .then_with(|| a.cmp(b))
    });
    addresses
}

pub fn bubble_data(flows: &FlowMap, seed: &str) -> BubbleData {
    let points = ordered_addresses(flows, seed)
        .into_iter()
        .map(|addr| {
            let rec = &flows[addr];
            BubblePoint {
                address: addr.to_string(),
                label: short_address(addr),
                net_flow_btc: sats_to_btc(rec.net_flow_sats()),
                total_volume_btc: sats_u64_to_btc(rec.total_volume_sats()),
                transaction_count: rec.transaction_count,
                size: bubble_size(rec),
                class: classify(addr == seed, rec.net_flow_sats()),
            }
        })
        .collect();

    BubbleData {
        main_address: seed.to_string(),
        points,
    }
}

pub fn network_data(flows: &FlowMap, edges: &[Edge], seed: &str) -> NetworkGraph {
    let nodes: Vec<GraphNode> = ordered_addresses(flows, seed)
        .into_iter()
        .map(|addr| {
            let rec = &flows[addr];
            GraphNode {
                id: addr.to_string(),
                label: short_address(addr),
                class: classify(addr == seed, rec.net_flow_sats()),
                transaction_count: rec.transaction_count,
                size: bubble_size(rec),
            }
        })
        .collect();

    // Deduplicate by (source, target); weight is the summed satoshi amount
    // across every transaction contributing to that pair
    let mut weights: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();
    for edge in edges {
        let entry = weights
            .entry((edge.source.clone(), edge.target.clone()))
            .or_insert((0, 0));
        entry.0 += edge.value_sats;
        entry.1 += 1;
    }

    let mut graph_edges: Vec<GraphEdge> = weights
        .into_iter()
        .map(|((source, target), (weight_sats, transaction_count))| GraphEdge {
            source,
            target,
            weight_sats,
            weight_btc: sats_u64_to_btc(weight_sats),
            transaction_count,
        })
        .collect();
    graph_edges.sort_by(|a, b| {
        b.weight_sats
            .cmp(&a.weight_sats)
            .then_with(|| (a.source.as_str(), a.target.as_str()).cmp(&(b.source.as_str(), b.target.as_str())))
    });

    let related = nodes.iter().filter(|n| n.id != seed).count();
    let metrics = GraphMetrics {
        total_nodes: nodes.len(),
        total_edges: graph_edges.len(),
        related_addresses_count: related,
    };

    NetworkGraph {
        main_address: seed.to_string(),
        nodes,
        edges: graph_edges,
        graph_metrics: metrics,
    }
}

/// Net satoshi amount of a transaction from the seed's point of view:
/// outputs paying the seed minus inputs spending the seed's coins.
pub fn seed_net_amount(seed: &str, tx: &Tx) -> (u64, u64, i64) {
    let amount_in: u64 = tx
        .vout
        .iter()
        .filter(|v| v.scriptpubkey_address.as_deref() == Some(seed))
        .map(|v| v.value)
        .sum();
    let amount_out: u64 = tx
        .vin
        .iter()
        .filter_map(|vin| vin.prevout.as_ref())
        .filter(|p| p.scriptpubkey_address.as_deref() == Some(seed))
        .map(|p| p.value)
        .sum();
    (amount_in, amount_out, amount_in as i64 - amount_out as i64)
}

pub fn process_transactions(seed: &str, transactions: &[Tx]) -> Vec<ProcessedTransaction> {
    transactions
        .iter()
        .map(|tx| {
            let (amount_in, amount_out, net) = seed_net_amount(seed, tx);
            let block_time = tx.status.block_time.filter(|_| tx.status.confirmed);
            let formatted_time = block_time
                .and_then(|t| Utc.timestamp_opt(t, 0).single())
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string());

            ProcessedTransaction {
                txid: tx.txid.clone(),
                confirmed: tx.status.confirmed,
                block_time,
                formatted_time,
                amount_in_sats: amount_in,
                amount_out_sats: amount_out,
                net_amount_sats: net,
                net_amount_btc: sats_to_btc(net),
                direction: if net > 0 {
                    TxDirection::Received
                } else {
                    TxDirection::Sent
                },
                fee_sats: tx.fee,
                fee_btc: sats_u64_to_btc(tx.fee),
            }
        })
        .collect()
}

pub fn timeline_data(seed: &str, transactions: &[Tx]) -> TransactionTimeline {
    // Confirmed transactions only, oldest first
    let mut confirmed: Vec<(&Tx, i64, DateTime<Utc>)> = transactions
        .iter()
        .filter(|tx| tx.status.confirmed)
        .filter_map(|tx| {
            let ts = tx.status.block_time?;
            let date = Utc.timestamp_opt(ts, 0).single()?;
            Some((tx, ts, date))
        })
        .collect();
    confirmed.sort_by_key(|(tx, ts, _)| (*ts, tx.txid.clone()));

    let mut points = Vec::with_capacity(confirmed.len());
    let mut monthly: BTreeMap<String, MonthlyActivity> = BTreeMap::new();
    let mut cumulative_sats: i64 = 0;

    for &(tx, ts, date) in &confirmed {
        let (_, _, net) = seed_net_amount(seed, tx);
        cumulative_sats += net;

        points.push(TimelinePoint {
            txid: tx.txid.clone(),
            timestamp: ts,
            date,
            net_amount_btc: sats_to_btc(net),
            cumulative_balance_btc: sats_to_btc(cumulative_sats),
            direction: if net > 0 {
                TxDirection::Received
            } else {
                TxDirection::Sent
            },
        });

        let month_key = format!("{}-{:02}", date.year(), date.month());
        let bucket = monthly.entry(month_key.clone()).or_insert(MonthlyActivity {
            month: month_key,
            transaction_count: 0,
            total_received_btc: sats_to_btc(0),
            total_sent_btc: sats_to_btc(0),
            net_flow_btc: sats_to_btc(0),
        });
        bucket.transaction_count += 1;
        if net > 0 {
            bucket.total_received_btc += sats_to_btc(net);
        } else {
            bucket.total_sent_btc += sats_to_btc(net.abs());
        }
        bucket.net_flow_btc += sats_to_btc(net);
    }

    let summary_stats = TimelineSummary {
        total_confirmed_transactions: points.len(),
        earliest: points.first().map(|p| p.date),
        latest: points.last().map(|p| p.date),
    };

    TransactionTimeline {
        address: seed.to_string(),
        points,
        monthly_activity: monthly.into_values().collect(),
        summary_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::esplora::{TxStatus, Vin, Vout};

    fn vout(addr: &str, value: u64) -> Vout {
        Vout {
            scriptpubkey_address: Some(addr.to_string()),
            value,
        }
    }

    fn tx(txid: &str, inputs: Vec<Vout>, outputs: Vec<Vout>, block_time: Option<i64>) -> Tx {
        Tx {
            txid: txid.to_string(),
            fee: 100,
            status: TxStatus {
                confirmed: block_time.is_some(),
                block_height: None,
                block_time,
            },
            vin: inputs
                .into_iter()
                .map(|p| Vin {
                    prevout: Some(p),
                    is_coinbase: false,
                })
                .collect(),
            vout: outputs,
        }
    }

    #[test]
    fn classification_is_total_and_exclusive() {
        assert_eq!(classify(true, -5), NodeClass::Primary);
        assert_eq!(classify(false, 1), NodeClass::Positive);
        assert_eq!(classify(false, -1), NodeClass::Negative);
        assert_eq!(classify(false, 0), NodeClass::Neutral);
    }

    #[test]
    fn bubble_map_places_sender_negative_and_receiver_positive() {
        let txs = vec![tx("t1", vec![vout("S", 500_000_000)], vec![vout("R", 500_000_000)], None)];
        let (flows, _) = aggregate("S", &txs);
        let bubble = bubble_data(&flows, "S");

        let s = bubble.points.iter().find(|p| p.address == "S").unwrap();
        let r = bubble.points.iter().find(|p| p.address == "R").unwrap();
        assert_eq!(s.class, NodeClass::Primary);
        assert!(s.net_flow_btc < sats_to_btc(0));
        assert_eq!(r.class, NodeClass::Positive);
        assert!(r.net_flow_btc > sats_to_btc(0));
        // seed first
        assert_eq!(bubble.points[0].address, "S");
    }

    #[test]
    fn empty_flows_give_empty_but_well_formed_projections() {
        let (flows, edges) = aggregate("seed", &[]);
        let bubble = bubble_data(&flows, "seed");
        let graph = network_data(&flows, &edges, "seed");
        let timeline = timeline_data("seed", &[]);

        assert_eq!(bubble.points.len(), 1); // the seed itself
        assert_eq!(graph.graph_metrics.total_edges, 0);
        assert_eq!(graph.graph_metrics.related_addresses_count, 0);
        assert!(timeline.points.is_empty());
        assert!(timeline.monthly_activity.is_empty());
        assert_eq!(timeline.summary_stats.total_confirmed_transactions, 0);
    }

    #[test]
    fn edge_weights_sum_across_transactions() {
        let txs = vec![
            tx("t1", vec![vout("a", 100)], vec![vout("b", 60)], None),
            tx("t2", vec![vout("a", 100)], vec![vout("b", 40)], None),
        ];
        let (flows, edges) = aggregate("a", &txs);
        let graph = network_data(&flows, &edges, "a");

        assert_eq!(graph.edges.len(), 1);
        let edge = &graph.edges[0];
        assert_eq!(edge.source, "a");
        assert_eq!(edge.target, "b");
        assert_eq!(edge.weight_sats, 100);
        assert_eq!(edge.transaction_count, 2);
    }

    #[test]
    fn timeline_buckets_by_month_and_accumulates_balance() {
        // 2021-01-01 and 2021-02-01 (UTC)
        let jan = 1_609_459_200;
        let feb = 1_612_137_600;
        let txs = vec![
            tx("t1", vec![vout("x", 100)], vec![vout("seed", 100)], Some(jan)),
            tx(
                "t2",
                vec![vout("seed", 100)],
                vec![vout("y", 60), vout("seed", 40)],
                Some(feb),
            ),
        ];
        let timeline = timeline_data("seed", &txs);

        assert_eq!(timeline.points.len(), 2);
        assert_eq!(timeline.points[0].cumulative_balance_btc, sats_to_btc(100));
        assert_eq!(timeline.points[1].cumulative_balance_btc, sats_to_btc(40));

        assert_eq!(timeline.monthly_activity.len(), 2);
        assert_eq!(timeline.monthly_activity[0].month, "2021-01");
        assert_eq!(timeline.monthly_activity[0].net_flow_btc, sats_to_btc(100));
        assert_eq!(timeline.monthly_activity[1].month, "2021-02");
        assert_eq!(timeline.monthly_activity[1].net_flow_btc, sats_to_btc(-60));
    }

    #[test]
    fn unconfirmed_transactions_are_excluded_from_timeline() {
        let txs = vec![tx("t1", vec![vout("x", 10)], vec![vout("seed", 10)], None)];
        let timeline = timeline_data("seed", &txs);
        assert!(timeline.points.is_empty());
    }

    #[test]
    fn processed_transactions_are_seed_relative() {
        let txs = vec![tx(
            "t1",
            vec![vout("seed", 100)],
            vec![vout("y", 60), vout("seed", 30)],
            Some(1_700_000_000),
        )];
        let processed = process_transactions("seed", &txs);
        assert_eq!(processed.len(), 1);
        let p = &processed[0];
        assert_eq!(p.amount_in_sats, 30);
        assert_eq!(p.amount_out_sats, 100);
        assert_eq!(p.net_amount_sats, -70);
        assert_eq!(p.direction, TxDirection::Sent);
        assert!(p.formatted_time.is_some());
    }
}
