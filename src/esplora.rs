// src/esplora.rs
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum EsploraError {
    #[error("invalid bitcoin address format: {0}")]
    InvalidAddress(String),
    #[error("address not found: {0}")]
    AddressNotFound(String),
    #[error("esplora returned HTTP {0}")]
    Api(StatusCode),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request failed after 3 retries")]
    RetriesExhausted,
}

/// Per-address totals reported by Esplora, in satoshis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainStats {
    pub funded_txo_count: u64,
    pub funded_txo_sum: u64,
    pub spent_txo_count: u64,
    pub spent_txo_sum: u64,
    pub tx_count: u64,
}

/// Response from /address/{address}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: String,
    pub chain_stats: ChainStats,
    #[serde(default)]
    pub mempool_stats: Option<ChainStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxStatus {
    pub confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevout: Option<Vout>,
    #[serde(default)]
    pub is_coinbase: bool,
}

/// Response from /tx/{txid} (and entries of /address/{address}/txs)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tx {
    pub txid: String,
    #[serde(default)]
    pub fee: u64,
    pub status: TxStatus,
    #[serde(default)]
    pub vin: Vec<Vin>,
    #[serde(default)]
    pub vout: Vec<Vout>,
}

/// Reject obviously malformed addresses before any network call.
/// Length bounds cover legacy base58 (25-34) through bech32m (up to 62).
pub fn validate_address(address: &str) -> Result<(), EsploraError> {
    let len = address.len();
    if !(25..=62).contains(&len) {
        return Err(EsploraError::InvalidAddress(address.to_string()));
    }
    if !address.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EsploraError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

fn client(timeout_secs: u64) -> Result<Client, EsploraError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Fetch address summary with retries and timeout
pub async fn get_address_info(base_url: &str, address: &str) -> Result<AddressInfo, EsploraError> {
    validate_address(address)?;
    let client = client(10)?;
    let url = format!("{}/address/{}", base_url, address);

    for attempt in 1..=3 {
        info!("Fetching address info (attempt {}) -> {}", attempt, url);

        match client.get(&url).send().await {
            Ok(resp) => {
                if resp.status() == StatusCode::NOT_FOUND {
                    return Err(EsploraError::AddressNotFound(address.to_string()));
                }
                if resp.status() != StatusCode::OK {
                    return Err(EsploraError::Api(resp.status()));
                }
                let text = resp.text().await?;
                debug!("Raw address response: {}", text);
                return Ok(serde_json::from_str(&text)?);
            }
            Err(e) if attempt < 3 => {
                tracing::warn!("Address fetch failed (attempt {}): {}. Retrying...", attempt, e);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(EsploraError::RetriesExhausted)
}

/// Fetch the most recent transactions for an address (Esplora returns up
/// to 25 per page; callers truncate to their own limit)
pub async fn get_address_txs(base_url: &str, address: &str) -> Result<Vec<Tx>, EsploraError> {
    validate_address(address)?;
    let client = client(15)?;
    let url = format!("{}/address/{}/txs", base_url, address);

    info!("Fetching transactions -> {}", url);

    let resp = client.get(&url).send().await?;
    if resp.status() != StatusCode::OK {
        return Err(EsploraError::Api(resp.status()));
    }
    let text = resp.text().await?;
    debug!("Raw txs response: {}", text);
    Ok(serde_json::from_str(&text)?)
}

/// Fetch full detail for a single transaction
pub async fn get_transaction(base_url: &str, txid: &str) -> Result<Tx, EsploraError> {
    let client = client(10)?;
    let url = format!("{}/tx/{}", base_url, txid);

    debug!("Fetching transaction detail -> {}", url);

    let resp = client.get(&url).send().await?;
    if resp.status() != StatusCode::OK {
        return Err(EsploraError::Api(resp.status()));
    }
    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_addresses_pass() {
        assert!(validate_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").is_ok());
        assert!(validate_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq").is_ok());
    }

    #[test]
    fn short_address_rejected() {
        assert!(matches!(
            validate_address("1A1zP1eP5Q"),
            Err(EsploraError::InvalidAddress(_))
        ));
    }

    #[test]
    fn long_address_rejected() {
        let too_long = "b".repeat(63);
        assert!(validate_address(&too_long).is_err());
    }

    #[test]
    fn non_alphanumeric_rejected() {
        assert!(validate_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7Div!Na").is_err());
    }

    #[test]
    fn tx_decodes_from_esplora_json() {
        let json = r#"{
            "txid": "abc123",
            "fee": 250,
            "status": {"confirmed": true, "block_height": 800000, "block_time": 1690000000},
            "vin": [{"prevout": {"scriptpubkey_address": "1Sender", "value": 500000000}, "is_coinbase": false}],
            "vout": [{"scriptpubkey_address": "1Receiver", "value": 499999750}]
        }"#;
        let tx: Tx = serde_json::from_str(json).unwrap();
        assert_eq!(tx.txid, "abc123");
        assert_eq!(tx.vin[0].prevout.as_ref().unwrap().value, 500_000_000);
        assert_eq!(tx.vout[0].value, 499_999_750);
        assert_eq!(tx.status.block_time, Some(1_690_000_000));
    }

    #[test]
    fn coinbase_vin_has_no_prevout() {
        let json = r#"{
            "txid": "cb",
            "status": {"confirmed": true, "block_time": 1600000000},
            "vin": [{"is_coinbase": true}],
            "vout": [{"scriptpubkey_address": "1Miner", "value": 625000000}]
        }"#;
        let tx: Tx = serde_json::from_str(json).unwrap();
        assert!(tx.vin[0].prevout.is_none());
        assert!(tx.vin[0].is_coinbase);
    }
}
