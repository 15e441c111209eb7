use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::filter::DEFAULT_LIMIT;
use crate::model::Transaction;

// ----------------------
// Requests
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    #[serde(default, deserialize_with = "bool_or_string")]
    pub is_regulator: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AddressReq {
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateAssetReq {
    pub name: String,
    pub amount: Decimal,
    pub address: String,
    #[serde(default)]
    pub units: Option<Decimal>,
    #[serde(default)]
    pub open: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IssueMoreReq {
    pub name: String,
    pub amount: Decimal,
    pub address: String,
    #[serde(default)]
    pub metadata: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TransferReq {
    pub address: String,
    pub asset: String,
    pub destination: String,
    pub amount: Decimal,
    #[serde(default)]
    pub metadata: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ListTransfersReq {
    pub address: String,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default, alias = "count")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: Option<usize>,
}

impl ListTransfersReq {
    pub fn limit(&self) -> usize { self.limit.unwrap_or(DEFAULT_LIMIT) }
    pub fn skip(&self) -> usize { self.skip.unwrap_or(0) }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FindTransferReq {
    pub address: String,
    #[serde(rename = "txID")]
    pub tx_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FindTransactionReq {
    #[serde(rename = "txID")]
    pub tx_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssetReq {
    pub name: String,
}

// Members are registered as `{"isRegulator": "true"}` by older clients.
fn bool_or_string<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    match Value::deserialize(de)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(s == "true"),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!("expected boolean, got {}", other))),
    }
}

// ----------------------
// Responses
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssetBalance {
    pub name: String,
    pub balance: Decimal,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressView {
    pub address: String,
    pub is_watch_only: bool,
    pub assets: Vec<AssetBalance>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssetView {
    #[serde(rename = "txID")]
    pub tx_id: String,
    pub name: String,
    pub qty: Decimal,
    pub units: Decimal,
    pub open: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransferView {
    pub asset: String,
    pub origin: String,
    pub destination: String,
    pub amount: Decimal,
    pub metadata: String,
    pub transaction: Transaction,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    #[serde(rename = "txID")]
    pub tx_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupplyReport {
    pub asset: String,
    pub amount: Decimal,
    pub wallet_total: Decimal,
    pub wallets: usize,
}
