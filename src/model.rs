use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LedgerResult;
use crate::ids;
use crate::schema::{Draft, Entity, FieldSpec, FieldType, HookContext, TypeOptions, Validator};

/// Creator name of the burn address.
pub const NO_CREATOR: &str = "none";

/// Amounts are stored as decimal strings, never as floats.
pub fn amount_value(amount: Decimal) -> Value {
    Value::String(amount.to_string())
}

// ----------------------
// Embedded references
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AddressRef {
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub name: String,
}

impl MemberRef {
    pub fn new(name: &str) -> Self { Self { name: name.to_string() } }
}

impl AddressRef {
    pub fn new(address: &str) -> Self { Self { address: address.to_string() } }
}

impl AssetRef {
    pub fn new(name: &str) -> Self { Self { name: name.to_string() } }
}

// ----------------------
// Member
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub name: String,
    pub is_regulator: bool,
}

impl Entity for Member {
    fn options() -> TypeOptions { TypeOptions::new("name", "member", "members") }

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("name", FieldType::String).required().validator(Validator::non_empty()),
            FieldSpec::new("isRegulator", FieldType::Boolean).required().default_value(false),
        ]
    }

    fn key(&self) -> &str { &self.name }
}

// ----------------------
// Address
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address: String,
    pub creator: MemberRef,
    pub is_burn: bool,
    #[serde(default)]
    pub imported_by: Vec<MemberRef>,
}

impl Address {
    pub fn is_visible_to(&self, member: &str) -> bool {
        self.creator.name == member || self.imported_by.iter().any(|m| m.name == member)
    }

    pub fn is_watch_only_for(&self, member: &str) -> bool {
        self.creator.name != member
    }
}

impl Entity for Address {
    fn options() -> TypeOptions { TypeOptions::new("address", "address", "addresses") }

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("address", FieldType::String).required().validator(Validator::hex_digest()),
            FieldSpec::new("creator", FieldType::Object).required(),
            FieldSpec::new("isBurn", FieldType::Boolean).required().default_value(false),
            FieldSpec::new("importedBy", FieldType::Array).required().default_value(serde_json::json!([])),
        ]
    }

    fn key(&self) -> &str { &self.address }

    /// Addresses are never caller-chosen: a fresh key is generated on creation.
    fn before_create(draft: &mut Draft<Self>, ctx: &HookContext<'_>) -> LedgerResult<()> {
        let schema = ctx.registry.schema_for::<Self>()?;
        let key = ids::generate_address_key(ctx.stub, schema, ctx.registry.address_key_attempts())?;
        draft.set("address", key);
        Ok(())
    }
}

// ----------------------
// Asset
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub units: Decimal,
    pub open: bool,
    pub tx_id: String,
}

impl Entity for Asset {
    fn options() -> TypeOptions { TypeOptions::new("name", "asset", "assets") }

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("name", FieldType::String).required().validator(Validator::non_empty()),
            FieldSpec::new("amount", FieldType::Decimal).required().validator(Validator::non_negative()),
            FieldSpec::new("units", FieldType::Decimal).required().default_value("0.01").validator(Validator::positive()),
            FieldSpec::new("open", FieldType::Boolean).required().default_value(true),
            FieldSpec::new("txId", FieldType::String).required(),
        ]
    }

    fn key(&self) -> &str { &self.name }
}

// ----------------------
// Wallet
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Wallet {
    pub id: String,
    pub address: AddressRef,
    pub asset: AssetRef,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    pub owner: MemberRef,
}

impl Entity for Wallet {
    fn options() -> TypeOptions { TypeOptions::new("id", "wallet", "wallets") }

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("id", FieldType::String).required().unique(),
            FieldSpec::new("address", FieldType::Object).required(),
            FieldSpec::new("asset", FieldType::Object).required(),
            FieldSpec::new("balance", FieldType::Decimal).required().validator(Validator::non_negative()),
            FieldSpec::new("owner", FieldType::Object).required(),
        ]
    }

    fn key(&self) -> &str { &self.id }
}

// ----------------------
// Transaction
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "txID")]
    pub tx_id: String,
    /// Address that initiated the transaction.
    pub address: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocktime: Option<i64>,
    pub is_final: bool,
}

impl Entity for Transaction {
    fn options() -> TypeOptions { TypeOptions::new("id", "transaction", "transactions") }

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("id", FieldType::String).required().unique(),
            FieldSpec::new("txID", FieldType::String).required(),
            FieldSpec::new("address", FieldType::String).required(),
            FieldSpec::new("timestamp", FieldType::Number).required(),
            FieldSpec::new("blocktime", FieldType::Number),
            FieldSpec::new("isFinal", FieldType::Boolean).required().default_value(true),
        ]
    }

    fn key(&self) -> &str { &self.id }
}

// ----------------------
// Transfer
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub tx_id: String,
    pub asset: AssetRef,
    pub origin: AddressRef,
    pub destination: AddressRef,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub metadata: String,
    pub is_issue: bool,
    pub transaction: Transaction,
}

impl Entity for Transfer {
    fn options() -> TypeOptions { TypeOptions::new("txId", "transfer", "transfers") }

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("txId", FieldType::String).required(),
            FieldSpec::new("asset", FieldType::Object).required(),
            FieldSpec::new("origin", FieldType::Object).required(),
            FieldSpec::new("destination", FieldType::Object).required(),
            FieldSpec::new("amount", FieldType::Decimal).required().validator(Validator::positive()),
            FieldSpec::new("metadata", FieldType::String).required().default_value(""),
            FieldSpec::new("isIssue", FieldType::Boolean).required().default_value(false),
            FieldSpec::new("transaction", FieldType::Object).required(),
        ]
    }

    fn key(&self) -> &str { &self.tx_id }
}
