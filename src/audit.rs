//! Append-only audit trail.
//!
//! Every accounting action records exactly one [`Transaction`]. A [`Transfer`]
//! is only ever written together with the transaction that caused it.

use rust_decimal::Decimal;
use tracing::info;

use crate::error::LedgerResult;
use crate::model::{AddressRef, AssetRef, Transaction, Transfer};
use crate::repo::{Record, Repository};
use crate::schema::SchemaRegistry;
use crate::stub::LedgerStub;

pub struct Movement<'a> {
    pub asset: &'a str,
    pub origin: &'a str,
    pub destination: &'a str,
    pub amount: Decimal,
    pub metadata: &'a str,
    pub is_issue: bool,
}

/// Records the invocation's transaction, initiated by `address`.
/// Transactions are final when written; `blocktime` is left to the host.
pub fn record_transaction(stub: &mut dyn LedgerStub, registry: &SchemaRegistry, address: &str) -> LedgerResult<Record<Transaction>> {
    let transactions = Repository::<Transaction>::new(registry)?;
    let draft = transactions.build_from(&Transaction {
        id: String::new(),
        tx_id: stub.tx_id().to_string(),
        address: address.to_string(),
        timestamp: stub.timestamp().timestamp_millis(),
        blocktime: None,
        is_final: true,
    })?;
    transactions.save(stub, draft)
}

pub fn record_transfer(
    stub: &mut dyn LedgerStub,
    registry: &SchemaRegistry,
    movement: Movement<'_>,
    transaction: &Record<Transaction>,
) -> LedgerResult<Record<Transfer>> {
    let transfers = Repository::<Transfer>::new(registry)?;
    let draft = transfers.build_from(&Transfer {
        tx_id: transaction.data.tx_id.clone(),
        asset: AssetRef::new(movement.asset),
        origin: AddressRef::new(movement.origin),
        destination: AddressRef::new(movement.destination),
        amount: movement.amount,
        metadata: movement.metadata.to_string(),
        is_issue: movement.is_issue,
        transaction: transaction.data.clone(),
    })?;
    let record = transfers.save(stub, draft)?;
    info!(
        "tx={} {} {} {} {} -> {}",
        record.data.tx_id,
        if record.data.is_issue { "issue" } else { "transfer" },
        record.data.amount,
        record.data.asset.name,
        record.data.origin.address,
        record.data.destination.address
    );
    Ok(record)
}
