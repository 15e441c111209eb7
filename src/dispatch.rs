use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{info, warn};

use crate::accounting::Accounting;
use crate::error::{LedgerError, LedgerResult};
use crate::schema::SchemaRegistry;
use crate::stub::LedgerStub;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    CreateAddress,
    ImportAddress,
    FindAllAddresses,
    FindAddress,
    FindBurnAddress,
    CreateAsset,
    IssueMoreAsset,
    FindAllAssets,
    TransferAsset,
    FindAllTransfers,
    FindTransfer,
    FindAllIssues,
    FindIssue,
    FindTransaction,
    VerifySupply,
}

impl Operation {
    pub const ALL: [Operation; 16] = [
        Operation::Register,
        Operation::CreateAddress,
        Operation::ImportAddress,
        Operation::FindAllAddresses,
        Operation::FindAddress,
        Operation::FindBurnAddress,
        Operation::CreateAsset,
        Operation::IssueMoreAsset,
        Operation::FindAllAssets,
        Operation::TransferAsset,
        Operation::FindAllTransfers,
        Operation::FindTransfer,
        Operation::FindAllIssues,
        Operation::FindIssue,
        Operation::FindTransaction,
        Operation::VerifySupply,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Register => "register",
            Operation::CreateAddress => "createAddress",
            Operation::ImportAddress => "importAddress",
            Operation::FindAllAddresses => "findAllAddresses",
            Operation::FindAddress => "findAddress",
            Operation::FindBurnAddress => "findBurnAddress",
            Operation::CreateAsset => "createAsset",
            Operation::IssueMoreAsset => "issueMoreAsset",
            Operation::FindAllAssets => "findAllAssets",
            Operation::TransferAsset => "transferAsset",
            Operation::FindAllTransfers => "findAllTransfers",
            Operation::FindTransfer => "findTransfer",
            Operation::FindAllIssues => "findAllIssues",
            Operation::FindIssue => "findIssue",
            Operation::FindTransaction => "findTransaction",
            Operation::VerifySupply => "verifySupply",
        }
    }

    /// Whether the operation may write to the ledger.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::Register
                | Operation::CreateAddress
                | Operation::ImportAddress
                | Operation::CreateAsset
                | Operation::IssueMoreAsset
                | Operation::TransferAsset
        )
    }
}

impl FromStr for Operation {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| LedgerError::UnknownOperation(s.to_string()))
    }
}

/// Entry points the ledger host calls: `init` once, `invoke` per request.
pub struct Chaincode {
    registry: SchemaRegistry,
}

impl Chaincode {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn accounting(&self) -> Accounting<'_> {
        Accounting::new(&self.registry)
    }

    /// Provisions the burn address. Repeated calls return the existing one.
    pub fn init(&self, stub: &mut dyn LedgerStub) -> LedgerResult<AddressView> {
        let view = self.accounting().create_burn_address(stub)?;
        info!("Initialized. burn address={}", view.address);
        Ok(view)
    }

    /// Runs `fcn` with a JSON `payload`; failures come back as text.
    pub fn invoke(&self, stub: &mut dyn LedgerStub, fcn: &str, payload: &str) -> Result<Value, String> {
        self.execute(stub, fcn, payload).map_err(|e| {
            warn!("tx={} {} failed: {}", stub.tx_id(), fcn, e);
            e.to_string()
        })
    }

    pub fn execute(&self, stub: &mut dyn LedgerStub, fcn: &str, payload: &str) -> LedgerResult<Value> {
        let op = Operation::from_str(fcn)?;
        let params: Value = if payload.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(payload).map_err(|e| LedgerError::Validation(format!("malformed payload: {}", e)))?
        };
        self.run(stub, op, params)
    }

    pub fn run(&self, stub: &mut dyn LedgerStub, op: Operation, params: Value) -> LedgerResult<Value> {
        let acc = self.accounting();
        let out = match op {
            Operation::Register => json!(acc.register(stub, &parse::<RegisterReq>(params)?)?),
            Operation::CreateAddress => json!(acc.create_address(stub)?),
            Operation::ImportAddress => json!(acc.import_address(stub, &parse::<AddressReq>(params)?)?),
            Operation::FindAllAddresses => json!(acc.find_all_addresses(&*stub)?),
            Operation::FindAddress => json!(acc.find_address(&*stub, &parse::<AddressReq>(params)?)?),
            Operation::FindBurnAddress => json!(acc.find_burn_address(&*stub)?),
            Operation::CreateAsset => json!(acc.create_asset(stub, &parse::<CreateAssetReq>(params)?)?),
            Operation::IssueMoreAsset => json!(acc.issue_more(stub, &parse::<IssueMoreReq>(params)?)?),
            Operation::FindAllAssets => json!(acc.find_all_assets(&*stub)?),
            Operation::TransferAsset => json!(acc.transfer(stub, &parse::<TransferReq>(params)?)?),
            Operation::FindAllTransfers => json!(acc.find_all_transfers(&*stub, &parse::<ListTransfersReq>(params)?)?),
            Operation::FindTransfer => json!(acc.find_transfer(&*stub, &parse::<FindTransferReq>(params)?)?),
            Operation::FindAllIssues => json!(acc.find_all_issues(&*stub, &parse::<ListTransfersReq>(params)?)?),
            Operation::FindIssue => json!(acc.find_issue(&*stub, &parse::<FindTransferReq>(params)?)?),
            Operation::FindTransaction => json!(acc.find_transaction(&*stub, &parse::<FindTransactionReq>(params)?)?),
            Operation::VerifySupply => json!(acc.verify_supply(&*stub, &parse::<AssetReq>(params)?.name)?),
        };
        Ok(out)
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> LedgerResult<T> {
    serde_json::from_value(params).map_err(|e| LedgerError::Validation(format!("invalid request: {}", e)))
}
