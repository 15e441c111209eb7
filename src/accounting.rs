//! Address, asset and wallet accounting.
//!
//! Supply changes only through [`Accounting::create_asset`] and
//! [`Accounting::issue_more`]; [`Accounting::transfer`] moves balance between
//! wallets without changing the total. After any successful operation the
//! wallet balances of an asset sum to its `amount`.

use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

use crate::audit::{self, Movement};
use crate::error::{LedgerError, LedgerResult};
use crate::filter::{Filter, FindOptions, SortKey};
use crate::ids;
use crate::model::{amount_value, Address, AddressRef, Asset, AssetRef, Member, MemberRef, Transaction, Transfer, Wallet, NO_CREATOR};
use crate::repo::{Record, Repository};
use crate::schema::{SchemaRegistry, CREATED_AT_FIELD};
use crate::stub::LedgerStub;
use crate::types::*;

pub struct Accounting<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> Accounting<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    fn members(&self) -> LedgerResult<Repository<'r, Member>> { Repository::new(self.registry) }
    fn addresses(&self) -> LedgerResult<Repository<'r, Address>> { Repository::new(self.registry) }
    fn assets(&self) -> LedgerResult<Repository<'r, Asset>> { Repository::new(self.registry) }
    fn wallets(&self) -> LedgerResult<Repository<'r, Wallet>> { Repository::new(self.registry) }
    fn transfers(&self) -> LedgerResult<Repository<'r, Transfer>> { Repository::new(self.registry) }
    fn transactions(&self) -> LedgerResult<Repository<'r, Transaction>> { Repository::new(self.registry) }

    // --------------------------
    // Members
    // --------------------------
    pub fn register(&self, stub: &mut dyn LedgerStub, req: &RegisterReq) -> LedgerResult<Record<Member>> {
        let name = stub.creator().to_string();
        if name == NO_CREATOR {
            return Err(LedgerError::Validation(format!("the member name '{}' is reserved", NO_CREATOR)));
        }
        let members = self.members()?;
        if members.find_by_key(&*stub, &name)?.is_some() {
            return Err(LedgerError::AlreadyExists(format!("the member {} already exists", name)));
        }
        if req.is_regulator
            && members.find_one(&*stub, Filter::eq("isRegulator", true), &FindOptions::default())?.is_some()
        {
            return Err(LedgerError::AlreadyExists("the regulator already exists on network".into()));
        }
        let draft = members.build_from(&Member { name: name.clone(), is_regulator: req.is_regulator })?;
        let record = members.save(stub, draft)?;
        info!("member registered: {} regulator={}", name, req.is_regulator);
        Ok(record)
    }

    fn caller(&self, stub: &dyn LedgerStub) -> LedgerResult<Record<Member>> {
        self.members()?
            .find_by_key(stub, stub.creator())?
            .ok_or_else(|| LedgerError::NotFound(format!("the member {} isn't registered", stub.creator())))
    }

    // --------------------------
    // Addresses
    // --------------------------
    pub fn create_address(&self, stub: &mut dyn LedgerStub) -> LedgerResult<AddressView> {
        let caller = self.caller(&*stub)?;
        let addresses = self.addresses()?;
        let draft = addresses.build(json!({ "creator": MemberRef::new(&caller.data.name), "isBurn": false }))?;
        let record = addresses.save(stub, draft)?;
        info!("address created: {} by {}", record.data.address, caller.data.name);
        Ok(AddressView { address: record.data.address, is_watch_only: false, assets: vec![] })
    }

    pub fn create_burn_address(&self, stub: &mut dyn LedgerStub) -> LedgerResult<AddressView> {
        let record = ids::create_burn_address(stub, self.registry)?;
        self.address_view(&*stub, &record.data, stub.creator())
    }

    pub fn find_burn_address(&self, stub: &dyn LedgerStub) -> LedgerResult<String> {
        Ok(ids::find_burn_address(stub, self.registry)?.data.address)
    }

    /// Grants the caller read access to someone else's address.
    pub fn import_address(&self, stub: &mut dyn LedgerStub, req: &AddressReq) -> LedgerResult<AddressView> {
        let caller = self.caller(&*stub)?;
        let addresses = self.addresses()?;
        let mut address = addresses
            .find_by_key(&*stub, &req.address)?
            .ok_or_else(|| LedgerError::NotFound(format!("the address {} doesn't exist", req.address)))?
            .data;
        if address.is_visible_to(&caller.data.name) {
            return Err(LedgerError::AlreadyExists(format!(
                "the address {} has already been imported by {}", address.address, caller.data.name
            )));
        }
        address.imported_by.push(MemberRef::new(&caller.data.name));
        let updated = addresses.find_one_and_update(
            stub,
            Filter::eq("address", address.address.as_str()),
            json!({ "importedBy": address.imported_by }),
        )?;
        info!("address {} imported by {}", updated.data.address, caller.data.name);
        self.address_view(&*stub, &updated.data, &caller.data.name)
    }

    fn visible_to(member: &str) -> Filter {
        Filter::or(vec![
            Filter::eq("creator.name", member),
            Filter::array_contains("importedBy", Filter::eq("name", member)),
        ])
    }

    fn address_view(&self, stub: &dyn LedgerStub, address: &Address, viewer: &str) -> LedgerResult<AddressView> {
        let wallets = self.wallets()?.find(
            stub,
            Filter::eq("address.address", address.address.as_str()),
            &FindOptions::sorted(vec![SortKey::asc("asset.name")]),
        )?;
        Ok(AddressView {
            address: address.address.clone(),
            is_watch_only: address.is_watch_only_for(viewer),
            assets: wallets
                .into_iter()
                .map(|w| AssetBalance { name: w.data.asset.name, balance: w.data.balance })
                .collect(),
        })
    }

    pub fn find_all_addresses(&self, stub: &dyn LedgerStub) -> LedgerResult<Vec<AddressView>> {
        let viewer = stub.creator().to_string();
        self.addresses()?
            .find(stub, Self::visible_to(&viewer), &FindOptions::sorted(vec![SortKey::asc(CREATED_AT_FIELD)]))?
            .iter()
            .map(|a| self.address_view(stub, &a.data, &viewer))
            .collect()
    }

    pub fn find_address(&self, stub: &dyn LedgerStub, req: &AddressReq) -> LedgerResult<AddressView> {
        let viewer = stub.creator().to_string();
        let filter = Filter::and(vec![Filter::eq("address", req.address.as_str()), Self::visible_to(&viewer)]);
        let address = self.addresses()?
            .find_one(stub, filter, &FindOptions::default())?
            .ok_or_else(|| LedgerError::NotFound(format!(
                "the address {} doesn't exist or doesn't belong to you", req.address
            )))?;
        self.address_view(stub, &address.data, &viewer)
    }

    // --------------------------
    // Assets
    // --------------------------
    pub fn create_asset(&self, stub: &mut dyn LedgerStub, req: &CreateAssetReq) -> LedgerResult<TxReceipt> {
        let assets = self.assets()?;
        if assets.find_by_key(&*stub, &req.name)?.is_some() {
            return Err(LedgerError::AlreadyExists(format!("the asset {} already exists", req.name)));
        }
        let caller = self.caller(&*stub)?;
        let address = self.owned_address(&*stub, &req.address, &caller.data.name)?;

        let mut draft = assets.build(json!({
            "name": req.name,
            "amount": amount_value(req.amount),
            "txId": stub.tx_id(),
        }))?;
        if let Some(units) = req.units { draft.set("units", amount_value(units)); }
        if let Some(open) = req.open { draft.set("open", open); }
        let asset = assets.save(stub, draft)?;

        let wallets = self.wallets()?;
        let wallet = wallets.build_from(&Wallet {
            id: String::new(),
            address: AddressRef::new(&address.address),
            asset: AssetRef::new(&asset.data.name),
            balance: asset.data.amount,
            owner: MemberRef::new(&caller.data.name),
        })?;
        wallets.save(stub, wallet)?;

        let tx = audit::record_transaction(stub, self.registry, &address.address)?;
        info!("tx={} asset {} created with supply {}", tx.data.tx_id, asset.data.name, asset.data.amount);
        Ok(TxReceipt { tx_id: tx.data.tx_id })
    }

    pub fn find_all_assets(&self, stub: &dyn LedgerStub) -> LedgerResult<Vec<AssetView>> {
        Ok(self.assets()?
            .find(stub, Filter::any(), &FindOptions::sorted(vec![SortKey::asc("name")]))?
            .into_iter()
            .map(|a| AssetView {
                tx_id: a.data.tx_id,
                name: a.data.name,
                qty: a.data.amount,
                units: a.data.units,
                open: a.data.open,
            })
            .collect())
    }

    /// Regulator-only minting: raises the supply and credits `req.address`
    /// by the same amount.
    pub fn issue_more(&self, stub: &mut dyn LedgerStub, req: &IssueMoreReq) -> LedgerResult<TxReceipt> {
        ensure_positive(req.amount)?;
        let assets = self.assets()?;
        let asset = assets
            .find_by_key(&*stub, &req.name)?
            .ok_or_else(|| LedgerError::NotFound(format!("the asset {} doesn't exist", req.name)))?;
        let destination = self.address(&*stub, &req.address)?;

        let caller = self.members()?.find_by_key(&*stub, stub.creator())?;
        let regulator = match caller {
            Some(m) if m.data.is_regulator => m,
            _ => return Err(LedgerError::Authorization(format!(
                "{} isn't the regulator and can't issue more asset", stub.creator()
            ))),
        };
        let origin = self.addresses()?
            .find_one(
                &*stub,
                Filter::eq("creator.name", regulator.data.name.as_str()),
                &FindOptions::sorted(vec![SortKey::asc(CREATED_AT_FIELD), SortKey::asc("address")]),
            )?
            .ok_or_else(|| LedgerError::NotFound(format!("the regulator {} has no address", regulator.data.name)))?;

        let supply = asset.data.amount.checked_add(req.amount)
            .ok_or_else(|| LedgerError::Validation("asset supply overflow".into()))?;
        assets.find_one_and_update(stub, Filter::eq("name", req.name.as_str()), json!({ "amount": amount_value(supply) }))?;
        self.credit(stub, &destination, &req.name, req.amount)?;

        let tx = audit::record_transaction(stub, self.registry, &origin.data.address)?;
        audit::record_transfer(stub, self.registry, Movement {
            asset: &req.name,
            origin: &origin.data.address,
            destination: &destination.address,
            amount: req.amount,
            metadata: &req.metadata,
            is_issue: true,
        }, &tx)?;
        Ok(TxReceipt { tx_id: tx.data.tx_id })
    }

    // --------------------------
    // Transfers
    // --------------------------
    pub fn transfer(&self, stub: &mut dyn LedgerStub, req: &TransferReq) -> LedgerResult<TxReceipt> {
        ensure_positive(req.amount)?;
        if req.address == req.destination {
            return Err(LedgerError::Validation("origin and destination must be different addresses".into()));
        }
        self.assets()?
            .find_by_key(&*stub, &req.asset)?
            .ok_or_else(|| LedgerError::NotFound(format!("the asset {} doesn't exist", req.asset)))?;

        let source = self.owned_address(&*stub, &req.address, stub.creator())?;
        if source.is_burn {
            return Err(LedgerError::Authorization("the burn address can't send funds".into()));
        }
        let destination = self.address(&*stub, &req.destination)
            .map_err(|_| LedgerError::NotFound(format!("the destination address {} doesn't exist", req.destination)))?;

        // Balance read once; both legs derive from it and `req.amount`.
        let from = self.wallet_of(&*stub, &source.address, &req.asset)?;
        let available = from.as_ref().map(|w| w.data.balance).unwrap_or(Decimal::ZERO);
        let remaining = match from {
            Some(_) if available >= req.amount => available - req.amount,
            _ => return Err(LedgerError::InsufficientBalance { needed: req.amount, available }),
        };
        let from_id = from.map(|w| w.data.id).unwrap_or_default();

        self.credit(stub, &destination, &req.asset, req.amount)?;
        self.wallets()?.find_one_and_update(stub, Filter::eq("id", from_id.as_str()), json!({ "balance": amount_value(remaining) }))?;

        let tx = audit::record_transaction(stub, self.registry, &source.address)?;
        audit::record_transfer(stub, self.registry, Movement {
            asset: &req.asset,
            origin: &source.address,
            destination: &destination.address,
            amount: req.amount,
            metadata: &req.metadata,
            is_issue: false,
        }, &tx)?;
        Ok(TxReceipt { tx_id: tx.data.tx_id })
    }

    pub fn find_all_transfers(&self, stub: &dyn LedgerStub, req: &ListTransfersReq) -> LedgerResult<Vec<TransferView>> {
        self.list_movements(stub, req, false)
    }

    pub fn find_all_issues(&self, stub: &dyn LedgerStub, req: &ListTransfersReq) -> LedgerResult<Vec<TransferView>> {
        self.list_movements(stub, req, true)
    }

    pub fn find_transfer(&self, stub: &dyn LedgerStub, req: &FindTransferReq) -> LedgerResult<TransferView> {
        self.find_movement(stub, req, false)
    }

    pub fn find_issue(&self, stub: &dyn LedgerStub, req: &FindTransferReq) -> LedgerResult<TransferView> {
        self.find_movement(stub, req, true)
    }

    fn involving(address: &str) -> Filter {
        Filter::or(vec![
            Filter::eq("origin.address", address),
            Filter::eq("destination.address", address),
        ])
    }

    fn list_movements(&self, stub: &dyn LedgerStub, req: &ListTransfersReq, is_issue: bool) -> LedgerResult<Vec<TransferView>> {
        let mut clauses = vec![Filter::eq("isIssue", is_issue), Self::involving(&req.address)];
        if let Some(asset) = &req.asset {
            clauses.push(Filter::eq("asset.name", asset.as_str()));
        }
        let options = FindOptions::sorted(vec![SortKey::asc("transaction.timestamp")]).page(req.limit(), req.skip());
        Ok(self.transfers()?
            .find(stub, Filter::and(clauses), &options)?
            .into_iter()
            .map(|t| transfer_view(t.data))
            .collect())
    }

    fn find_movement(&self, stub: &dyn LedgerStub, req: &FindTransferReq, is_issue: bool) -> LedgerResult<TransferView> {
        let filter = Filter::and(vec![
            Filter::eq("isIssue", is_issue),
            Filter::eq("txId", req.tx_id.as_str()),
            Self::involving(&req.address),
        ]);
        self.transfers()?
            .find_one(stub, filter, &FindOptions::default())?
            .map(|t| transfer_view(t.data))
            .ok_or_else(|| LedgerError::NotFound(format!("the transfer {} doesn't exist", req.tx_id)))
    }

    pub fn find_transaction(&self, stub: &dyn LedgerStub, req: &FindTransactionReq) -> LedgerResult<Record<Transaction>> {
        self.transactions()?
            .find_one(stub, Filter::eq("txID", req.tx_id.as_str()), &FindOptions::default())?
            .ok_or_else(|| LedgerError::NotFound(format!("the transaction {} doesn't exist", req.tx_id)))
    }

    /// Compares an asset's recorded supply with the sum of its wallets.
    pub fn verify_supply(&self, stub: &dyn LedgerStub, asset: &str) -> LedgerResult<SupplyReport> {
        let record = self.assets()?
            .find_by_key(stub, asset)?
            .ok_or_else(|| LedgerError::NotFound(format!("the asset {} doesn't exist", asset)))?;
        let wallets = self.wallets()?.find(stub, Filter::eq("asset.name", asset), &FindOptions::default())?;
        let wallet_total: Decimal = wallets.iter().map(|w| w.data.balance).sum();
        if wallet_total != record.data.amount {
            return Err(LedgerError::SupplyViolation(format!(
                "asset {}: wallets hold {} but supply is {}", asset, wallet_total, record.data.amount
            )));
        }
        Ok(SupplyReport { asset: asset.to_string(), amount: record.data.amount, wallet_total, wallets: wallets.len() })
    }

    // --------------------------
    // Helpers
    // --------------------------
    fn address(&self, stub: &dyn LedgerStub, address: &str) -> LedgerResult<Address> {
        self.addresses()?
            .find_by_key(stub, address)?
            .map(|a| a.data)
            .ok_or_else(|| LedgerError::NotFound(format!("the address {} doesn't exist", address)))
    }

    fn owned_address(&self, stub: &dyn LedgerStub, address: &str, owner: &str) -> LedgerResult<Address> {
        let found = self.address(stub, address)?;
        if found.creator.name != owner {
            return Err(LedgerError::Authorization(format!("the address {} doesn't belong to {}", address, owner)));
        }
        Ok(found)
    }

    fn wallet_of(&self, stub: &dyn LedgerStub, address: &str, asset: &str) -> LedgerResult<Option<Record<Wallet>>> {
        self.wallets()?.find_one(
            stub,
            Filter::and(vec![Filter::eq("address.address", address), Filter::eq("asset.name", asset)]),
            &FindOptions::default(),
        )
    }

    /// Adds `amount` to the (address, asset) wallet, creating it on first credit.
    fn credit(&self, stub: &mut dyn LedgerStub, address: &Address, asset: &str, amount: Decimal) -> LedgerResult<Record<Wallet>> {
        let wallets = self.wallets()?;
        match self.wallet_of(&*stub, &address.address, asset)? {
            Some(w) => {
                let balance = w.data.balance.checked_add(amount)
                    .ok_or_else(|| LedgerError::Validation("wallet balance overflow".into()))?;
                wallets.find_one_and_update(stub, Filter::eq("id", w.data.id.as_str()), json!({ "balance": amount_value(balance) }))
            }
            None => {
                let draft = wallets.build_from(&Wallet {
                    id: String::new(),
                    address: AddressRef::new(&address.address),
                    asset: AssetRef::new(asset),
                    balance: amount,
                    owner: address.creator.clone(),
                })?;
                wallets.save(stub, draft)
            }
        }
    }
}

fn ensure_positive(amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!("amount must be positive, got {}", amount)));
    }
    Ok(())
}

fn transfer_view(t: Transfer) -> TransferView {
    TransferView {
        asset: t.asset.name,
        origin: t.origin.address,
        destination: t.destination.address,
        amount: t.amount,
        metadata: t.metadata,
        transaction: t.transaction,
    }
}
