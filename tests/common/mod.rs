#![allow(dead_code)]

use asset_ledger::dispatch::{Chaincode, Operation};
use asset_ledger::error::LedgerResult;
use asset_ledger::filter::{Filter, FindOptions};
use asset_ledger::model::{Asset, Wallet};
use asset_ledger::repo::Repository;
use asset_ledger::schema::SchemaRegistry;
use asset_ledger::stub::MemoryLedger;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::str::FromStr;

pub struct Net {
    pub ledger: MemoryLedger,
    pub cc: Chaincode,
}

impl Net {
    pub fn new() -> Self {
        let cc = Chaincode::new(SchemaRegistry::standard(16).unwrap());
        let ledger = MemoryLedger::new();
        ledger.invoke("host", |stub| cc.init(stub)).unwrap();
        Self { ledger, cc }
    }

    pub fn call(&self, who: &str, fcn: &str, payload: Value) -> LedgerResult<Value> {
        let op = Operation::from_str(fcn)?;
        self.ledger.invoke(who, |stub| self.cc.run(stub, op, payload))
    }

    pub fn call_at(&self, who: &str, tx_id: &str, at: DateTime<Utc>, fcn: &str, payload: Value) -> LedgerResult<Value> {
        let op = Operation::from_str(fcn)?;
        self.ledger.invoke_at(who, tx_id, at, |stub| self.cc.run(stub, op, payload))
    }

    pub fn call_as<T: DeserializeOwned>(&self, who: &str, fcn: &str, payload: Value) -> T {
        serde_json::from_value(self.call(who, fcn, payload).unwrap()).unwrap()
    }

    pub fn register(&self, who: &str, regulator: bool) {
        self.call(who, "register", json!({ "isRegulator": regulator })).unwrap();
    }

    pub fn new_address(&self, who: &str) -> String {
        let v = self.call(who, "createAddress", json!({})).unwrap();
        v["address"].as_str().unwrap().to_string()
    }

    pub fn wallet(&self, address: &str, asset: &str) -> Option<Wallet> {
        self.ledger.invoke("host", |stub| {
            Repository::<Wallet>::new(self.cc.registry())?.find_one(
                &*stub,
                Filter::and(vec![Filter::eq("address.address", address), Filter::eq("asset.name", asset)]),
                &FindOptions::default(),
            )
        }).unwrap().map(|r| r.data)
    }

    pub fn balance(&self, address: &str, asset: &str) -> Decimal {
        self.wallet(address, asset).map(|w| w.balance).unwrap_or(Decimal::ZERO)
    }

    pub fn asset(&self, name: &str) -> Asset {
        self.ledger.invoke("host", |stub| {
            Repository::<Asset>::new(self.cc.registry())?.find_by_key(&*stub, name)
        }).unwrap().unwrap().data
    }

    pub fn supply_ok(&self, asset: &str) -> bool {
        self.call("host", "verifySupply", json!({ "name": asset })).is_ok()
    }
}

pub fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}
