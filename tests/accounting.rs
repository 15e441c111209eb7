mod common;

use asset_ledger::error::LedgerError;
use asset_ledger::types::{AddressView, AssetView, TransferView, TxReceipt};
use chrono::{TimeZone, Utc};
use common::{dec, Net};
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

fn bank_with_usd(net: &Net) -> String {
    net.register("bank", true);
    let a1 = net.new_address("bank");
    net.call("bank", "createAsset", json!({ "name": "USD", "amount": 1000, "address": a1 })).unwrap();
    a1
}

#[test]
fn create_asset_credits_the_creating_wallet() {
    let net = Net::new();
    let a1 = bank_with_usd(&net);

    assert_eq!(net.balance(&a1, "USD"), dec(1000));
    let asset = net.asset("USD");
    assert_eq!(asset.amount, dec(1000));
    assert_eq!(asset.units, Decimal::new(1, 2));
    assert!(asset.open);
    assert_eq!(net.wallet(&a1, "USD").unwrap().owner.name, "bank");

    let listed: Vec<AssetView> = net.call_as("bank", "findAllAssets", json!({}));
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].qty, dec(1000));
    assert!(net.supply_ok("USD"));
}

#[test]
fn transfer_scenario_and_insufficient_balance() {
    let net = Net::new();
    let a1 = bank_with_usd(&net);
    net.register("alice", false);
    let a2 = net.new_address("alice");

    let receipt: TxReceipt = net.call_as("bank", "transferAsset", json!({
        "address": a1, "asset": "USD", "destination": a2, "amount": 400, "metadata": "invoice 7"
    }));
    assert_eq!(net.balance(&a1, "USD"), dec(600));
    assert_eq!(net.balance(&a2, "USD"), dec(400));
    assert_eq!(net.wallet(&a2, "USD").unwrap().owner.name, "alice");

    let transfers: Vec<TransferView> = net.call_as("bank", "findAllTransfers", json!({ "address": a1 }));
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].amount, dec(400));
    assert_eq!(transfers[0].metadata, "invoice 7");
    assert_eq!(transfers[0].transaction.tx_id, receipt.tx_id);
    assert_eq!(transfers[0].transaction.address, a1);
    assert!(transfers[0].transaction.is_final);
    let issues: Vec<TransferView> = net.call_as("bank", "findAllIssues", json!({ "address": a1 }));
    assert!(issues.is_empty());

    let version = net.ledger.current_version();
    let err = net.call("bank", "transferAsset", json!({
        "address": a1, "asset": "USD", "destination": a2, "amount": 700
    })).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { needed, available } if needed == dec(700) && available == dec(600)));
    assert_eq!(net.ledger.current_version(), version);
    assert_eq!(net.balance(&a1, "USD"), dec(600));
    assert_eq!(net.balance(&a2, "USD"), dec(400));
    assert!(net.supply_ok("USD"));
}

#[test]
fn exact_balance_can_be_sent_and_leaves_zero_wallet() {
    let net = Net::new();
    let a1 = bank_with_usd(&net);
    let a2 = net.new_address("bank");

    net.call("bank", "transferAsset", json!({ "address": a1, "asset": "USD", "destination": a2, "amount": 1000 })).unwrap();
    assert_eq!(net.wallet(&a1, "USD").unwrap().balance, Decimal::ZERO);
    assert_eq!(net.balance(&a2, "USD"), dec(1000));

    let err = net.call("bank", "transferAsset", json!({ "address": a1, "asset": "USD", "destination": a2, "amount": 1 })).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
}

#[test]
fn transfer_preconditions() {
    let net = Net::new();
    let a1 = bank_with_usd(&net);
    net.register("mallory", false);
    let m1 = net.new_address("mallory");
    let burn = net.call("bank", "findBurnAddress", json!({})).unwrap();
    let burn = burn.as_str().unwrap().to_string();

    let err = net.call("bank", "transferAsset", json!({ "address": a1, "asset": "EUR", "destination": m1, "amount": 1 })).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let err = net.call("mallory", "transferAsset", json!({ "address": a1, "asset": "USD", "destination": m1, "amount": 1 })).unwrap_err();
    assert!(matches!(err, LedgerError::Authorization(_)));

    let err = net.call("bank", "transferAsset", json!({ "address": a1, "asset": "USD", "destination": "ff", "amount": 1 })).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let err = net.call("bank", "transferAsset", json!({ "address": a1, "asset": "USD", "destination": a1, "amount": 1 })).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = net.call("bank", "transferAsset", json!({ "address": a1, "asset": "USD", "destination": m1, "amount": 0 })).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = net.call("mallory", "transferAsset", json!({ "address": m1, "asset": "USD", "destination": a1, "amount": 5 })).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { available, .. } if available == Decimal::ZERO));

    // Funds sent to the burn address can never leave it.
    net.call("bank", "transferAsset", json!({ "address": a1, "asset": "USD", "destination": burn, "amount": 10 })).unwrap();
    assert_eq!(net.balance(&burn, "USD"), dec(10));
    let err = net.call("none", "transferAsset", json!({ "address": burn, "asset": "USD", "destination": a1, "amount": 10 })).unwrap_err();
    assert!(matches!(err, LedgerError::Authorization(_)));
    assert!(net.supply_ok("USD"));
}

#[test]
fn only_the_regulator_issues() {
    let net = Net::new();
    let a1 = bank_with_usd(&net);
    net.register("alice", false);
    let a2 = net.new_address("alice");

    let err = net.call("alice", "issueMoreAsset", json!({ "name": "USD", "amount": 50, "address": a2 })).unwrap_err();
    assert!(matches!(err, LedgerError::Authorization(_)));
    assert_eq!(net.asset("USD").amount, dec(1000));

    let err = net.call("bank", "issueMoreAsset", json!({ "name": "GBP", "amount": 50, "address": a2 })).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let receipt: TxReceipt = net.call_as("bank", "issueMoreAsset", json!({
        "name": "USD", "amount": 250, "address": a2, "metadata": "quarterly"
    }));
    assert_eq!(net.asset("USD").amount, dec(1250));
    assert_eq!(net.balance(&a2, "USD"), dec(250));
    assert_eq!(net.balance(&a1, "USD"), dec(1000));
    assert!(net.supply_ok("USD"));

    let issues: Vec<TransferView> = net.call_as("alice", "findAllIssues", json!({ "address": a2 }));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].origin, a1);
    assert_eq!(issues[0].destination, a2);

    let issue: TransferView = net.call_as("alice", "findIssue", json!({ "address": a2, "txID": receipt.tx_id }));
    assert_eq!(issue.amount, dec(250));
    let err = net.call("alice", "findTransfer", json!({ "address": a2, "txID": receipt.tx_id })).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let tx = net.call("alice", "findTransaction", json!({ "txID": receipt.tx_id })).unwrap();
    assert_eq!(tx["address"], json!(a1));
}

#[test]
fn conservation_holds_across_a_sequence() {
    let net = Net::new();
    let a1 = bank_with_usd(&net);
    net.register("alice", false);
    net.register("bob", false);
    let a2 = net.new_address("alice");
    let a3 = net.new_address("bob");
    let addrs = [a1.as_str(), a2.as_str(), a3.as_str()];

    // (caller, from, to, amount, succeeds, issue 5 to `to` afterwards, balances after the step)
    let steps: [(&str, usize, usize, i64, bool, bool, [i64; 3]); 6] = [
        ("bank", 0, 1, 300, true, true, [700, 305, 0]),
        ("alice", 1, 2, 120, true, false, [700, 185, 120]),
        ("bob", 2, 0, 20, true, true, [725, 185, 100]),
        ("alice", 1, 0, 500, false, false, [725, 185, 100]),
        ("bob", 2, 1, 100, true, true, [725, 290, 0]),
        ("bank", 0, 2, 720, true, false, [5, 290, 720]),
    ];
    let mut supply = 1000;
    for (i, (who, from, to, amount, succeeds, issue, expected)) in steps.into_iter().enumerate() {
        let res = net.call(who, "transferAsset", json!({
            "address": addrs[from], "asset": "USD", "destination": addrs[to], "amount": amount
        }));
        if succeeds {
            assert!(res.is_ok(), "step {} failed: {:?}", i, res);
        } else {
            assert!(matches!(res, Err(LedgerError::InsufficientBalance { .. })), "step {}: {:?}", i, res);
        }
        if issue {
            net.call("bank", "issueMoreAsset", json!({ "name": "USD", "amount": 5, "address": addrs[to] })).unwrap();
            supply += 5;
        }

        let balances: Vec<Decimal> = addrs.iter().map(|a| net.balance(a, "USD")).collect();
        assert_eq!(balances, expected.iter().map(|n| dec(*n)).collect::<Vec<_>>(), "balances after step {}", i);
        assert_eq!(net.asset("USD").amount, dec(supply));
        assert!(net.supply_ok("USD"), "supply broken after step {}", i);
    }

    let transfers: Vec<TransferView> = net.call_as("bank", "findAllTransfers", json!({ "address": a1 }));
    assert_eq!(transfers.len(), 3);
}

#[test]
fn large_amounts_are_conserved_exactly() {
    let net = Net::new();
    net.register("bank", true);
    let a1 = net.new_address("bank");
    let a2 = net.new_address("bank");
    let big = |s: &str| Decimal::from_str(s).unwrap();

    net.call("bank", "createAsset", json!({ "name": "USD", "amount": "10000000000000000", "address": a1 })).unwrap();
    net.call("bank", "issueMoreAsset", json!({ "name": "USD", "amount": "1", "address": a2 })).unwrap();
    assert_eq!(net.asset("USD").amount, big("10000000000000001"));
    assert_eq!(net.balance(&a1, "USD"), big("10000000000000000"));
    assert_eq!(net.balance(&a2, "USD"), dec(1));
    assert!(net.supply_ok("USD"));

    net.call("bank", "transferAsset", json!({ "address": a1, "asset": "USD", "destination": a2, "amount": "10" })).unwrap();
    net.call("bank", "transferAsset", json!({ "address": a2, "asset": "USD", "destination": a1, "amount": "1" })).unwrap();
    assert_eq!(net.balance(&a1, "USD"), big("9999999999999991"));
    assert_eq!(net.balance(&a2, "USD"), dec(10));
    assert!(net.supply_ok("USD"));

    net.call("bank", "issueMoreAsset", json!({ "name": "USD", "amount": "0.000001", "address": a2 })).unwrap();
    assert_eq!(net.balance(&a2, "USD"), big("10.000001"));
    assert_eq!(net.asset("USD").amount, big("10000000000000001.000001"));
    assert!(net.supply_ok("USD"));

    // The ledger keeps every digit.
    let wallet = net.wallet(&a1, "USD").unwrap();
    let stored = net.ledger.get(&format!("wallets/{}", wallet.id)).unwrap();
    assert_eq!(stored["balance"], json!("9999999999999991"));
}

#[test]
fn fractional_amounts_stay_exact() {
    let net = Net::new();
    net.register("bank", true);
    let a1 = net.new_address("bank");
    let a2 = net.new_address("bank");
    net.call("bank", "createAsset", json!({ "name": "BRL", "amount": 0.3, "address": a1, "units": 0.1 })).unwrap();
    net.call("bank", "transferAsset", json!({ "address": a1, "asset": "BRL", "destination": a2, "amount": 0.1 })).unwrap();
    net.call("bank", "transferAsset", json!({ "address": a1, "asset": "BRL", "destination": a2, "amount": 0.2 })).unwrap();
    assert_eq!(net.balance(&a1, "BRL"), Decimal::ZERO);
    assert_eq!(net.balance(&a2, "BRL"), Decimal::new(3, 1));
    assert!(net.supply_ok("BRL"));
}

#[test]
fn asset_creation_rules() {
    let net = Net::new();
    let a1 = bank_with_usd(&net);
    net.register("alice", false);
    let a2 = net.new_address("alice");

    let err = net.call("bank", "createAsset", json!({ "name": "USD", "amount": 1, "address": a1 })).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));

    let err = net.call("bank", "createAsset", json!({ "name": "EUR", "amount": 1, "address": a2 })).unwrap_err();
    assert!(matches!(err, LedgerError::Authorization(_)));

    let err = net.call("bank", "createAsset", json!({ "name": "EUR", "amount": -1, "address": a1 })).unwrap_err();
    assert!(matches!(err, LedgerError::Validator { .. }));
    assert!(net.call("bank", "findAllAssets", json!({})).unwrap().as_array().unwrap().len() == 1);

    let err = net.call("ghost", "createAsset", json!({ "name": "EUR", "amount": 1, "address": a1 })).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[test]
fn members_and_regulator_are_unique() {
    let net = Net::new();
    net.register("bank", true);

    let err = net.call("bank", "register", json!({})).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));

    let err = net.call("central", "register", json!({ "isRegulator": "true" })).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));

    let m = net.call("central", "register", json!({ "isRegulator": "false" })).unwrap();
    assert_eq!(m["isRegulator"], json!(false));
    assert_eq!(m["docType"], json!("members"));

    let err = net.call("none", "register", json!({})).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[test]
fn imported_addresses_are_watch_only() {
    let net = Net::new();
    let a1 = bank_with_usd(&net);
    net.register("auditor", false);

    let err = net.call("auditor", "findAddress", json!({ "address": a1 })).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let view: AddressView = net.call_as("auditor", "importAddress", json!({ "address": a1 }));
    assert!(view.is_watch_only);
    assert_eq!(view.assets[0].balance, dec(1000));

    let err = net.call("auditor", "importAddress", json!({ "address": a1 })).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));
    let err = net.call("bank", "importAddress", json!({ "address": a1 })).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));

    let all: Vec<AddressView> = net.call_as("auditor", "findAllAddresses", json!({}));
    assert_eq!(all.len(), 1);
    let own: Vec<AddressView> = net.call_as("bank", "findAllAddresses", json!({}));
    assert_eq!(own.len(), 1);
    assert!(!own[0].is_watch_only);

    // Read access does not grant spending.
    let own_address = net.new_address("auditor");
    let err = net.call("auditor", "transferAsset", json!({
        "address": a1, "asset": "USD", "destination": own_address, "amount": 1
    })).unwrap_err();
    assert!(matches!(err, LedgerError::Authorization(_)));
}

#[test]
fn transfer_listing_sorts_by_time_and_pages() {
    let net = Net::new();
    let a1 = bank_with_usd(&net);
    let a2 = net.new_address("bank");
    net.call("bank", "createAsset", json!({ "name": "EUR", "amount": 100, "address": a1 })).unwrap();

    // Submitted out of time order.
    let plan = [(3, "USD", 30), (1, "USD", 10), (2, "EUR", 20), (4, "USD", 40)];
    for (minute, asset, amount) in plan {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap();
        net.call_at("bank", &format!("tx-{}", minute), at, "transferAsset", json!({
            "address": a1, "asset": asset, "destination": a2, "amount": amount
        })).unwrap();
    }

    let all: Vec<TransferView> = net.call_as("bank", "findAllTransfers", json!({ "address": a2 }));
    let amounts: Vec<Decimal> = all.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![dec(10), dec(20), dec(30), dec(40)]);

    let usd: Vec<TransferView> = net.call_as("bank", "findAllTransfers", json!({ "address": a2, "asset": "USD", "count": 2, "skip": 1 }));
    let amounts: Vec<Decimal> = usd.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![dec(30), dec(40)]);

    let one: TransferView = net.call_as("bank", "findTransfer", json!({ "address": a1, "txID": "tx-2" }));
    assert_eq!(one.asset, "EUR");
    let err = net.call("bank", "findTransfer", json!({ "address": a1, "txID": "tx-9" })).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[test]
fn unknown_operations_and_bad_payloads() {
    let net = Net::new();
    let err = net.call("bank", "mint", json!({})).unwrap_err();
    assert!(matches!(err, LedgerError::UnknownOperation(_)));

    net.register("bank", true);
    let err = net.call("bank", "transferAsset", json!({ "address": "x" })).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let text = net.ledger
        .invoke("bank", |stub| Ok(net.cc.invoke(stub, "findAddress", "{not json")))
        .unwrap()
        .unwrap_err();
    assert!(text.starts_with("Validation Error"));
}
