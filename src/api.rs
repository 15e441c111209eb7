use axum::{extract::{Path, State}, http::HeaderMap, Json as AxumJson};
use serde_json::{json, Value};
use std::{str::FromStr, sync::Arc};
use tracing::info;

use crate::config::Config;
use crate::dispatch::{Chaincode, Operation};
use crate::error::LedgerError;
use crate::stub::MemoryLedger;

pub const CREATOR_HEADER: &str = "x-ledger-creator";
pub const API_KEY_HEADER: &str = "x-ledger-key";
/// Identity used for host-initiated calls such as `init`.
pub const HOST_IDENTITY: &str = "host";

pub struct AppState {
    pub ledger: MemoryLedger,
    pub chaincode: Chaincode,
    pub config: Config,
}

fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<(), LedgerError> {
    if let Some(expected) = &state.config.api_key {
        let got = headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok()).unwrap_or("");
        if got != expected {
            return Err(LedgerError::Authorization("invalid api key".into()));
        }
    }
    Ok(())
}

fn creator(headers: &HeaderMap) -> Result<String, LedgerError> {
    headers.get(CREATOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LedgerError::Authorization(format!("missing {} header", CREATOR_HEADER)))
}

pub async fn invoke(
    State(state): State<Arc<AppState>>,
    Path(fcn): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<AxumJson<Value>, LedgerError> {
    require_auth(&state, &headers)?;
    let creator = creator(&headers)?;
    let op = Operation::from_str(&fcn)?;

    let (tx_id, payload) = state.ledger.invoke(&creator, |stub| {
        let out = state.chaincode.execute(stub, op.name(), &body)?;
        Ok((stub.tx_id().to_string(), out))
    })?;

    if op.is_mutating() {
        state.ledger.commit().await?;
    }
    info!("tx={} {} by {} ok", tx_id, fcn, creator);
    Ok(AxumJson(json!({ "txID": tx_id, "payload": payload })))
}

pub async fn init(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<AxumJson<Value>, LedgerError> {
    require_auth(&state, &headers)?;
    let burn = state.ledger.invoke(HOST_IDENTITY, |stub| state.chaincode.init(stub))?;
    state.ledger.commit().await?;
    Ok(AxumJson(json!({ "burnAddress": burn.address })))
}

pub async fn health(State(state): State<Arc<AppState>>) -> AxumJson<Value> {
    AxumJson(json!({ "ok": true, "version": state.ledger.current_version() }))
}
