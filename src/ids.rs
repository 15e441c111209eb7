use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::filter::{Filter, FindOptions};
use crate::model::{Address, NO_CREATOR};
use crate::repo::{Record, Repository};
use crate::schema::{SchemaRegistry, TypeSchema};
use crate::stub::LedgerStub;

/// Hex characters in an address key (SHA-256).
pub const ADDRESS_KEY_LEN: usize = 64;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Fresh value for a `unique` field.
pub fn unique_value() -> String {
    Uuid::new_v4().to_string()
}

fn candidate_address_key() -> String {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seed = format!("{}{}", now, Uuid::new_v4().simple());
    sha256_hex(seed.as_bytes())
}

/// Draws address keys until one is not yet on the ledger, giving up after
/// `max_attempts` draws.
pub fn generate_address_key(stub: &dyn LedgerStub, addresses: &TypeSchema, max_attempts: u32) -> LedgerResult<String> {
    generate_key_with(stub, addresses, max_attempts, candidate_address_key)
}

pub(crate) fn generate_key_with<F>(stub: &dyn LedgerStub, addresses: &TypeSchema, max_attempts: u32, mut next: F) -> LedgerResult<String>
where
    F: FnMut() -> String,
{
    for attempt in 1..=max_attempts {
        let key = next();
        if stub.get_state(&addresses.storage_key(&key))?.is_none() {
            return Ok(key);
        }
        debug!("address key collision on attempt {}", attempt);
    }
    Err(LedgerError::KeyGeneration { attempts: max_attempts })
}

/// Provisions the single burn address. Safe to call repeatedly.
pub fn create_burn_address(stub: &mut dyn LedgerStub, registry: &SchemaRegistry) -> LedgerResult<Record<Address>> {
    let addresses = Repository::<Address>::new(registry)?;
    if let Some(existing) = addresses.find_one(&*stub, Filter::eq("isBurn", true), &FindOptions::default())? {
        warn!("The burn address already exists: {}", existing.data.address);
        return Ok(existing);
    }
    let draft = addresses.build(json!({ "creator": { "name": NO_CREATOR }, "isBurn": true }))?;
    let record = addresses.save(stub, draft)?;
    info!("Burn address provisioned: {}", record.data.address);
    Ok(record)
}

pub fn find_burn_address(stub: &dyn LedgerStub, registry: &SchemaRegistry) -> LedgerResult<Record<Address>> {
    Repository::<Address>::new(registry)?
        .find_one(stub, Filter::eq("isBurn", true), &FindOptions::default())?
        .ok_or_else(|| LedgerError::NotFound("the burn address doesn't exist".into()))
}
