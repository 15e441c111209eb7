use crate::error::{LedgerError, LedgerResult};
use crate::filter::Query;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::{fs::File, path::{Path, PathBuf}, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

/// What the core needs from the ledger host during one invocation.
///
/// Reads observe the invocation's own writes. Whether the writes are kept is
/// decided by the host once the invocation returns.
pub trait LedgerStub {
    /// Opaque identity of the calling member.
    fn creator(&self) -> &str;
    fn tx_id(&self) -> &str;
    /// Invocation time; the same value for every read of one invocation.
    fn timestamp(&self) -> DateTime<Utc>;
    fn get_state(&self, key: &str) -> LedgerResult<Option<Value>>;
    fn put_state(&mut self, key: &str, doc: Value) -> LedgerResult<()>;
    fn query(&self, query: &Query) -> LedgerResult<Vec<Value>>;
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct WorldState {
    pub meta: Meta,
    pub entries: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Meta {
    pub version: u64,
    pub created_at: String,
}

/// In-process ledger host. Every invocation runs under the write lock against
/// the committed entries plus a private write-set.
pub struct MemoryLedger {
    state: Arc<RwLock<WorldState>>,
    db_file: Option<PathBuf>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(WorldState {
                meta: Meta { version: 0, created_at: Utc::now().to_rfc3339() },
                ..Default::default()
            })),
            db_file: None,
        }
    }

    /// Mounts the state persisted at `path`, or an empty ledger if the file
    /// does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut ledger = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| LedgerError::LedgerIo(e.to_string()))?;
            let state: WorldState = serde_json::from_str(&content)?;
            Self { state: Arc::new(RwLock::new(state)), db_file: None }
        } else {
            Self::new()
        };
        ledger.db_file = Some(path);
        info!("Ledger mounted. version={}", ledger.current_version());
        Ok(ledger)
    }

    pub fn current_version(&self) -> u64 {
        self.state.read().meta.version
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.read().entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` as one atomic invocation on behalf of `creator`.
    /// On `Err` nothing `f` wrote becomes visible.
    pub fn invoke<T, F>(&self, creator: &str, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut dyn LedgerStub) -> LedgerResult<T>,
    {
        self.invoke_at(creator, &Uuid::new_v4().to_string(), Utc::now(), f)
    }

    pub fn invoke_at<T, F>(&self, creator: &str, tx_id: &str, timestamp: DateTime<Utc>, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut dyn LedgerStub) -> LedgerResult<T>,
    {
        let mut st = self.state.write();
        let (out, writes) = {
            let mut stub = TxStub {
                creator,
                tx_id,
                timestamp,
                base: &st.entries,
                writes: BTreeMap::new(),
            };
            let out = f(&mut stub);
            (out, stub.writes)
        };

        let out = out?;
        if !writes.is_empty() {
            debug!("tx={} applying {} writes", tx_id, writes.len());
            st.entries.extend(writes);
            st.meta.version += 1;
        }
        Ok(out)
    }

    pub async fn commit(&self) -> LedgerResult<()> {
        let Some(db_file) = &self.db_file else { return Ok(()) };
        let snapshot = { self.state.read().clone() };
        let json_str = serde_json::to_string_pretty(&snapshot)?;

        let tmp_file = db_file.with_extension("tmp");
        tokio::fs::write(&tmp_file, json_str).await.map_err(|e| LedgerError::LedgerIo(e.to_string()))?;

        { // fsync tmp
            let f = File::open(&tmp_file).map_err(|e| LedgerError::LedgerIo(e.to_string()))?;
            f.sync_all().map_err(|e| LedgerError::LedgerIo(e.to_string()))?;
        }

        tokio::fs::rename(&tmp_file, db_file).await.map_err(|e| LedgerError::LedgerIo(e.to_string()))?;

        if let Some(parent) = db_file.parent() {
            if let Ok(dir) = File::open(parent) { let _ = dir.sync_all(); }
        }
        Ok(())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

struct TxStub<'a> {
    creator: &'a str,
    tx_id: &'a str,
    timestamp: DateTime<Utc>,
    base: &'a BTreeMap<String, Value>,
    writes: BTreeMap<String, Value>,
}

impl LedgerStub for TxStub<'_> {
    fn creator(&self) -> &str { self.creator }

    fn tx_id(&self) -> &str { self.tx_id }

    fn timestamp(&self) -> DateTime<Utc> { self.timestamp }

    fn get_state(&self, key: &str) -> LedgerResult<Option<Value>> {
        Ok(self.writes.get(key).or_else(|| self.base.get(key)).cloned())
    }

    fn put_state(&mut self, key: &str, doc: Value) -> LedgerResult<()> {
        if key.is_empty() {
            return Err(LedgerError::LedgerIo("empty ledger key".into()));
        }
        self.writes.insert(key.to_string(), doc);
        Ok(())
    }

    fn query(&self, query: &Query) -> LedgerResult<Vec<Value>> {
        // Merged view in key order: pending writes shadow committed entries.
        let mut view: BTreeMap<&str, &Value> = self.base.iter().map(|(k, v)| (k.as_str(), v)).collect();
        for (k, v) in &self.writes {
            view.insert(k.as_str(), v);
        }
        Ok(query.run(view.into_values()))
    }
}
