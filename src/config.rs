use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_DB_FILE: &str = "asset_ledger.json";
pub const DEFAULT_ADDRESS_KEY_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    /// `None` keeps the ledger in memory only.
    pub db_file: Option<PathBuf>,
    pub api_key: Option<String>,
    pub address_key_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.into(),
            db_file: Some(PathBuf::from(DEFAULT_DB_FILE)),
            api_key: None,
            address_key_attempts: DEFAULT_ADDRESS_KEY_ATTEMPTS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            bind: get("LEDGER_BIND").unwrap_or(defaults.bind),
            db_file: match get("LEDGER_DB_FILE") {
                Some(p) if p.trim().is_empty() => None,
                Some(p) => Some(PathBuf::from(p)),
                None => defaults.db_file,
            },
            api_key: get("LEDGER_API_KEY").filter(|k| !k.is_empty()),
            address_key_attempts: get("LEDGER_ADDRESS_KEY_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.address_key_attempts),
        }
    }
}
