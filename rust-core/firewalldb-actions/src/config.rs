// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Action store configuration.
//!
//! Defaults put `actions.db` in the working directory with redb's default
//! page cache. Each field can be overridden from the environment:
//! - `FIREWALLDB_DIR`: directory holding the database file
//! - `FIREWALLDB_FILE`: database file name
//! - `FIREWALLDB_CACHE_SIZE`: redb cache size in bytes

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DIR_ENV: &str = "FIREWALLDB_DIR";
pub const FILE_ENV: &str = "FIREWALLDB_FILE";
pub const CACHE_SIZE_ENV: &str = "FIREWALLDB_CACHE_SIZE";

/// Where and how the persistent action store is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsDbConfig {
    /// Directory holding the database file. Created on open if missing.
    pub dir: PathBuf,
    /// Database file name inside `dir`.
    pub file_name: String,
    /// redb page cache size in bytes; `None` keeps redb's default.
    pub cache_size_bytes: Option<usize>,
}

impl ActionsDbConfig {
    /// Full path of the database file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Defaults overridden by any `FIREWALLDB_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup(DIR_ENV).filter(|v| !v.is_empty()) {
            config.dir = PathBuf::from(dir);
        }
        if let Some(file_name) = lookup(FILE_ENV).filter(|v| !v.is_empty()) {
            config.file_name = file_name;
        }
        if let Some(raw) = lookup(CACHE_SIZE_ENV).filter(|v| !v.is_empty()) {
            match raw.trim().parse::<usize>() {
                Ok(bytes) => config.cache_size_bytes = Some(bytes),
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {CACHE_SIZE_ENV}"),
            }
        }
        config
    }
}

impl Default for ActionsDbConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            file_name: "actions.db".to_string(),
            cache_size_bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ActionsDbConfig::default();
        assert_eq!(config.path(), PathBuf::from("./actions.db"));
        assert_eq!(config.cache_size_bytes, None);
        assert_eq!(ActionsDbConfig::from_lookup(|_| None), config);
    }

    #[test]
    fn test_env_overrides() {
        let config = ActionsDbConfig::from_lookup(lookup_from(&[
            (DIR_ENV, "/var/lib/firewall"),
            (FILE_ENV, "ledger.db"),
            (CACHE_SIZE_ENV, " 4096 "),
        ]));
        assert_eq!(config.path(), PathBuf::from("/var/lib/firewall/ledger.db"));
        assert_eq!(config.cache_size_bytes, Some(4096));
    }

    #[test]
    fn test_invalid_cache_size_is_ignored() {
        let config = ActionsDbConfig::from_lookup(lookup_from(&[(CACHE_SIZE_ENV, "lots")]));
        assert_eq!(config.cache_size_bytes, None);
    }

    #[test]
    fn test_serde_fills_missing_fields() {
        let config: ActionsDbConfig = serde_json::from_str(r#"{"file_name":"x.db"}"#).unwrap();
        assert_eq!(config.dir, PathBuf::from("."));
        assert_eq!(config.file_name, "x.db");
    }
}
