//! Key-value settings store and the handful of keys the pipeline reads.
//!
//! The on-disk INI format belongs to the host; the pipeline only needs
//! `get`/`set` by section and key.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

pub const SETTINGS_SECTION: &str = "settings";
pub const API_KEY: &str = "api_key";
pub const DEBUG: &str = "debug";

pub trait ConfigStore: Send + Sync {
    fn get(&self, section: &str, key: &str) -> Option<String>;
    fn set(&self, section: &str, key: &str, value: &str);
}

/// In-memory store. Section names are case-insensitive.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(api_key: &str) -> Self {
        let store = Self::new();
        store.set(SETTINGS_SECTION, API_KEY, api_key);
        store
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(section.to_lowercase(), key.to_string()))
            .cloned()
    }

    fn set(&self, section: &str, key: &str, value: &str) {
        let key = strip_nuls(key);
        let value = strip_nuls(value).trim().to_string();
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((section.to_lowercase(), key), value);
    }
}

fn strip_nuls(raw: &str) -> String {
    raw.replace('\0', "")
}

/// API key from `[settings] api_key`, empty when unset.
pub fn api_key(store: &dyn ConfigStore) -> String {
    store.get(SETTINGS_SECTION, API_KEY).unwrap_or_default()
}

/// True when `[settings] debug = true`.
pub fn debug_enabled(store: &dyn ConfigStore) -> bool {
    store
        .get(SETTINGS_SECTION, DEBUG)
        .map(|value| value.trim() == "true")
        .unwrap_or(false)
}
