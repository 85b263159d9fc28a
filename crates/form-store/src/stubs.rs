// Archivo: stubs.rs
// Propósito: almacenamiento en memoria para pruebas y wiring rápido. No es
// durable; admite una cuota opcional para simular `QuotaExceeded`.
use crate::errors::{Result, StoreError};
use crate::repository::KeyValueStorage;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

pub struct InMemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
    /// Máximo de bytes (claves + valores) admitidos, si se define.
    quota_bytes: Option<usize>,
}

impl InMemoryStorage {
    /// Crea un almacenamiento vacío sin cuota.
    pub fn new() -> Self {
        Self { entries: Mutex::new(BTreeMap::new()),
               quota_bytes: None }
    }

    /// Crea un almacenamiento que rechaza escrituras por encima de
    /// `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self { entries: Mutex::new(BTreeMap::new()),
               quota_bytes: Some(quota_bytes) }
    }

    /// Número de claves almacenadas.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries.lock().map_err(|e| StoreError::Storage(format!("mutex poisoned: {:?}", e)))
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;
        if let Some(quota) = self.quota_bytes {
            // tamaño resultante si se reemplaza el valor actual
            let used: usize = entries.iter()
                                     .filter(|(k, _)| k.as_str() != key)
                                     .map(|(k, v)| k.len() + v.len())
                                     .sum();
            if used + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded(key.to_string()));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
