// Archivo: snapshot_store.rs
// Propósito: implementar el `PersistenceStore`: autosave (una ranura por
// entidad, sobrescrita en sitio), borradores con límite y barrido de
// expiración sobre todas las claves de un prefijo.
//
// Los errores de lectura se registran y se tratan como "sin snapshot": un
// fallo del almacenamiento degrada a un formulario vacío, nunca lo rompe.
use crate::domain::{AutosaveOutcome, Clock, DraftSnapshot, FormSnapshot, SweepReport, TimestampEnvelope, Timestamped};
use crate::errors::{Result, StoreError};
use crate::repository::KeyValueStorage;
use form_domain::{FormValues, PersistenceBehavior};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const DRAFT_INFIX: &str = "_draft_";

/// Almacén de snapshots para los formularios que comparten un prefijo.
pub struct PersistenceStore {
    storage: Arc<dyn KeyValueStorage>,
    settings: PersistenceBehavior,
    clock: Clock,
    /// Huella blake3 de la última escritura de autosave por clave.
    fingerprints: Mutex<HashMap<String, blake3::Hash>>,
}

impl PersistenceStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, settings: PersistenceBehavior, clock: Clock) -> Self {
        Self { storage,
               settings,
               clock,
               fingerprints: Mutex::new(HashMap::new()) }
    }

    pub fn settings(&self) -> &PersistenceBehavior {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
        &self.storage
    }

    /// `{prefix}{entity}`
    pub fn autosave_key(&self, entity: &str) -> String {
        format!("{}{}", self.settings.storage_prefix, entity)
    }

    /// `{prefix}{entity}_draft_{id}`
    pub fn draft_key(&self, entity: &str, draft_id: &Uuid) -> String {
        format!("{}{}{}{}", self.settings.storage_prefix, entity, DRAFT_INFIX, draft_id)
    }

    fn draft_prefix(&self, entity: &str) -> String {
        format!("{}{}{}", self.settings.storage_prefix, entity, DRAFT_INFIX)
    }

    /// Serializa `value` y lo escribe en `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.storage.set_item(key, &json)
    }

    /// Lee `key`. Un valor corrupto o expirado se elimina y se devuelve
    /// `None`; un fallo del backend se registra y también da `None`.
    pub fn load<T: DeserializeOwned + Timestamped>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("no se pudo leer {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(value) if value.is_expired((self.clock)(), self.settings.session_timeout_minutes) => {
                debug!("snapshot expirado en {}", key);
                self.discard(key);
                None
            }
            Ok(value) => Some(value),
            Err(e) => {
                warn!("snapshot corrupto en {}: {}", key, e);
                self.discard(key);
                None
            }
        }
    }

    fn discard(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            warn!("no se pudo eliminar {}: {}", key, e);
        }
    }

    /// Escribe el autosave de `entity`. Si el contenido coincide con la
    /// última escritura y la clave sigue presente, no se reescribe.
    pub fn save_autosave(&self, entity: &str, values: &FormValues, current_step_index: usize) -> Result<AutosaveOutcome> {
        let key = self.autosave_key(entity);
        let fingerprint = blake3::hash(&serde_json::to_vec(&(values, current_step_index))?);
        let mut fingerprints =
            self.fingerprints.lock().map_err(|e| StoreError::Storage(format!("mutex poisoned: {:?}", e)))?;
        if fingerprints.get(&key) == Some(&fingerprint) && self.storage.get_item(&key)?.is_some() {
            return Ok(AutosaveOutcome::Unchanged);
        }
        let snapshot = FormSnapshot { values: values.clone(),
                                      current_step_index,
                                      timestamp: (self.clock)() };
        self.save(&key, &snapshot)?;
        fingerprints.insert(key, fingerprint);
        debug!("autosave escrito para {} (paso {})", entity, current_step_index);
        Ok(AutosaveOutcome::Written)
    }

    pub fn load_autosave(&self, entity: &str) -> Option<FormSnapshot> {
        self.load(&self.autosave_key(entity))
    }

    /// Elimina el autosave (tras un envío correcto). Los borradores no se
    /// tocan.
    pub fn clear_autosave(&self, entity: &str) -> Result<()> {
        let key = self.autosave_key(entity);
        if let Ok(mut fingerprints) = self.fingerprints.lock() {
            fingerprints.remove(&key);
        }
        self.storage.remove_item(&key)
    }

    /// Guarda un borrador nuevo. Si se alcanzaría `maxDrafts`, primero se
    /// expulsa el más antiguo, de modo que `list_drafts` nunca ve más de
    /// `maxDrafts` entradas.
    pub fn save_draft(&self,
                      entity: &str,
                      user_scope: &str,
                      label: Option<String>,
                      values: &FormValues,
                      current_step_index: usize)
                      -> Result<DraftSnapshot> {
        let max = self.settings.max_drafts;
        if max == 0 {
            return Err(StoreError::DraftsDisabled(entity.to_string()));
        }
        self.evict_oldest_draft_if_over_limit(entity, user_scope, max - 1)?;

        let now = (self.clock)();
        let label = label.filter(|l| !l.trim().is_empty())
                         .unwrap_or_else(|| format!("Borrador {}", now.format("%Y-%m-%d %H:%M:%S")));
        let draft = DraftSnapshot { id: Uuid::new_v4(),
                                    label,
                                    entity: entity.to_string(),
                                    user_scope: user_scope.to_string(),
                                    snapshot: FormSnapshot { values: values.clone(),
                                                             current_step_index,
                                                             timestamp: now } };
        self.save(&self.draft_key(entity, &draft.id), &draft)?;
        Ok(draft)
    }

    /// Borradores de `entity` para `user_scope`, del más reciente al más
    /// antiguo.
    pub fn list_drafts(&self, entity: &str, user_scope: &str) -> Vec<DraftSnapshot> {
        let keys = match self.storage.keys_with_prefix(&self.draft_prefix(entity)) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("no se pudieron listar borradores de {}: {}", entity, e);
                return Vec::new();
            }
        };
        let mut drafts: Vec<DraftSnapshot> = keys.iter()
                                                 .filter_map(|k| self.load::<DraftSnapshot>(k))
                                                 .filter(|d| d.entity == entity && d.user_scope == user_scope)
                                                 .collect();
        drafts.sort_by(|a, b| {
                  b.snapshot
                   .timestamp
                   .cmp(&a.snapshot.timestamp)
                   .then_with(|| b.id.cmp(&a.id))
              });
        drafts
    }

    pub fn load_draft(&self, entity: &str, draft_id: &Uuid) -> Option<DraftSnapshot> {
        self.load(&self.draft_key(entity, draft_id))
    }

    /// Elimina un borrador; devuelve `true` si existía.
    pub fn delete_draft(&self, entity: &str, draft_id: &Uuid) -> Result<bool> {
        let key = self.draft_key(entity, draft_id);
        let existed = self.storage.get_item(&key)?.is_some();
        self.storage.remove_item(&key)?;
        Ok(existed)
    }

    /// Expulsa los borradores más antiguos hasta dejar como mucho
    /// `max_drafts`. Devuelve los ids expulsados.
    pub fn evict_oldest_draft_if_over_limit(&self,
                                            entity: &str,
                                            user_scope: &str,
                                            max_drafts: usize)
                                            -> Result<Vec<Uuid>> {
        let drafts = self.list_drafts(entity, user_scope);
        let mut evicted = Vec::new();
        // list_drafts ordena del más reciente al más antiguo
        for draft in drafts.iter().skip(max_drafts).rev() {
            self.storage.remove_item(&self.draft_key(entity, &draft.id))?;
            debug!("borrador expulsado {} ({})", draft.id, draft.label);
            evicted.push(draft.id);
        }
        Ok(evicted)
    }

    /// Barrido de expiración: elimina cualquier valor bajo `prefixes` cuya
    /// marca de tiempo sea anterior a `now - ttl_minutes`, y cualquier valor
    /// que no se pueda interpretar.
    pub fn sweep_expired(&self, prefixes: &[&str], ttl_minutes: i64) -> Result<SweepReport> {
        let now = (self.clock)();
        let mut report = SweepReport::default();
        let keys = self.storage.keys()?;
        for key in keys.iter().filter(|k| prefixes.iter().any(|p| k.starts_with(p))) {
            report.scanned += 1;
            let Some(raw) = self.storage.get_item(key)? else {
                continue;
            };
            match serde_json::from_str::<TimestampEnvelope>(&raw) {
                Ok(env) if env.is_expired(now, ttl_minutes) => {
                    self.storage.remove_item(key)?;
                    report.expired.push(key.clone());
                }
                Ok(_) => {}
                Err(_) => {
                    self.storage.remove_item(key)?;
                    report.corrupt.push(key.clone());
                }
            }
        }
        if report.removed() > 0 {
            debug!("barrido: {} claves eliminadas de {}", report.removed(), report.scanned);
        }
        Ok(report)
    }
}
