// Archivo: handoff.rs
// Propósito: implementar el `CrossEntityBridge`, el registro de traspaso que
// permite salir del formulario A para crear la entidad B y volver a A con B
// ya seleccionada.
//
// El registro vive en tres claves globales (`returnUrl`,
// `relationshipFieldInfo`, `newlyCreatedEntityId`). Hay como mucho un
// traspaso activo por pestaña: empezar otro sobrescribe el anterior.
// Consumir un traspaso resuelto elimina las tres claves (lectura única).
use crate::domain::{Clock, CrossEntityHandoff, RelationshipFieldInfo, ResolvedHandoff, Timestamped};
use crate::errors::Result;
use crate::repository::KeyValueStorage;
use form_domain::{CrossEntityKeys, EntityId};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct CrossEntityBridge {
    storage: Arc<dyn KeyValueStorage>,
    keys: CrossEntityKeys,
    clock: Clock,
}

impl CrossEntityBridge {
    pub fn new(storage: Arc<dyn KeyValueStorage>, keys: CrossEntityKeys, clock: Clock) -> Self {
        Self { storage, keys, clock }
    }

    pub fn keys(&self) -> &CrossEntityKeys {
        &self.keys
    }

    /// Registra un traspaso para `relationship_name` -> `target_entity`.
    /// Un traspaso previo sin consumir se sobrescribe (limitación conocida:
    /// un solo traspaso por pestaña).
    pub fn begin(&self, return_url: &str, relationship_name: &str, target_entity: &str) -> Result<CrossEntityHandoff> {
        if let Some(previous) = self.active() {
            warn!("traspaso previo sobrescrito: {} -> {} (volvía a {})",
                  previous.relationship_name, previous.target_entity, previous.return_url);
        }
        let created_at = (self.clock)();
        let info = RelationshipFieldInfo { fields: BTreeMap::from([(relationship_name.to_string(),
                                                                    target_entity.to_string())]),
                                           created_at };
        self.storage.remove_item(&self.keys.new_entity_id_key)?;
        self.storage.set_item(&self.keys.relationship_info_key, &serde_json::to_string(&info)?)?;
        self.storage.set_item(&self.keys.return_url_key, return_url)?;
        info!("traspaso iniciado: {} -> {}", relationship_name, target_entity);
        Ok(CrossEntityHandoff { return_url: return_url.to_string(),
                                relationship_name: relationship_name.to_string(),
                                target_entity: target_entity.to_string(),
                                newly_created_entity_id: None,
                                created_at })
    }

    /// Traspaso activo, resuelto o no. Un registro incompleto o corrupto se
    /// elimina y se trata como inexistente.
    pub fn active(&self) -> Option<CrossEntityHandoff> {
        match self.read() {
            Ok(found) => found,
            Err(reason) => {
                warn!("traspaso inválido descartado: {}", reason);
                self.clear_quietly();
                None
            }
        }
    }

    fn read(&self) -> std::result::Result<Option<CrossEntityHandoff>, String> {
        let info_raw = self.storage.get_item(&self.keys.relationship_info_key).map_err(|e| e.to_string())?;
        let url = self.storage.get_item(&self.keys.return_url_key).map_err(|e| e.to_string())?;
        let new_id = self.storage.get_item(&self.keys.new_entity_id_key).map_err(|e| e.to_string())?;

        let (info_raw, return_url) = match (info_raw, url) {
            (None, None) if new_id.is_none() => return Ok(None),
            (Some(info), Some(url)) => (info, url),
            _ => return Err("registro incompleto".into()),
        };
        let info: RelationshipFieldInfo = serde_json::from_str(&info_raw).map_err(|e| e.to_string())?;
        let mut fields = info.fields.into_iter();
        let (relationship_name, target_entity) = match (fields.next(), fields.next()) {
            (Some(entry), None) => entry,
            _ => return Err("relationshipFieldInfo debe tener exactamente una relación".into()),
        };
        let newly_created_entity_id = new_id.map(|s| s.trim().to_string())
                                            .filter(|s| !s.is_empty())
                                            .map(EntityId::new);
        Ok(Some(CrossEntityHandoff { return_url,
                                     relationship_name,
                                     target_entity,
                                     newly_created_entity_id,
                                     created_at: info.created_at }))
    }

    /// Llamado por el formulario de `entity` tras crear `new_id`. Si hay un
    /// traspaso activo hacia ese tipo de entidad, guarda el id y devuelve la
    /// URL de retorno.
    pub fn complete(&self, entity: &str, new_id: &EntityId) -> Result<Option<String>> {
        match self.active() {
            Some(handoff) if handoff.target_entity == entity && !handoff.is_resolved() => {
                self.storage.set_item(&self.keys.new_entity_id_key, new_id.as_str())?;
                info!("traspaso resuelto: {} = {}", handoff.relationship_name, new_id);
                Ok(Some(handoff.return_url))
            }
            _ => Ok(None),
        }
    }

    /// Consume un traspaso resuelto si `accepts` lo reconoce como propio
    /// (misma relación, misma entidad destino, misma URL de retorno). Las
    /// claves se eliminan antes de devolverlo, de modo que no puede
    /// consumirse dos veces.
    pub fn take_resolved_for<F>(&self, accepts: F) -> Option<ResolvedHandoff>
        where F: Fn(&CrossEntityHandoff) -> bool
    {
        let handoff = self.active()?;
        let entity_id = handoff.newly_created_entity_id.clone()?;
        if !accepts(&handoff) {
            return None;
        }
        if let Err(e) = self.clear() {
            // sin borrado no hay garantía de lectura única
            warn!("no se pudo eliminar el traspaso consumido: {}", e);
            return None;
        }
        Some(ResolvedHandoff { return_url: handoff.return_url,
                               relationship_name: handoff.relationship_name,
                               target_entity: handoff.target_entity,
                               entity_id })
    }

    /// Elimina las tres claves (traspaso cancelado o consumido).
    pub fn clear(&self) -> Result<()> {
        self.storage.remove_item(&self.keys.return_url_key)?;
        self.storage.remove_item(&self.keys.relationship_info_key)?;
        self.storage.remove_item(&self.keys.new_entity_id_key)
    }

    fn clear_quietly(&self) {
        if let Err(e) = self.clear() {
            warn!("no se pudo limpiar el traspaso: {}", e);
        }
    }

    /// Recolecta un traspaso abandonado más antiguo que `ttl_minutes`.
    /// Devuelve `true` si se eliminó un traspaso válido expirado (los
    /// corruptos ya se descartan al leerlos).
    pub fn sweep_expired(&self, ttl_minutes: i64) -> bool {
        match self.active() {
            Some(handoff) => {
                if handoff.is_expired((self.clock)(), ttl_minutes) {
                    info!("traspaso abandonado recolectado: {}", handoff.relationship_name);
                    self.clear_quietly();
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }
}
