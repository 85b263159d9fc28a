// Archivo: domain.rs
// Propósito: tipos persistidos (snapshots de autosave, borradores, registro
// de traspaso entre entidades) y el reloj inyectable.
use chrono::{DateTime, Duration, Utc};
use form_domain::{EntityId, FormValues};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Reloj inyectable; las pruebas fijan el instante.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Tipos persistidos con marca de tiempo para la expiración.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;

    /// `true` si la marca es estrictamente anterior a `now - ttl_minutes`.
    fn is_expired(&self, now: DateTime<Utc>, ttl_minutes: i64) -> bool {
        self.timestamp() < now - Duration::minutes(ttl_minutes)
    }
}

/// Copia de trabajo del formulario: valores y posición de navegación.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub values: FormValues,
    pub current_step_index: usize,
    pub timestamp: DateTime<Utc>,
}

impl Timestamped for FormSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Borrador con nombre, retenido por el usuario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub id: Uuid,
    pub label: String,
    pub entity: String,
    pub user_scope: String,
    #[serde(flatten)]
    pub snapshot: FormSnapshot,
}

impl Timestamped for DraftSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.snapshot.timestamp
    }
}

/// Sólo la marca de tiempo: lo que el barrido necesita de cualquier valor.
#[derive(Debug, Deserialize)]
pub(crate) struct TimestampEnvelope {
    pub timestamp: DateTime<Utc>,
}

impl Timestamped for TimestampEnvelope {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Resultado de una escritura de autosave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveOutcome {
    Written,
    /// Mismo contenido que la última escritura; no se tocó el almacenamiento.
    Unchanged,
}

/// Resumen de un barrido de expiración.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: Vec<String>,
    pub corrupt: Vec<String>,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired.len() + self.corrupt.len()
    }
}

/// Contenido de la clave `relationshipFieldInfo`: `{relación: entidad}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipFieldInfo {
    pub fields: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Timestamped for RelationshipFieldInfo {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Traspaso activo entre el formulario origen y el de la entidad
/// relacionada.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossEntityHandoff {
    pub return_url: String,
    pub relationship_name: String,
    pub target_entity: String,
    pub newly_created_entity_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
}

impl Timestamped for CrossEntityHandoff {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl CrossEntityHandoff {
    pub fn is_resolved(&self) -> bool {
        self.newly_created_entity_id.is_some()
    }
}

/// Traspaso completado y ya consumido (sus claves fueron eliminadas).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHandoff {
    pub return_url: String,
    pub relationship_name: String,
    pub target_entity: String,
    pub entity_id: EntityId,
}
