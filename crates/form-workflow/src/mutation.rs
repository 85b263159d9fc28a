// Archivo: mutation.rs
// Propósito: contrato con el servicio que crea/actualiza entidades y
// serialización de los valores del formulario al payload de envío.
use async_trait::async_trait;
use form_domain::{EntityId, FieldKind, FieldValue, FormConfig, FormValues};
use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;

/// Fallo de la mutación remota.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Error de red: {0}")]
    Network(String),

    #[error("Rechazado por el servidor ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Servicio de entidades. `create` devuelve el id asignado.
#[async_trait]
pub trait EntityMutation: Send + Sync {
    async fn create(&self, entity: &str, payload: JsonValue) -> Result<EntityId, MutationError>;

    async fn update(&self, entity: &str, id: &EntityId, payload: JsonValue) -> Result<EntityId, MutationError>;
}

/// Callbacks del resultado del envío. Si la validación previa falla no se
/// llama a ninguno.
pub trait SubmitCallbacks: Send + Sync {
    fn on_success(&self, payload: &JsonValue, entity_id: &EntityId);

    fn on_error(&self, error: &MutationError);
}

/// Callbacks vacíos.
pub struct NoopCallbacks;

impl SubmitCallbacks for NoopCallbacks {
    fn on_success(&self, _payload: &JsonValue, _entity_id: &EntityId) {}

    fn on_error(&self, _error: &MutationError) {}
}

/// Construye el payload de envío: sólo campos declarados y no vacíos, en
/// orden de declaración (campos primero, después relaciones).
///
/// Los ids numéricos viajan como números, las relaciones múltiples como
/// arrays y las fechas como `YYYY-MM-DD`. Los marcadores pendientes nunca
/// se envían.
pub fn to_wire_payload(config: &FormConfig, values: &FormValues) -> JsonValue {
    let mut payload = Map::new();
    for (name, def) in config.fields() {
        let integer = matches!(def.kind, FieldKind::Number { integer: true, .. });
        if let Some(json) = wire_value(values.value(name), integer) {
            payload.insert(name.clone(), json);
        }
    }
    for name in config.relationships().keys() {
        if let Some(json) = wire_value(values.value(name), false) {
            payload.insert(name.clone(), json);
        }
    }
    JsonValue::Object(payload)
}

fn wire_value(value: &FieldValue, integer: bool) -> Option<JsonValue> {
    if value.is_empty() {
        return None;
    }
    match value {
        FieldValue::Empty | FieldValue::Pending(_) => None,
        FieldValue::Text(s) => Some(JsonValue::String(s.clone())),
        FieldValue::Number(n) => {
            if integer && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Some(JsonValue::from(*n as i64))
            } else {
                Number::from_f64(*n).map(JsonValue::Number)
            }
        }
        FieldValue::Bool(b) => Some(JsonValue::Bool(*b)),
        FieldValue::Date(d) => Some(JsonValue::String(d.format("%Y-%m-%d").to_string())),
        FieldValue::One(id) => Some(wire_id(id)),
        FieldValue::Many(ids) => Some(JsonValue::Array(ids.iter().map(wire_id).collect())),
    }
}

fn wire_id(id: &EntityId) -> JsonValue {
    match id.as_number() {
        Some(n) => JsonValue::from(n),
        None => JsonValue::String(id.as_str().to_string()),
    }
}
