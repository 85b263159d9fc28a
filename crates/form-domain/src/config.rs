// config.rs
//
// Configuración declarativa de un formulario por entidad. La forma JSON se
// deserializa en `RawFormConfig` y se valida en `FormConfig::try_from`: una
// `FormConfig` construida siempre es coherente (pasos, campos, relaciones y
// dependencias).
use crate::cascade::CascadeGraph;
use crate::errors::ConfigError;
use crate::values::{EntityId, FieldValue};
use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
  #[default]
  OnBlur,
  OnChange,
  OnSubmit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepValidation {
  pub mode: ValidationMode,
  pub validate_on_next: bool,
}

impl Default for StepValidation {
  fn default() -> Self {
    StepValidation { mode: ValidationMode::OnBlur, validate_on_next: true }
  }
}

/// Un paso del asistente: grupo ordenado de campos y relaciones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepConfig {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub fields: Vec<String>,
  #[serde(default)]
  pub relationships: Vec<String>,
  #[serde(default)]
  pub validation: StepValidation,
}

impl StepConfig {
  /// Campos y relaciones del paso en orden de declaración.
  pub fn members(&self) -> impl Iterator<Item = &str> {
    self.fields.iter().chain(self.relationships.iter()).map(String::as_str)
  }

  pub fn is_review(&self) -> bool {
    self.fields.is_empty() && self.relationships.is_empty()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextFormat {
  #[default]
  Plain,
  Email,
  Url,
  Phone,
  Multiline,
}

/// Tipos de campo soportados. Un `type` desconocido se rechaza al cargar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FieldKind {
  Text {
    #[serde(default)]
    format: TextFormat,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<String>,
  },
  Number {
    min: Option<f64>,
    max: Option<f64>,
    #[serde(default)]
    integer: bool,
  },
  Boolean,
  Date {
    min: Option<NaiveDate>,
    max: Option<NaiveDate>,
  },
  Select {
    options: Vec<String>,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
  pub label: String,
  #[serde(default)]
  pub required: bool,
  #[serde(flatten)]
  pub kind: FieldKind,
  #[serde(default)]
  pub placeholder: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default, rename = "default")]
  pub default_value: Option<JsonValue>,
}

impl FieldDefinition {
  /// Convierte el `default` declarado al `FieldValue` del tipo del campo.
  pub fn initial_value(&self) -> Result<FieldValue, String> {
    let Some(raw) = &self.default_value else {
      return Ok(FieldValue::Empty);
    };
    match (&self.kind, raw) {
      (_, JsonValue::Null) => Ok(FieldValue::Empty),
      (FieldKind::Text { .. }, JsonValue::String(s)) => Ok(FieldValue::Text(s.clone())),
      (FieldKind::Number { .. }, JsonValue::Number(n)) => {
        n.as_f64().map(FieldValue::Number).ok_or_else(|| format!("número fuera de rango: {}", n))
      }
      (FieldKind::Boolean, JsonValue::Bool(b)) => Ok(FieldValue::Bool(*b)),
      (FieldKind::Date { .. }, JsonValue::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(FieldValue::Date)
        .map_err(|e| format!("fecha inválida {}: {}", s, e)),
      (FieldKind::Select { options }, JsonValue::String(s)) => {
        if options.contains(s) {
          Ok(FieldValue::Text(s.clone()))
        } else {
          Err(format!("opción no declarada: {}", s))
        }
      }
      (_, other) => Err(format!("valor por defecto incompatible: {}", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
  #[default]
  Single,
  Multiple,
}

/// Campo que referencia otra entidad por id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelationshipDefinition {
  pub label: String,
  pub target_entity: String,
  #[serde(default)]
  pub cardinality: Cardinality,
  #[serde(default)]
  pub required: bool,
  #[serde(default)]
  pub allow_inline_create: bool,
  /// Relaciones que se vacían cuando ésta cambia.
  #[serde(default)]
  pub dependents: Vec<String>,
  #[serde(default)]
  pub display_field: Option<String>,
}

impl RelationshipDefinition {
  /// Fusiona un id recién creado según la cardinalidad: reemplaza en
  /// `Single`, añade sin duplicar en `Multiple`.
  pub fn merge_id(&self, current: &FieldValue, id: EntityId) -> FieldValue {
    match self.cardinality {
      Cardinality::Single => FieldValue::One(id),
      Cardinality::Multiple => {
        let mut ids = match current {
          FieldValue::Many(ids) => ids.clone(),
          FieldValue::One(existing) => vec![existing.clone()],
          _ => Vec::new(),
        };
        if !ids.contains(&id) {
          ids.push(id);
        }
        FieldValue::Many(ids)
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveBehavior {
  #[default]
  OnChange,
  OnUnload,
  Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutosaveBehavior {
  pub enabled: bool,
  pub debounce_ms: u64,
  pub save_behavior: SaveBehavior,
}

impl Default for AutosaveBehavior {
  fn default() -> Self {
    AutosaveBehavior { enabled: true, debounce_ms: 1000, save_behavior: SaveBehavior::OnChange }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceBehavior {
  pub storage_prefix: String,
  pub session_timeout_minutes: i64,
  pub max_drafts: usize,
}

impl Default for PersistenceBehavior {
  fn default() -> Self {
    PersistenceBehavior { storage_prefix: "entity_form_".into(), session_timeout_minutes: 60, max_drafts: 5 }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationBehavior {
  pub allow_step_skipping: bool,
  pub confirm_dialog: bool,
}

impl Default for NavigationBehavior {
  fn default() -> Self {
    NavigationBehavior { allow_step_skipping: false, confirm_dialog: true }
  }
}

/// Nombres de las tres claves globales del traspaso entre entidades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossEntityKeys {
  pub return_url_key: String,
  pub relationship_info_key: String,
  pub new_entity_id_key: String,
}

impl CrossEntityKeys {
  pub fn names(&self) -> [&str; 3] {
    [&self.return_url_key, &self.relationship_info_key, &self.new_entity_id_key]
  }
}

impl Default for CrossEntityKeys {
  fn default() -> Self {
    CrossEntityKeys { return_url_key: "returnUrl".into(),
                      relationship_info_key: "relationshipFieldInfo".into(),
                      new_entity_id_key: "newlyCreatedEntityId".into() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviorConfig {
  pub autosave: AutosaveBehavior,
  pub persistence: PersistenceBehavior,
  pub navigation: NavigationBehavior,
  pub cross_entity: CrossEntityKeys,
  /// Relaciones ordenadas de mayor a menor nivel (p.ej. país, región,
  /// ciudad). Cambiar un nivel vacía todos los inferiores.
  pub hierarchy: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawFormConfig {
  entity: String,
  steps: Vec<StepConfig>,
  #[serde(default)]
  fields: IndexMap<String, FieldDefinition>,
  #[serde(default)]
  relationships: IndexMap<String, RelationshipDefinition>,
  #[serde(default)]
  behavior: BehaviorConfig,
}

/// Configuración inmutable de un formulario de entidad.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawFormConfig", rename_all = "camelCase")]
pub struct FormConfig {
  entity: String,
  steps: Vec<StepConfig>,
  fields: IndexMap<String, FieldDefinition>,
  relationships: IndexMap<String, RelationshipDefinition>,
  behavior: BehaviorConfig,
  #[serde(skip)]
  step_index: HashMap<String, usize>,
  #[serde(skip)]
  cascade: CascadeGraph,
}

impl TryFrom<RawFormConfig> for FormConfig {
  type Error = ConfigError;

  fn try_from(raw: RawFormConfig) -> Result<Self, Self::Error> {
    if raw.steps.is_empty() {
      return Err(ConfigError::EmptySteps(raw.entity));
    }

    let mut seen_steps: Vec<&str> = Vec::with_capacity(raw.steps.len());
    let mut step_index: HashMap<String, usize> = HashMap::new();
    for (idx, step) in raw.steps.iter().enumerate() {
      if seen_steps.contains(&step.id.as_str()) {
        return Err(ConfigError::DuplicateStep(step.id.clone()));
      }
      seen_steps.push(&step.id);

      for field in &step.fields {
        if !raw.fields.contains_key(field) {
          return Err(ConfigError::UnknownField { step: step.id.clone(), field: field.clone() });
        }
      }
      for rel in &step.relationships {
        if !raw.relationships.contains_key(rel) {
          return Err(ConfigError::UnknownRelationship(rel.clone()));
        }
      }
      for member in step.members() {
        if let Some(prev) = step_index.insert(member.to_string(), idx) {
          return Err(ConfigError::FieldInMultipleSteps { field: member.to_string(),
                                                         first: raw.steps[prev].id.clone(),
                                                         second: step.id.clone() });
        }
      }
    }

    for (name, def) in &raw.fields {
      check_field(name, def)?;
    }

    check_storage_prefix(&raw.behavior)?;
    let cascade = CascadeGraph::build(&raw.relationships, &raw.behavior.hierarchy)?;

    Ok(FormConfig { entity: raw.entity,
                    steps: raw.steps,
                    fields: raw.fields,
                    relationships: raw.relationships,
                    behavior: raw.behavior,
                    step_index,
                    cascade })
  }
}

fn check_field(name: &str, def: &FieldDefinition) -> Result<(), ConfigError> {
  let invalid = |reason: String| ConfigError::InvalidConstraint { field: name.to_string(), reason };
  match &def.kind {
    FieldKind::Text { min_length, max_length, pattern, .. } => {
      if let (Some(min), Some(max)) = (min_length, max_length) {
        if min > max {
          return Err(invalid(format!("minLength {} > maxLength {}", min, max)));
        }
      }
      if let Some(p) = pattern {
        Regex::new(p).map_err(|e| ConfigError::InvalidPattern { field: name.to_string(), reason: e.to_string() })?;
      }
    }
    FieldKind::Number { min: Some(min), max: Some(max), .. } if min > max => {
      return Err(invalid(format!("min {} > max {}", min, max)));
    }
    FieldKind::Date { min: Some(min), max: Some(max) } if min > max => {
      return Err(invalid(format!("min {} > max {}", min, max)));
    }
    FieldKind::Select { options } if options.is_empty() => {
      return Err(invalid("select sin opciones".into()));
    }
    _ => {}
  }
  def.initial_value().map(|_| ()).map_err(invalid)
}

impl FormConfig {
  /// Carga y valida una configuración JSON. Los errores estructurales se
  /// devuelven tipados; los de forma como `SerializationError`.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    let raw: RawFormConfig = serde_json::from_str(json)?;
    Self::try_from(raw)
  }

  pub fn from_value(value: JsonValue) -> Result<Self, ConfigError> {
    let raw: RawFormConfig = serde_json::from_value(value)?;
    Self::try_from(raw)
  }

  pub fn entity(&self) -> &str {
    &self.entity
  }

  pub fn steps(&self) -> &[StepConfig] {
    &self.steps
  }

  pub fn step(&self, index: usize) -> Option<&StepConfig> {
    self.steps.get(index)
  }

  pub fn step_count(&self) -> usize {
    self.steps.len()
  }

  pub fn last_step_index(&self) -> usize {
    self.steps.len() - 1
  }

  pub fn fields(&self) -> &IndexMap<String, FieldDefinition> {
    &self.fields
  }

  pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
    self.fields.get(name)
  }

  pub fn relationships(&self) -> &IndexMap<String, RelationshipDefinition> {
    &self.relationships
  }

  pub fn relationship(&self, name: &str) -> Option<&RelationshipDefinition> {
    self.relationships.get(name)
  }

  pub fn behavior(&self) -> &BehaviorConfig {
    &self.behavior
  }

  pub fn cascade(&self) -> &CascadeGraph {
    &self.cascade
  }

  pub fn is_declared(&self, name: &str) -> bool {
    self.fields.contains_key(name) || self.relationships.contains_key(name)
  }

  /// Índice del paso que contiene `name`, si está asignado a alguno.
  pub fn step_of(&self, name: &str) -> Option<usize> {
    self.step_index.get(name).copied()
  }

  /// Label legible de un campo o relación.
  pub fn label_of(&self, name: &str) -> Option<&str> {
    self.fields
        .get(name)
        .map(|f| f.label.as_str())
        .or_else(|| self.relationships.get(name).map(|r| r.label.as_str()))
  }
}

/// El barrido por prefijo no debe alcanzar las claves globales del
/// traspaso.
fn check_storage_prefix(behavior: &BehaviorConfig) -> Result<(), ConfigError> {
  let prefix = &behavior.persistence.storage_prefix;
  if prefix.is_empty() {
    return Err(ConfigError::InvalidStoragePrefix { prefix: prefix.clone(), reason: "no puede estar vacío".into() });
  }
  if let Some(key) = behavior.cross_entity.names().into_iter().find(|key| key.starts_with(prefix.as_str())) {
    return Err(ConfigError::InvalidStoragePrefix { prefix: prefix.clone(),
                                                   reason: format!("abarca la clave de traspaso {}", key) });
  }
  Ok(())
}
