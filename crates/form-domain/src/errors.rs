// errors.rs
use thiserror::Error;

/// Errores detectados al cargar o validar una `FormConfig`.
///
/// Todos se producen en tiempo de carga: una configuración que pasa
/// `FormConfig::from_json` no puede fallar más tarde por su forma.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
  #[error("Configuración sin pasos para la entidad {0}")]
  EmptySteps(String),
  #[error("Paso duplicado: {0}")]
  DuplicateStep(String),
  #[error("El paso {step} referencia un campo no declarado: {field}")]
  UnknownField { step: String, field: String },
  #[error("El campo {field} aparece en más de un paso ({first}, {second})")]
  FieldInMultipleSteps { field: String, first: String, second: String },
  #[error("Relación no declarada: {0}")]
  UnknownRelationship(String),
  #[error("Patrón inválido en {field}: {reason}")]
  InvalidPattern { field: String, reason: String },
  #[error("Restricción inválida en {field}: {reason}")]
  InvalidConstraint { field: String, reason: String },
  #[error("Prefijo de almacenamiento inválido {prefix:?}: {reason}")]
  InvalidStoragePrefix { prefix: String, reason: String },
  #[error("Ciclo de dependencias entre relaciones: {0}")]
  CascadeCycle(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
}

impl From<serde_json::Error> for ConfigError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}
