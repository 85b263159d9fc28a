use form_domain::ConfigError;
use form_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

// Errores comunes del motor de formularios.
//
// Los fallos de la mutación remota no aparecen aquí: se informan como
// `SubmitOutcome::Failed` y a través de `SubmitCallbacks::on_error`.
#[derive(Error, Debug)]
pub enum FormError {
  /// Errores originados por la capa de almacenamiento.
  #[error("Error de almacenamiento: {0}")]
  Store(#[from] StoreError),

  /// Configuración inválida detectada al cargar.
  #[error("Error de configuración: {0}")]
  Config(#[from] ConfigError),

  #[error("Campo no declarado: {0}")]
  UnknownField(String),

  #[error("Paso fuera de rango: {target} (hay {count})")]
  StepOutOfRange { target: usize, count: usize },

  #[error("La relación {0} no permite creación en línea")]
  InlineCreationNotAllowed(String),

  #[error("Borrador no encontrado: {0}")]
  DraftNotFound(Uuid),

  /// Operación no permitida en la fase actual (p.ej. editar mientras se
  /// envía).
  #[error("Operación {operation} no permitida en fase {phase}")]
  InvalidState { operation: String, phase: String },
}
