// Archivo: errors.rs
// Propósito: errores del almacenamiento de snapshots y el alias Result<T>
// usado por las APIs del crate.
use thiserror::Error;

/// Errores del almacenamiento duradero del cliente.
///
/// - `Storage`: fallo del backend (BD, mutex envenenado, etc.).
/// - `QuotaExceeded`: el backend rechazó la escritura por tamaño.
/// - `Serialization`: JSON inválido al escribir o leer.
/// - `DraftsDisabled`: la configuración no admite borradores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Error de almacenamiento: {0}")]
    Storage(String),
    /// Cuota superada al escribir `key`.
    #[error("Cuota de almacenamiento superada al escribir {0}")]
    QuotaExceeded(String),
    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Borradores deshabilitados para {0} (maxDrafts = 0)")]
    DraftsDisabled(String),
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, StoreError>;
