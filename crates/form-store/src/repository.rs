// Archivo: repository.rs
// Propósito: definir el contrato `KeyValueStorage` que deben implementar los
// almacenamientos duraderos (memoria, SQLite, etc.). Es el equivalente a un
// `localStorage`: claves y valores de texto, sin transacciones.
use crate::errors::Result;

/// Almacenamiento clave/valor duradero del cliente.
///
/// Las implementaciones no interpretan los valores: el `PersistenceStore` y
/// el `CrossEntityBridge` serializan y validan el contenido.
pub trait KeyValueStorage: Send + Sync {
    /// Devuelve el valor de `key`, o `None` si no existe.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Escribe (o sobrescribe) el valor de `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Elimina `key`. No es error si no existe.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Lista todas las claves presentes.
    fn keys(&self) -> Result<Vec<String>>;

    /// Claves que empiezan por `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.keys()?.into_iter().filter(|k| k.starts_with(prefix)).collect())
    }
}
