//! Implementación duradera del trait `KeyValueStorage` sobre SQLite.
//! Este archivo expone el módulo `schema` y reexporta el almacenamiento
//! Diesel. La implementación detallada está en `storage_persistence.rs`.

pub mod schema;
mod storage_persistence;

pub use storage_persistence::{new_from_env, DieselStorage, DEFAULT_DATABASE_URL};
