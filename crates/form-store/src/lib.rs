//! Crate `form-store` — persistencia de formularios en el cliente
//!
//! Este crate define el contrato de almacenamiento clave/valor
//! (`KeyValueStorage`), una implementación en memoria útil para pruebas
//! (`InMemoryStorage`), el `PersistenceStore` (autosave, borradores y
//! barrido de expiración) y el `CrossEntityBridge` (traspaso entre
//! formularios de entidades relacionadas).
//!
//! Diseño resumido:
//! - Autosave: una ranura por entidad, sobrescrita en sitio, con TTL.
//! - Borradores: lista con nombre limitada a `maxDrafts`; se expulsa el más
//!   antiguo antes de insertar.
//! - Traspaso: tres claves globales con semántica de lectura única.
//!
//! Ejemplo rápido:
//! ```rust
//! use form_store::{system_clock, InMemoryStorage, PersistenceStore};
//! use std::sync::Arc;
//! let storage = Arc::new(InMemoryStorage::new());
//! let store = PersistenceStore::new(storage, Default::default(), system_clock());
//! assert!(store.load_autosave("city").is_none());
//! ```
pub mod domain;
pub mod errors;
pub mod handoff;
pub mod repository;
pub mod snapshot_store;
pub mod stubs;

pub use domain::*;
pub use errors::*;
pub use handoff::*;
pub use repository::*;
pub use snapshot_store::*;
pub use stubs::*;
