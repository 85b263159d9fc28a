//! form-domain: configuración declarativa, valores y validación de los
//! formularios de entidad.
//!
//! La `FormConfig` se carga una vez por tipo de entidad y es inmutable; el
//! `ValidationAdapter` deriva de ella la validación por campo y por paso, y
//! el `CascadeGraph` el vaciado de relaciones dependientes.
mod cascade;
mod config;
mod domain_stubs;
mod errors;
mod validation;
mod values;

pub use cascade::CascadeGraph;
pub use config::{AutosaveBehavior, BehaviorConfig, Cardinality, CrossEntityKeys, FieldDefinition, FieldKind, FormConfig,
                 NavigationBehavior, PersistenceBehavior, RelationshipDefinition, SaveBehavior, StepConfig,
                 StepValidation, TextFormat, ValidationMode};
pub use domain_stubs::DomainStubs;
pub use errors::ConfigError;
pub use validation::{FieldErrors, StepFailure, ValidationAdapter};
pub use values::{EntityId, FieldValue, FormValues};
