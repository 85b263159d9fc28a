//! form-workflow: máquina de estados de los formularios de entidad
//!
//! Orquesta la navegación por pasos, la validación, el autosave diferido,
//! los borradores, el traspaso entre entidades y el envío sobre
//! `form_domain::FormConfig` y los almacenes de `form_store`. Incluye el
//! guardia de cambios sin guardar y el barrido periódico de expiración.

pub mod autosave;
pub mod config;
pub mod engine;
pub mod errors;
pub mod factory;
pub mod form_mode;
pub mod guard;
pub mod mutation;
pub mod stubs;
pub mod sweeper;

pub use autosave::{Debouncer, LifecycleEvent};
pub use config::EngineSettings;
pub use engine::{EntityFormEngine, FormPhase, FormSession, InitReport, RelatedCreation, StepProgress, StepTransition,
                 SubmitOutcome};
pub use errors::FormError;
pub use factory::FormFactory;
pub use form_mode::FormMode;
pub use guard::{GuardDecision, LinkClick, Modifiers, PopStateAction, UnsavedChangesGuard};
pub use mutation::{to_wire_payload, EntityMutation, MutationError, NoopCallbacks, SubmitCallbacks};
pub use sweeper::{run_expiry_sweeper, sweep_once, SweepTarget};
