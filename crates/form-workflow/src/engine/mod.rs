pub mod form_engine;
pub mod session;

pub use form_engine::EntityFormEngine;
pub use session::{FormPhase, FormSession, InitReport, RelatedCreation, StepProgress, StepTransition, SubmitOutcome};
