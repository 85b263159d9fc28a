use crate::mutation::MutationError;
use form_domain::{EntityId, FieldErrors, FormValues};
use form_store::ResolvedHandoff;
use std::collections::BTreeSet;
use std::fmt;

/// Fases de la máquina de estados del formulario.
///
/// `Validating`, `AutoPopulating` y `Submitting` son transitorias: sólo se
/// observan dentro de la operación que las provoca.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Initializing,
    Editing,
    Validating,
    AutoPopulating,
    Submitting,
    Submitted,
}

impl fmt::Display for FormPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormPhase::Initializing => "initializing",
            FormPhase::Editing => "editing",
            FormPhase::Validating => "validating",
            FormPhase::AutoPopulating => "auto_populating",
            FormPhase::Submitting => "submitting",
            FormPhase::Submitted => "submitted",
        };
        write!(f, "{}", s)
    }
}

/// Estado vivo de un formulario abierto.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSession {
    pub current_step_index: usize,
    pub values: FormValues,
    pub errors: FieldErrors,
    /// Campos que ya perdieron el foco al menos una vez.
    pub touched: BTreeSet<String>,
    pub is_dirty: bool,
    pub is_auto_populating: bool,
    pub is_submitting: bool,
}

/// Resultado de una navegación entre pasos.
#[derive(Debug, Clone, PartialEq)]
pub enum StepTransition {
    Moved { from: usize, to: usize },
    /// La validación detuvo el avance en `step_index`.
    Blocked { step_index: usize, errors: FieldErrors },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepProgress {
    pub current: usize,
    pub total: usize,
    pub percent: u8,
    pub is_first: bool,
    pub is_last: bool,
    pub step_id: String,
    pub title: String,
}

/// Lo que ocurrió al abrir el formulario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitReport {
    pub restored_from_autosave: bool,
    pub auto_populated: Option<ResolvedHandoff>,
    /// Marcadores pendientes descartados por no tener traspaso activo.
    pub dropped_placeholders: Vec<String>,
}

/// Navegación hacia el formulario de la entidad relacionada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedCreation {
    pub relationship: String,
    pub target_entity: String,
    pub target_route: String,
    pub return_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// La validación previa falló; no hubo llamada de red.
    Invalid { step_index: usize, errors: FieldErrors },
    Submitted { entity_id: EntityId, redirect: String },
    Failed { error: MutationError },
}
