// Archivo: form_engine.rs
// Propósito: máquina de estados del formulario multipaso (navegación,
// validación por paso, autosave, borradores, traspaso entre entidades y
// envío).
use super::session::{FormPhase, FormSession, InitReport, RelatedCreation, StepProgress, StepTransition, SubmitOutcome};
use crate::autosave::{Debouncer, LifecycleEvent};
use crate::errors::FormError;
use crate::form_mode::FormMode;
use crate::mutation::{to_wire_payload, EntityMutation, MutationError, SubmitCallbacks};
use form_domain::{EntityId, FieldErrors, FieldValue, FormConfig, FormValues, SaveBehavior, ValidationAdapter,
                  ValidationMode};
use form_store::{AutosaveOutcome, Clock, CrossEntityBridge, CrossEntityHandoff, DraftSnapshot, PersistenceStore};
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Motor de un formulario de entidad abierto.
///
/// Una instancia por formulario abierto. La configuración, el almacén y el
/// puente se comparten; la sesión es propia. Las operaciones síncronas
/// nunca tocan la red: la única llamada remota es `submit`, a través de la
/// `EntityMutation` que aporta quien llama.
pub struct EntityFormEngine {
    config: Arc<FormConfig>,
    validator: ValidationAdapter,
    store: Arc<PersistenceStore>,
    bridge: Arc<CrossEntityBridge>,
    clock: Clock,
    mode: FormMode,
    user_scope: String,
    session: FormSession,
    phase: FormPhase,
    debouncer: Debouncer,
    last_submit_error: Option<MutationError>,
}

impl EntityFormEngine {
    pub fn new(config: Arc<FormConfig>,
               store: Arc<PersistenceStore>,
               bridge: Arc<CrossEntityBridge>,
               clock: Clock,
               mode: FormMode,
               user_scope: impl Into<String>)
               -> Self {
        let debouncer = Debouncer::new(config.behavior().autosave.debounce_ms);
        EntityFormEngine { validator: ValidationAdapter::new(config.clone()),
                           config,
                           store,
                           bridge,
                           clock,
                           mode,
                           user_scope: user_scope.into(),
                           session: FormSession::default(),
                           phase: FormPhase::Initializing,
                           debouncer,
                           last_submit_error: None }
    }

    pub fn config(&self) -> &Arc<FormConfig> {
        &self.config
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn session(&self) -> &FormSession {
        &self.session
    }

    pub fn values(&self) -> &FormValues {
        &self.session.values
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.session.errors
    }

    pub fn field_errors(&self, name: &str) -> &[String] {
        self.session.errors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn current_step_index(&self) -> usize {
        self.session.current_step_index
    }

    pub fn last_submit_error(&self) -> Option<&MutationError> {
        self.last_submit_error.as_ref()
    }

    pub fn is_autosave_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// URL de este formulario con el indicador de estado sin guardar; es la
    /// URL de retorno de los traspasos.
    pub fn return_url(&self) -> String {
        format!("{}?resume=autosave", self.mode.route(self.config.entity()))
    }

    // ----------------------------------------------------------------
    // Apertura
    // ----------------------------------------------------------------

    /// Abre el formulario.
    ///
    /// En alta restaura el autosave vigente (valores y paso) o parte de los
    /// valores por defecto. En edición usa `prefill` y sólo restaura su
    /// propio autosave al volver de un traspaso que él mismo inició. Después
    /// consume un traspaso resuelto dirigido a este formulario, si lo hay.
    pub fn initialize(&mut self, prefill: Option<FormValues>) -> Result<InitReport, FormError> {
        if self.phase != FormPhase::Initializing {
            return Err(self.invalid_state("initialize"));
        }
        let mut values = self.default_values();
        if let Some(prefill) = prefill {
            self.overlay_declared(&mut values, &prefill);
        }

        let returning = self.bridge
                            .active()
                            .map_or(false, |h| h.is_resolved() && self.is_own_handoff(&h));
        let mut report = InitReport::default();
        let mut step = 0;
        if !self.mode.is_edit() || returning {
            if let Some(snapshot) = self.store.load_autosave(&self.slot()) {
                self.overlay_declared(&mut values, &snapshot.values);
                step = snapshot.current_step_index.min(self.config.last_step_index());
                report.restored_from_autosave = true;
            }
        }
        self.session = FormSession { current_step_index: step,
                                     values,
                                     is_dirty: report.restored_from_autosave,
                                     ..FormSession::default() };

        let resolved = self.bridge.take_resolved_for(|h| self.is_own_handoff(h));
        if let Some(resolved) = resolved {
            self.phase = FormPhase::AutoPopulating;
            self.session.is_auto_populating = true;
            let merged = self.handle_entity_created(resolved.entity_id.clone(), &resolved.relationship_name);
            self.session.is_auto_populating = false;
            if let Err(e) = merged {
                warn!("no se pudo aplicar el traspaso de {}: {}", resolved.relationship_name, e);
            }
            report.auto_populated = Some(resolved);
        }

        report.dropped_placeholders = self.drop_orphan_placeholders();
        self.phase = FormPhase::Editing;
        debug!("formulario {} abierto ({}) en paso {}", self.config.entity(), self.mode, step);
        Ok(report)
    }

    // ----------------------------------------------------------------
    // Navegación
    // ----------------------------------------------------------------

    /// Navega a `target`. Hacia delante (sin `allowStepSkipping`) valida
    /// los pasos desde el actual hasta `target` (exclusivo) con
    /// `validateOnNext`; si alguno falla, la sesión queda en el primero que
    /// falla con sus errores. Hacia atrás nunca valida.
    pub fn go_to_step(&mut self, target: usize) -> Result<StepTransition, FormError> {
        let count = self.config.step_count();
        if target >= count {
            return Err(FormError::StepOutOfRange { target, count });
        }
        self.ensure_editable("go_to_step")?;
        let from = self.session.current_step_index;
        if target == from {
            return Ok(StepTransition::Unchanged);
        }
        if target > from && !self.config.behavior().navigation.allow_step_skipping {
            self.phase = FormPhase::Validating;
            let checked = self.validator.validate_steps(from..target, &self.session.values, true);
            self.phase = FormPhase::Editing;
            match checked {
                Err(failure) => {
                    for index in from..failure.step_index {
                        self.replace_step_errors(index, FieldErrors::new());
                    }
                    self.session.current_step_index = failure.step_index;
                    self.replace_step_errors(failure.step_index, failure.errors.clone());
                    debug!("avance bloqueado en paso {} ({} campos)", failure.step_index, failure.errors.len());
                    return Ok(StepTransition::Blocked { step_index: failure.step_index, errors: failure.errors });
                }
                Ok(()) => {
                    for index in from..target {
                        self.replace_step_errors(index, FieldErrors::new());
                    }
                }
            }
        }
        self.session.current_step_index = target;
        if self.autosaves_on_change() && self.session.is_dirty {
            self.save_form_state();
        }
        Ok(StepTransition::Moved { from, to: target })
    }

    pub fn next_step(&mut self) -> Result<StepTransition, FormError> {
        let current = self.session.current_step_index;
        if current >= self.config.last_step_index() {
            return Ok(StepTransition::Unchanged);
        }
        self.go_to_step(current + 1)
    }

    pub fn previous_step(&mut self) -> Result<StepTransition, FormError> {
        match self.session.current_step_index.checked_sub(1) {
            Some(target) => self.go_to_step(target),
            None => Ok(StepTransition::Unchanged),
        }
    }

    pub fn progress(&self) -> StepProgress {
        let total = self.config.step_count();
        let current = self.session.current_step_index;
        let (step_id, title) = self.config
                                   .step(current)
                                   .map(|s| (s.id.clone(), s.title.clone()))
                                   .unwrap_or_default();
        StepProgress { current,
                       total,
                       percent: ((current + 1) * 100 / total.max(1)).min(100) as u8,
                       is_first: current == 0,
                       is_last: current + 1 >= total,
                       step_id,
                       title }
    }

    // ----------------------------------------------------------------
    // Edición
    // ----------------------------------------------------------------

    /// Cambia el valor de un campo o relación. Devuelve las relaciones
    /// dependientes que se vaciaron en cascada.
    pub fn edit_field(&mut self, name: &str, value: FieldValue) -> Result<Vec<String>, FormError> {
        if !self.config.is_declared(name) {
            return Err(FormError::UnknownField(name.to_string()));
        }
        self.ensure_editable("edit_field")?;
        let cleared = self.apply_value(name, value);
        if self.validation_mode_of(name) == ValidationMode::OnChange {
            self.revalidate_field(name);
        }
        if self.autosaves_on_change() {
            self.debouncer.schedule((self.clock)());
        }
        Ok(cleared)
    }

    /// Marca el campo como tocado; en modo `onBlur` calcula sus errores.
    pub fn blur_field(&mut self, name: &str) -> Result<Vec<String>, FormError> {
        if !self.config.is_declared(name) {
            return Err(FormError::UnknownField(name.to_string()));
        }
        self.ensure_editable("blur_field")?;
        self.session.touched.insert(name.to_string());
        if self.validation_mode_of(name) == ValidationMode::OnBlur {
            self.revalidate_field(name);
        }
        Ok(self.field_errors(name).to_vec())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.session.is_dirty && self.phase != FormPhase::Submitted
    }

    /// El usuario confirmó abandonar el formulario: se olvidan los cambios
    /// pendientes (el autosave ya escrito se conserva).
    pub fn discard_unsaved_changes(&mut self) {
        self.debouncer.cancel();
        self.session.is_dirty = false;
    }

    // ----------------------------------------------------------------
    // Autosave y borradores
    // ----------------------------------------------------------------

    /// Escribe el autosave. Los fallos de almacenamiento se registran y
    /// devuelven `None`.
    pub fn save_form_state(&mut self) -> Option<AutosaveOutcome> {
        self.debouncer.cancel();
        match self.store
                  .save_autosave(&self.slot(), &self.session.values, self.session.current_step_index)
        {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("autosave de {} fallido: {}", self.config.entity(), e);
                None
            }
        }
    }

    /// Dispara el autosave diferido si su plazo venció.
    pub fn tick(&mut self) -> Option<AutosaveOutcome> {
        if self.phase != FormPhase::Editing {
            return None;
        }
        if self.debouncer.fire_if_due((self.clock)()) {
            return self.save_form_state();
        }
        None
    }

    /// Reacciona a eventos de ciclo de vida. `Close` sólo cancela el
    /// autosave diferido; un envío en curso no se cancela.
    pub fn handle_lifecycle(&mut self, event: LifecycleEvent) -> Option<AutosaveOutcome> {
        let autosave = &self.config.behavior().autosave;
        let allowed = match event {
            LifecycleEvent::BeforeUnload | LifecycleEvent::VisibilityHidden => {
                autosave.enabled && autosave.save_behavior != SaveBehavior::Manual
            }
            LifecycleEvent::AppSave => true,
            LifecycleEvent::Close => {
                self.debouncer.cancel();
                return None;
            }
        };
        if !allowed || self.phase != FormPhase::Editing || !self.session.is_dirty {
            return None;
        }
        self.save_form_state()
    }

    pub fn save_draft(&mut self, label: Option<String>) -> Result<DraftSnapshot, FormError> {
        if self.phase == FormPhase::Initializing {
            return Err(self.invalid_state("save_draft"));
        }
        let draft = self.store.save_draft(self.config.entity(),
                                          &self.user_scope,
                                          label,
                                          &self.session.values,
                                          self.session.current_step_index)?;
        info!("borrador {} guardado para {}", draft.id, self.config.entity());
        Ok(draft)
    }

    pub fn list_drafts(&self) -> Vec<DraftSnapshot> {
        self.store.list_drafts(self.config.entity(), &self.user_scope)
    }

    /// Sustituye la sesión por el contenido del borrador.
    pub fn restore_draft(&mut self, draft_id: &Uuid) -> Result<(), FormError> {
        self.ensure_editable("restore_draft")?;
        let draft = self.store
                        .load_draft(self.config.entity(), draft_id)
                        .filter(|d| d.user_scope == self.user_scope)
                        .ok_or(FormError::DraftNotFound(*draft_id))?;
        let mut values = self.default_values();
        self.overlay_declared(&mut values, &draft.snapshot.values);
        self.session = FormSession { current_step_index: draft.snapshot
                                                              .current_step_index
                                                              .min(self.config.last_step_index()),
                                     values,
                                     is_dirty: true,
                                     ..FormSession::default() };
        if self.autosaves_on_change() {
            self.debouncer.schedule((self.clock)());
        }
        info!("borrador {} restaurado ({})", draft.id, draft.label);
        Ok(())
    }

    pub fn delete_draft(&mut self, draft_id: &Uuid) -> Result<bool, FormError> {
        Ok(self.store.delete_draft(self.config.entity(), draft_id)?)
    }

    // ----------------------------------------------------------------
    // Traspaso entre entidades
    // ----------------------------------------------------------------

    /// "Crear nuevo" sobre una relación: registra el traspaso, deja el
    /// marcador pendiente y guarda el autosave. Devuelve la ruta de alta de
    /// la entidad destino.
    pub fn start_related_creation(&mut self, relationship: &str) -> Result<RelatedCreation, FormError> {
        let def = self.config
                      .relationship(relationship)
                      .ok_or_else(|| FormError::UnknownField(relationship.to_string()))?;
        if !def.allow_inline_create {
            return Err(FormError::InlineCreationNotAllowed(relationship.to_string()));
        }
        let target_entity = def.target_entity.clone();
        self.ensure_editable("start_related_creation")?;

        let return_url = self.return_url();
        self.bridge.begin(&return_url, relationship, &target_entity)?;
        if self.session.values.value(relationship).is_empty() {
            self.session
                .values
                .set(relationship, FieldValue::Pending(target_entity.clone()));
        }
        self.session.errors.shift_remove(relationship);
        self.session.is_dirty = true;
        self.save_form_state();
        info!("creación relacionada {} -> {} desde {}", relationship, target_entity, return_url);
        Ok(RelatedCreation { relationship: relationship.to_string(),
                             target_route: format!("/{}/new", target_entity),
                             target_entity,
                             return_url })
    }

    /// Abandona el traspaso iniciado por este formulario y quita su
    /// marcador pendiente. `false` si no había traspaso propio.
    pub fn cancel_related_creation(&mut self) -> Result<bool, FormError> {
        self.ensure_editable("cancel_related_creation")?;
        let Some(handoff) = self.bridge.active().filter(|h| self.is_own_handoff(h)) else {
            return Ok(false);
        };
        self.bridge.clear()?;
        if self.session.values.value(&handoff.relationship_name).is_pending() {
            self.session
                .values
                .set(handoff.relationship_name.as_str(), FieldValue::Empty);
        }
        self.save_form_state();
        info!("creación relacionada {} cancelada", handoff.relationship_name);
        Ok(true)
    }

    /// Fusiona el id recién creado en la relación (reemplaza en `single`,
    /// añade sin duplicar en `multiple`) y limpia sus errores. Borra el
    /// traspaso activo sólo si lo inició este formulario para esa misma
    /// relación. Devuelve las dependientes vaciadas.
    pub fn handle_entity_created(&mut self, new_id: EntityId, relationship: &str) -> Result<Vec<String>, FormError> {
        if matches!(self.phase, FormPhase::Submitting | FormPhase::Submitted) {
            return Err(self.invalid_state("handle_entity_created"));
        }
        let merged = self.config
                         .relationship(relationship)
                         .map(|def| def.merge_id(self.session.values.value(relationship), new_id.clone()))
                         .ok_or_else(|| FormError::UnknownField(relationship.to_string()))?;
        let cleared = self.apply_value(relationship, merged);
        let owned = self.bridge
                        .active()
                        .map_or(false, |h| h.relationship_name == relationship && self.is_own_handoff(&h));
        if owned {
            if let Err(e) = self.bridge.clear() {
                warn!("no se pudo borrar el traspaso de {}: {}", relationship, e);
            }
        }
        self.save_form_state();
        info!("{} = {} aplicado en {}", relationship, new_id, self.config.entity());
        Ok(cleared)
    }

    /// Cancelación del formulario. Si éste era el destino de un traspaso
    /// pendiente, el traspaso se borra sin id y se devuelve la URL de
    /// retorno. El autosave propio se descarta.
    pub fn cancel_form(&mut self) -> Result<Option<String>, FormError> {
        self.debouncer.cancel();
        let entity = self.config.entity();
        let return_url = match self.bridge.active() {
            Some(h) if h.target_entity == entity && !h.is_resolved() => {
                self.bridge.clear()?;
                info!("traspaso hacia {} cancelado", entity);
                Some(h.return_url)
            }
            _ => None,
        };
        if let Err(e) = self.store.clear_autosave(&self.slot()) {
            warn!("no se pudo descartar el autosave de {}: {}", entity, e);
        }
        self.session.is_dirty = false;
        Ok(return_url)
    }

    // ----------------------------------------------------------------
    // Envío
    // ----------------------------------------------------------------

    /// Valida todo el formulario y llama a `create` o `update`.
    ///
    /// Si la validación falla, la sesión salta al primer paso con errores y
    /// no se invoca ningún callback. Con éxito se borra el autosave (no los
    /// borradores) y, en alta, si un traspaso activo apunta a esta entidad,
    /// la redirección es su URL de retorno. Con error de red se vuelve a
    /// `Editing` en el último paso conservando los valores.
    pub async fn submit(&mut self,
                        mutation: &dyn EntityMutation,
                        callbacks: &dyn SubmitCallbacks)
                        -> Result<SubmitOutcome, FormError> {
        self.ensure_editable("submit")?;
        self.phase = FormPhase::Validating;
        if let Err(failure) = self.validator.validate_all(&self.session.values) {
            self.session.current_step_index = failure.step_index;
            self.replace_step_errors(failure.step_index, failure.errors.clone());
            self.phase = FormPhase::Editing;
            debug!("envío de {} bloqueado en paso {}", self.config.entity(), failure.step_index);
            return Ok(SubmitOutcome::Invalid { step_index: failure.step_index, errors: failure.errors });
        }
        self.session.errors.clear();

        let entity = self.config.entity().to_string();
        let payload = to_wire_payload(&self.config, &self.session.values);
        self.debouncer.cancel();
        self.phase = FormPhase::Submitting;
        self.session.is_submitting = true;
        self.last_submit_error = None;
        let result = match &self.mode {
            FormMode::Create => mutation.create(&entity, payload.clone()).await,
            FormMode::Edit(id) => mutation.update(&entity, id, payload.clone()).await,
        };
        self.session.is_submitting = false;

        match result {
            Ok(entity_id) => {
                if let Err(e) = self.store.clear_autosave(&self.slot()) {
                    warn!("no se pudo borrar el autosave de {}: {}", entity, e);
                }
                self.session.is_dirty = false;
                self.phase = FormPhase::Submitted;
                // Sólo un alta resuelve el traspaso; una edición no crea nada.
                let completed = match self.mode {
                    FormMode::Create => self.bridge.complete(&entity, &entity_id),
                    FormMode::Edit(_) => Ok(None),
                };
                let redirect = match completed {
                    Ok(Some(return_url)) => return_url,
                    Ok(None) => default_destination(&entity, &entity_id),
                    Err(e) => {
                        warn!("no se pudo completar el traspaso hacia {}: {}", entity, e);
                        default_destination(&entity, &entity_id)
                    }
                };
                info!("{} enviado con id {}", entity, entity_id);
                callbacks.on_success(&payload, &entity_id);
                Ok(SubmitOutcome::Submitted { entity_id, redirect })
            }
            Err(error) => {
                self.session.current_step_index = self.config.last_step_index();
                self.phase = FormPhase::Editing;
                warn!("envío de {} fallido: {}", entity, error);
                callbacks.on_error(&error);
                self.last_submit_error = Some(error.clone());
                Ok(SubmitOutcome::Failed { error })
            }
        }
    }

    // ----------------------------------------------------------------
    // Internos
    // ----------------------------------------------------------------

    fn slot(&self) -> String {
        self.mode.autosave_slot(self.config.entity())
    }

    fn invalid_state(&self, operation: &str) -> FormError {
        FormError::InvalidState { operation: operation.to_string(), phase: self.phase.to_string() }
    }

    fn ensure_editable(&self, operation: &str) -> Result<(), FormError> {
        match self.phase {
            FormPhase::Editing => Ok(()),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn autosaves_on_change(&self) -> bool {
        let autosave = &self.config.behavior().autosave;
        autosave.enabled && autosave.save_behavior == SaveBehavior::OnChange
    }

    fn validation_mode_of(&self, name: &str) -> ValidationMode {
        self.config
            .step_of(name)
            .and_then(|index| self.config.step(index))
            .map(|step| step.validation.mode)
            .unwrap_or_default()
    }

    /// Mismo formulario: la ruta de la URL de retorno coincide con la
    /// nuestra y la relación registrada existe con esa entidad destino.
    fn is_own_handoff(&self, handoff: &CrossEntityHandoff) -> bool {
        let path = handoff.return_url.split('?').next().unwrap_or_default();
        path == self.mode.route(self.config.entity())
        && self.config
               .relationship(&handoff.relationship_name)
               .map_or(false, |def| def.target_entity == handoff.target_entity)
    }

    fn default_values(&self) -> FormValues {
        let mut values = FormValues::new();
        for (name, def) in self.config.fields() {
            let initial = def.initial_value().unwrap_or_else(|e| {
                                                 warn!("valor por defecto de {} ignorado: {}", name, e);
                                                 FieldValue::Empty
                                             });
            values.set(name.clone(), initial);
        }
        for name in self.config.relationships().keys() {
            values.set(name.clone(), FieldValue::Empty);
        }
        values
    }

    fn overlay_declared(&self, values: &mut FormValues, source: &FormValues) {
        for (name, value) in source.iter() {
            if self.config.is_declared(name) {
                values.set(name.clone(), value.clone());
            } else {
                debug!("valor no declarado ignorado: {}", name);
            }
        }
    }

    /// Asigna el valor, marca la sesión como modificada y, si es una
    /// relación que cambió, vacía sus dependientes.
    fn apply_value(&mut self, name: &str, value: FieldValue) -> Vec<String> {
        let changed = self.session.values.value(name) != &value;
        self.session.values.set(name, value);
        self.session.is_dirty = true;
        self.session.errors.shift_remove(name);
        if !changed || self.config.relationship(name).is_none() {
            return Vec::new();
        }
        let dependents = self.config.cascade().dependents_of(name);
        let mut cleared = Vec::new();
        for dependent in dependents {
            self.session.errors.shift_remove(&dependent);
            if *self.session.values.value(&dependent) != FieldValue::Empty {
                self.session.values.set(dependent.as_str(), FieldValue::Empty);
                cleared.push(dependent);
            }
        }
        if !cleared.is_empty() {
            debug!("{} vació {:?}", name, cleared);
        }
        cleared
    }

    fn revalidate_field(&mut self, name: &str) {
        let messages = self.validator.validate_field(name, self.session.values.value(name));
        if messages.is_empty() {
            self.session.errors.shift_remove(name);
        } else {
            self.session.errors.insert(name.to_string(), messages);
        }
    }

    /// Sustituye los errores de los miembros del paso `index` por `errors`.
    fn replace_step_errors(&mut self, index: usize, errors: FieldErrors) {
        if let Some(step) = self.config.step(index) {
            for member in step.members() {
                self.session.errors.shift_remove(member);
            }
        }
        self.session.errors.extend(errors);
    }

    /// Quita los marcadores pendientes que ya no tienen traspaso propio
    /// activo (el formulario hijo se abandonó o el traspaso caducó).
    fn drop_orphan_placeholders(&mut self) -> Vec<String> {
        let active = self.bridge
                         .active()
                         .filter(|h| self.is_own_handoff(h))
                         .map(|h| h.relationship_name);
        let orphans: Vec<String> = self.config
                                       .relationships()
                                       .keys()
                                       .filter(|name| self.session.values.value(name).is_pending())
                                       .filter(|name| active.as_deref() != Some(name.as_str()))
                                       .cloned()
                                       .collect();
        for name in &orphans {
            self.session.values.set(name.as_str(), FieldValue::Empty);
        }
        orphans
    }
}

fn default_destination(entity: &str, id: &EntityId) -> String {
    format!("/{}/{}", entity, id)
}
