// Archivo: stubs.rs
// Propósito: servicio de entidades y callbacks en memoria para ejemplos y
// pruebas.
use crate::mutation::{EntityMutation, MutationError, SubmitCallbacks};
use async_trait::async_trait;
use form_domain::EntityId;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Operación recibida por el servicio en memoria.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMutation {
    pub entity: String,
    pub id: EntityId,
    pub payload: JsonValue,
    pub is_update: bool,
}

/// Servicio de entidades en memoria: asigna ids enteros crecientes y
/// registra cada llamada. `fail_next` hace fallar la siguiente llamada.
pub struct InMemoryEntityApi {
    next_id: AtomicI64,
    calls: Mutex<Vec<RecordedMutation>>,
    failure: Mutex<Option<MutationError>>,
}

impl InMemoryEntityApi {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first_id: i64) -> Self {
        InMemoryEntityApi { next_id: AtomicI64::new(first_id),
                            calls: Mutex::new(Vec::new()),
                            failure: Mutex::new(None) }
    }

    pub fn fail_next(&self, error: MutationError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    pub fn calls(&self) -> Vec<RecordedMutation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn take_failure(&self) -> Option<MutationError> {
        self.failure.lock().ok().and_then(|mut f| f.take())
    }

    fn record(&self, call: RecordedMutation) -> Result<(), MutationError> {
        let mut calls = self.calls
                            .lock()
                            .map_err(|e| MutationError::Network(format!("mutex poisoned: {:?}", e)))?;
        calls.push(call);
        Ok(())
    }
}

impl Default for InMemoryEntityApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityMutation for InMemoryEntityApi {
    async fn create(&self, entity: &str, payload: JsonValue) -> Result<EntityId, MutationError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let id = EntityId::from(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.record(RecordedMutation { entity: entity.to_string(), id: id.clone(), payload, is_update: false })?;
        Ok(id)
    }

    async fn update(&self, entity: &str, id: &EntityId, payload: JsonValue) -> Result<EntityId, MutationError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.record(RecordedMutation { entity: entity.to_string(), id: id.clone(), payload, is_update: true })?;
        Ok(id.clone())
    }
}

/// Callbacks que registran cada invocación.
#[derive(Default)]
pub struct RecordingCallbacks {
    successes: Mutex<Vec<(JsonValue, EntityId)>>,
    errors: Mutex<Vec<MutationError>>,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> Vec<(JsonValue, EntityId)> {
        self.successes.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<MutationError> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn invocations(&self) -> usize {
        self.successes().len() + self.errors().len()
    }
}

impl SubmitCallbacks for RecordingCallbacks {
    fn on_success(&self, payload: &JsonValue, entity_id: &EntityId) {
        if let Ok(mut successes) = self.successes.lock() {
            successes.push((payload.clone(), entity_id.clone()));
        }
    }

    fn on_error(&self, error: &MutationError) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(error.clone());
        }
    }
}
