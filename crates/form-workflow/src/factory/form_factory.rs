use crate::config::EngineSettings;
use crate::engine::{EntityFormEngine, InitReport};
use crate::errors::FormError;
use crate::form_mode::FormMode;
use form_domain::{FormConfig, FormValues};
use form_store::{system_clock, Clock, CrossEntityBridge, KeyValueStorage, PersistenceStore};
use std::sync::Arc;

/// Fábrica de motores de formulario.
///
/// Comparte un único `KeyValueStorage` entre todos los formularios que
/// abre, de modo que el autosave, los borradores y el traspaso entre
/// entidades ven el mismo almacenamiento. Las instancias devueltas ya
/// están inicializadas.
pub struct FormFactory {
  storage: Arc<dyn KeyValueStorage>,
  clock: Clock,
  user_scope: String,
}

impl FormFactory {
  pub fn new(storage: Arc<dyn KeyValueStorage>, settings: &EngineSettings) -> Self {
    FormFactory { storage, clock: system_clock(), user_scope: settings.user_scope.clone() }
  }

  /// Sustituye el reloj (pruebas).
  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }

  pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
    &self.storage
  }

  pub fn user_scope(&self) -> &str {
    &self.user_scope
  }

  /// Almacén de snapshots con la política de persistencia de `config`.
  pub fn store_for(&self, config: &FormConfig) -> PersistenceStore {
    PersistenceStore::new(self.storage.clone(), config.behavior().persistence.clone(), self.clock.clone())
  }

  /// Puente entre entidades con los nombres de clave de `config`.
  pub fn bridge_for(&self, config: &FormConfig) -> CrossEntityBridge {
    CrossEntityBridge::new(self.storage.clone(), config.behavior().cross_entity.clone(), self.clock.clone())
  }

  /// Construye el motor sin inicializarlo.
  pub fn build(&self, config: Arc<FormConfig>, mode: FormMode) -> EntityFormEngine {
    let store = Arc::new(self.store_for(&config));
    let bridge = Arc::new(self.bridge_for(&config));
    EntityFormEngine::new(config, store, bridge, self.clock.clone(), mode, self.user_scope.clone())
  }

  /// Abre un formulario: construye el motor y lo inicializa.
  pub fn open(&self,
              config: Arc<FormConfig>,
              mode: FormMode,
              prefill: Option<FormValues>)
              -> Result<(EntityFormEngine, InitReport), FormError> {
    let mut engine = self.build(config, mode);
    let report = engine.initialize(prefill)?;
    Ok((engine, report))
  }
}
