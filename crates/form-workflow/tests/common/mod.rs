#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use form_domain::{DomainStubs, FormConfig};
use form_store::{Clock, InMemoryStorage, KeyValueStorage};
use form_workflow::{EngineSettings, EntityFormEngine, FormFactory, FormMode, InitReport};
use std::sync::{Arc, Mutex};

pub struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
  pub fn new() -> Self {
    TestClock(Arc::new(Mutex::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())))
  }
  pub fn clock(&self) -> Clock {
    let at = self.0.clone();
    Arc::new(move || *at.lock().unwrap())
  }
  pub fn advance(&self, d: Duration) {
    let mut at = self.0.lock().unwrap();
    *at = *at + d;
  }
}

/// Almacenamiento compartido, reloj controlado y configuraciones de ejemplo.
pub struct Harness {
  pub storage: Arc<InMemoryStorage>,
  pub clock: TestClock,
  pub factory: FormFactory,
  pub city: Arc<FormConfig>,
  pub district: Arc<FormConfig>,
  pub meeting: Arc<FormConfig>,
}

impl Harness {
  pub fn new() -> Self {
    Self::with_storage(Arc::new(InMemoryStorage::new()))
  }

  pub fn with_storage(storage: Arc<InMemoryStorage>) -> Self {
    let clock = TestClock::new();
    let shared: Arc<dyn KeyValueStorage> = storage.clone();
    let settings = EngineSettings { user_scope: "ana".into(), ..EngineSettings::default() };
    let factory = FormFactory::new(shared, &settings).with_clock(clock.clock());
    Harness { storage,
              clock,
              factory,
              city: Arc::new(DomainStubs::city_config().unwrap()),
              district: Arc::new(DomainStubs::district_config().unwrap()),
              meeting: Arc::new(DomainStubs::meeting_config().unwrap()) }
  }

  pub fn open(&self, config: &Arc<FormConfig>, mode: FormMode) -> (EntityFormEngine, InitReport) {
    self.factory.open(config.clone(), mode, None).unwrap()
  }

  pub fn open_city(&self) -> EntityFormEngine {
    self.open(&self.city, FormMode::Create).0
  }

  pub fn key_exists(&self, key: &str) -> bool {
    self.storage.get_item(key).unwrap().is_some()
  }
}
