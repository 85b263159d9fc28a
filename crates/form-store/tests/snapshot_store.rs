use chrono::{DateTime, Duration, TimeZone, Utc};
use form_domain::{FieldValue, FormValues, PersistenceBehavior};
use form_store::{AutosaveOutcome, Clock, DraftSnapshot, FormSnapshot, InMemoryStorage, KeyValueStorage,
                 PersistenceStore, StoreError};
use std::sync::{Arc, Mutex};

struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
  fn new() -> Self {
    TestClock(Arc::new(Mutex::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())))
  }
  fn clock(&self) -> Clock {
    let at = self.0.clone();
    Arc::new(move || *at.lock().unwrap())
  }
  fn advance(&self, d: Duration) {
    let mut at = self.0.lock().unwrap();
    *at = *at + d;
  }
  fn now(&self) -> DateTime<Utc> {
    *self.0.lock().unwrap()
  }
}

fn settings(max_drafts: usize) -> PersistenceBehavior {
  PersistenceBehavior { storage_prefix: "crm_form_".into(), session_timeout_minutes: 30, max_drafts }
}

fn values(name: &str) -> FormValues {
  let mut v = FormValues::new();
  v.set("name", FieldValue::text(name));
  v
}

#[test]
fn autosave_round_trip_and_key_layout() {
  let storage = Arc::new(InMemoryStorage::new());
  let clock = TestClock::new();
  let store = PersistenceStore::new(storage.clone(), settings(3), clock.clock());

  assert_eq!(store.save_autosave("city", &values("Springfield"), 1).unwrap(), AutosaveOutcome::Written);
  assert!(storage.get_item("crm_form_city").unwrap().is_some());

  let snap = store.load_autosave("city").expect("snapshot");
  assert_eq!(snap.values.value("name"), &FieldValue::text("Springfield"));
  assert_eq!(snap.current_step_index, 1);
  assert_eq!(snap.timestamp, clock.now());
}

#[test]
fn identical_autosave_is_skipped_until_content_changes() {
  let storage = Arc::new(InMemoryStorage::new());
  let store = PersistenceStore::new(storage.clone(), settings(3), TestClock::new().clock());
  assert_eq!(store.save_autosave("city", &values("A"), 0).unwrap(), AutosaveOutcome::Written);
  assert_eq!(store.save_autosave("city", &values("A"), 0).unwrap(), AutosaveOutcome::Unchanged);
  assert_eq!(store.save_autosave("city", &values("A"), 1).unwrap(), AutosaveOutcome::Written);
  // removed behind the store's back: rewrite even if identical
  storage.remove_item("crm_form_city").unwrap();
  assert_eq!(store.save_autosave("city", &values("A"), 1).unwrap(), AutosaveOutcome::Written);
}

#[test]
fn sweep_removes_only_stale_snapshots() {
  let storage = Arc::new(InMemoryStorage::new());
  let clock = TestClock::new();
  let store = PersistenceStore::new(storage.clone(), settings(3), clock.clock());
  let ttl = 30;
  let now = clock.now();

  let stale = FormSnapshot { values: values("old"), current_step_index: 0, timestamp: now - Duration::minutes(ttl + 1) };
  let fresh = FormSnapshot { values: values("new"), current_step_index: 0, timestamp: now - Duration::minutes(ttl - 1) };
  store.save("crm_form_city", &stale).unwrap();
  store.save("crm_form_district", &fresh).unwrap();
  storage.set_item("crm_form_garbage", "{not json").unwrap();
  storage.set_item("unrelated", "{not json").unwrap();

  let report = store.sweep_expired(&["crm_form_"], ttl).unwrap();
  assert_eq!(report.scanned, 3);
  assert_eq!(report.expired, vec!["crm_form_city".to_string()]);
  assert_eq!(report.corrupt, vec!["crm_form_garbage".to_string()]);

  assert!(store.load_autosave("city").is_none());
  assert!(store.load_autosave("district").is_some());
  assert!(storage.get_item("unrelated").unwrap().is_some());
}

#[test]
fn load_treats_expired_and_corrupt_as_absent() {
  let storage = Arc::new(InMemoryStorage::new());
  let clock = TestClock::new();
  let store = PersistenceStore::new(storage.clone(), settings(3), clock.clock());
  store.save_autosave("city", &values("x"), 0).unwrap();
  clock.advance(Duration::minutes(31));
  assert!(store.load_autosave("city").is_none());
  assert!(storage.get_item("crm_form_city").unwrap().is_none());

  storage.set_item("crm_form_city", "[]").unwrap();
  assert!(store.load_autosave("city").is_none());
  assert!(storage.is_empty());
}

#[test]
fn draft_cap_evicts_oldest_by_timestamp() {
  let storage = Arc::new(InMemoryStorage::new());
  let clock = TestClock::new();
  let max = 3;
  let store = PersistenceStore::new(storage.clone(), settings(max), clock.clock());

  let mut saved: Vec<DraftSnapshot> = Vec::new();
  for i in 0..=max {
    saved.push(store.save_draft("city", "user-1", Some(format!("d{}", i)), &values(&i.to_string()), 0).unwrap());
    clock.advance(Duration::seconds(10));
    assert!(store.list_drafts("city", "user-1").len() <= max);
  }

  let drafts = store.list_drafts("city", "user-1");
  assert_eq!(drafts.len(), max);
  assert!(drafts.iter().all(|d| d.id != saved[0].id));
  // newest first
  assert_eq!(drafts[0].label, "d3");
  assert!(store.load_draft("city", &saved[0].id).is_none());
}

#[test]
fn drafts_are_scoped_by_user_and_entity() {
  let storage = Arc::new(InMemoryStorage::new());
  let store = PersistenceStore::new(storage, settings(2), TestClock::new().clock());
  let a = store.save_draft("city", "user-1", None, &values("a"), 0).unwrap();
  store.save_draft("city", "user-2", None, &values("b"), 0).unwrap();
  store.save_draft("district", "user-1", None, &values("c"), 0).unwrap();

  assert!(a.label.starts_with("Borrador "));
  assert_eq!(store.list_drafts("city", "user-1").len(), 1);
  assert_eq!(store.list_drafts("city", "user-2").len(), 1);
  assert!(store.delete_draft("city", &a.id).unwrap());
  assert!(!store.delete_draft("city", &a.id).unwrap());
  assert!(store.list_drafts("city", "user-1").is_empty());
}

#[test]
fn drafts_disabled_and_quota_errors_surface() {
  let store = PersistenceStore::new(Arc::new(InMemoryStorage::new()), settings(0), TestClock::new().clock());
  assert!(matches!(store.save_draft("city", "u", None, &values("a"), 0), Err(StoreError::DraftsDisabled(_))));

  let tiny = PersistenceStore::new(Arc::new(InMemoryStorage::with_quota(16)), settings(2), TestClock::new().clock());
  assert!(matches!(tiny.save_autosave("city", &values("Springfield"), 0), Err(StoreError::QuotaExceeded(_))));
  assert!(tiny.load_autosave("city").is_none());
}

#[test]
fn clearing_autosave_keeps_drafts() {
  let store = PersistenceStore::new(Arc::new(InMemoryStorage::new()), settings(2), TestClock::new().clock());
  store.save_autosave("city", &values("a"), 0).unwrap();
  store.save_draft("city", "u", Some("keep".into()), &values("a"), 0).unwrap();
  store.clear_autosave("city").unwrap();
  assert!(store.load_autosave("city").is_none());
  assert_eq!(store.list_drafts("city", "u").len(), 1);
}
