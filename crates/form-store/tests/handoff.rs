use chrono::{DateTime, Duration, TimeZone, Utc};
use form_domain::{CrossEntityKeys, EntityId};
use form_store::{Clock, CrossEntityBridge, InMemoryStorage, KeyValueStorage};
use std::sync::{Arc, Mutex};

fn clock_at(at: Arc<Mutex<DateTime<Utc>>>) -> Clock {
  Arc::new(move || *at.lock().unwrap())
}

fn bridge() -> (Arc<InMemoryStorage>, CrossEntityBridge, Arc<Mutex<DateTime<Utc>>>) {
  let storage = Arc::new(InMemoryStorage::new());
  let now = Arc::new(Mutex::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()));
  let bridge = CrossEntityBridge::new(storage.clone(), CrossEntityKeys::default(), clock_at(now.clone()));
  (storage, bridge, now)
}

#[test]
fn handoff_round_trip_is_read_once() {
  let (storage, bridge, _) = bridge();
  bridge.begin("/city/new?resume=city", "district", "district").unwrap();
  let active = bridge.active().expect("active");
  assert!(!active.is_resolved());
  assert_eq!(active.relationship_name, "district");

  // a different entity type does not complete it
  assert_eq!(bridge.complete("country", &EntityId::from(7)).unwrap(), None);
  let url = bridge.complete("district", &EntityId::from(42)).unwrap();
  assert_eq!(url.as_deref(), Some("/city/new?resume=city"));
  assert_eq!(storage.get_item("newlyCreatedEntityId").unwrap().as_deref(), Some("42"));

  // a form without that relationship does not consume it
  assert!(bridge.take_resolved_for(|h| h.relationship_name == "owner").is_none());
  let resolved = bridge.take_resolved_for(|h| h.relationship_name == "district" && h.target_entity == "district").expect("resolved");
  assert_eq!(resolved.entity_id, EntityId::from(42));

  assert!(bridge.take_resolved_for(|_| true).is_none());
  for key in ["returnUrl", "relationshipFieldInfo", "newlyCreatedEntityId"] {
    assert!(storage.get_item(key).unwrap().is_none(), "{} should be gone", key);
  }
}

#[test]
fn unresolved_handoff_is_not_taken() {
  let (_, bridge, _) = bridge();
  bridge.begin("/city/new", "district", "district").unwrap();
  assert!(bridge.take_resolved_for(|_| true).is_none());
  assert!(bridge.active().is_some());
}

#[test]
fn second_handoff_overwrites_first() {
  let (_, bridge, _) = bridge();
  bridge.begin("/city/new", "district", "district").unwrap();
  bridge.begin("/meeting/new", "participants", "party").unwrap();
  let active = bridge.active().unwrap();
  assert_eq!(active.relationship_name, "participants");
  assert_eq!(active.return_url, "/meeting/new");
  assert_eq!(bridge.complete("district", &EntityId::from(1)).unwrap(), None);
}

#[test]
fn malformed_records_are_deleted() {
  let (storage, bridge, _) = bridge();
  storage.set_item("relationshipFieldInfo", "{broken").unwrap();
  storage.set_item("returnUrl", "/city/new").unwrap();
  assert!(bridge.active().is_none());
  assert!(storage.is_empty());

  // half-written record
  storage.set_item("newlyCreatedEntityId", "5").unwrap();
  assert!(bridge.active().is_none());
  assert!(storage.is_empty());
}

#[test]
fn abandoned_handoff_is_swept_after_ttl() {
  let (storage, bridge, now) = bridge();
  bridge.begin("/city/new", "district", "district").unwrap();
  assert!(!bridge.sweep_expired(30));
  {
    let mut at = now.lock().unwrap();
    *at = *at + Duration::minutes(31);
  }
  assert!(bridge.sweep_expired(30));
  assert!(storage.is_empty());
  // a new handoff can start afterwards
  bridge.begin("/meeting/new", "participants", "party").unwrap();
  assert!(bridge.active().is_some());
}

#[test]
fn cancel_clears_without_id() {
  let (storage, bridge, _) = bridge();
  bridge.begin("/city/new", "district", "district").unwrap();
  bridge.clear().unwrap();
  assert!(bridge.active().is_none());
  assert!(storage.is_empty());
}
