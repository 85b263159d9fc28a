mod common;

use chrono::Duration;
use common::Harness;
use form_domain::FieldValue;
use form_store::KeyValueStorage;
use form_workflow::{run_expiry_sweeper, sweep_once, SweepTarget};
use std::sync::Arc;
use tokio::sync::watch;

fn target(h: &Harness) -> SweepTarget {
  SweepTarget { store: Arc::new(h.factory.store_for(&h.city)), bridge: Arc::new(h.factory.bridge_for(&h.city)) }
}

#[test]
fn ttl_boundary_on_sweep() {
  let h = Harness::new();
  let mut city = h.open_city();
  city.edit_field("name", FieldValue::text("old")).unwrap();
  city.save_form_state().unwrap();
  h.clock.advance(Duration::minutes(2));
  city.save_draft(Some("reciente".into())).unwrap();

  // autosave is ttl+1 minutes old, the draft ttl-1
  h.clock.advance(Duration::minutes(59));
  let report = sweep_once(&target(&h));
  assert_eq!(report.expired, vec!["crm_form_city".to_string()]);
  assert!(!h.key_exists("crm_form_city"));
  assert_eq!(city.list_drafts().len(), 1);
}

#[test]
fn sweep_removes_corrupt_snapshots_and_abandoned_handoffs() {
  let h = Harness::new();
  let mut city = h.open_city();
  city.start_related_creation("district").unwrap();
  h.storage.set_item("crm_form_broken", "{not json").unwrap();
  h.storage.set_item("unrelated", "{not json").unwrap();

  h.clock.advance(Duration::minutes(61));
  let report = sweep_once(&target(&h));
  assert_eq!(report.corrupt, vec!["crm_form_broken".to_string()]);
  assert!(report.expired.contains(&"relationshipFieldInfo".to_string()));
  assert!(!h.key_exists("returnUrl"));
  assert!(h.key_exists("unrelated"));

  // a new handoff is never blocked by the abandoned one
  let mut city = h.open_city();
  assert!(city.start_related_creation("district").is_ok());
}

#[tokio::test(start_paused = true)]
async fn background_sweeper_runs_until_shutdown() {
  let h = Harness::new();
  let mut city = h.open_city();
  city.edit_field("name", FieldValue::text("old")).unwrap();
  city.save_form_state().unwrap();
  h.clock.advance(Duration::minutes(90));

  let (tx, rx) = watch::channel(false);
  let task = tokio::spawn(run_expiry_sweeper(vec![target(&h)], std::time::Duration::from_secs(300), rx));
  tokio::time::sleep(std::time::Duration::from_secs(1)).await;
  assert!(!h.key_exists("crm_form_city"));

  tx.send(true).unwrap();
  let removed = task.await.unwrap();
  assert_eq!(removed, 1);
}

#[tokio::test]
async fn dropped_sender_stops_the_sweeper() {
  let h = Harness::new();
  let (tx, rx) = watch::channel(false);
  let task = tokio::spawn(run_expiry_sweeper(vec![target(&h)], std::time::Duration::from_secs(3600), rx));
  drop(tx);
  assert_eq!(task.await.unwrap(), 0);
}
