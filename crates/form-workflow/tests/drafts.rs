mod common;

use chrono::Duration;
use common::Harness;
use form_domain::FieldValue;
use form_workflow::FormError;
use uuid::Uuid;

#[test]
fn draft_cap_evicts_the_oldest() {
  let h = Harness::new();
  let mut city = h.open_city();
  let mut ids = Vec::new();
  // maxDrafts = 3 for the city form
  for n in 0..4 {
    city.edit_field("name", FieldValue::text(format!("v{}", n))).unwrap();
    ids.push(city.save_draft(None).unwrap().id);
    h.clock.advance(Duration::seconds(1));
  }
  let drafts = city.list_drafts();
  assert_eq!(drafts.len(), 3);
  assert_eq!(drafts.iter().map(|d| d.id).collect::<Vec<_>>(), vec![ids[3], ids[2], ids[1]]);
  assert!(drafts[0].label.starts_with("Borrador 2025-03-01"));
}

#[test]
fn restore_and_delete_draft() {
  let h = Harness::new();
  let mut city = h.open_city();
  city.edit_field("name", FieldValue::text("Primera")).unwrap();
  city.next_step().unwrap();
  let draft = city.save_draft(Some("primera versión".into())).unwrap();

  city.edit_field("name", FieldValue::text("Segunda")).unwrap();
  city.previous_step().unwrap();
  city.restore_draft(&draft.id).unwrap();
  assert_eq!(city.values().value("name"), &FieldValue::text("Primera"));
  assert_eq!(city.current_step_index(), 1);
  assert!(city.has_unsaved_changes());

  assert!(city.delete_draft(&draft.id).unwrap());
  assert!(!city.delete_draft(&draft.id).unwrap());
  assert!(matches!(city.restore_draft(&draft.id), Err(FormError::DraftNotFound(_))));
  assert!(matches!(city.restore_draft(&Uuid::new_v4()), Err(FormError::DraftNotFound(_))));
}

#[test]
fn drafts_are_scoped_per_user() {
  let h = Harness::new();
  let mut city = h.open_city();
  city.save_draft(Some("de ana".into())).unwrap();

  let other_user = form_workflow::FormFactory::new(h.factory.storage().clone(),
                                                   &form_workflow::EngineSettings { user_scope: "luis".into(),
                                                                                    ..Default::default() });
  let (other, _) = other_user.open(h.city.clone(), form_workflow::FormMode::Create, None).unwrap();
  assert!(other.list_drafts().is_empty());
  assert_eq!(city.list_drafts().len(), 1);
}

#[test]
fn draft_with_infinite_number_can_be_restored() {
  let h = Harness::new();
  let mut city = h.open_city();
  city.edit_field("name", FieldValue::text("Springfield")).unwrap();
  city.edit_field("population", FieldValue::Number(f64::NEG_INFINITY)).unwrap();
  let draft = city.save_draft(None).unwrap();

  city.edit_field("name", FieldValue::text("Otra")).unwrap();
  city.edit_field("population", FieldValue::Number(10.0)).unwrap();
  city.restore_draft(&draft.id).unwrap();
  assert_eq!(city.values().value("name"), &FieldValue::text("Springfield"));
  assert_eq!(city.values().value("population"), &FieldValue::Number(f64::NEG_INFINITY));
  assert_eq!(city.list_drafts().len(), 1);
}
