mod common;

use chrono::{Duration, NaiveDate};
use common::Harness;
use form_domain::{EntityId, FieldValue, FormValues};
use form_store::AutosaveOutcome;
use form_workflow::{FormError, FormMode, FormPhase, LifecycleEvent, StepTransition};

#[test]
fn new_form_starts_editing_with_defaults() {
  let h = Harness::new();
  let form = h.open_city();
  assert_eq!(form.phase(), FormPhase::Editing);
  assert_eq!(form.current_step_index(), 0);
  assert_eq!(form.values().value("isCapital"), &FieldValue::Bool(false));
  assert_eq!(form.values().value("district"), &FieldValue::Empty);
  assert!(!form.has_unsaved_changes());
}

#[test]
fn forward_navigation_is_blocked_by_invalid_required_field() {
  let h = Harness::new();
  let mut form = h.open_city();
  match form.go_to_step(1).unwrap() {
    StepTransition::Blocked { step_index, errors } => {
      assert_eq!(step_index, 0);
      assert!(errors.contains_key("name"));
    }
    other => panic!("unexpected transition {:?}", other),
  }
  assert_eq!(form.current_step_index(), 0);
  assert_eq!(form.field_errors("name"), ["Nombre es obligatorio".to_string()]);
}

#[test]
fn skipping_ahead_stops_at_first_failing_step() {
  let h = Harness::new();
  let mut form = h.open_city();
  form.edit_field("name", FieldValue::text("Springfield")).unwrap();
  form.edit_field("foundedOn", FieldValue::Date(NaiveDate::from_ymd_opt(2200, 1, 1).unwrap())).unwrap();
  match form.go_to_step(2).unwrap() {
    StepTransition::Blocked { step_index, errors } => {
      assert_eq!(step_index, 1);
      assert_eq!(errors.keys().map(String::as_str).collect::<Vec<_>>(), vec!["foundedOn"]);
    }
    other => panic!("unexpected transition {:?}", other),
  }
  // review is never reached past a failing step
  assert_eq!(form.current_step_index(), 1);
}

#[test]
fn backward_navigation_never_validates() {
  let h = Harness::new();
  let mut form = h.open_city();
  form.edit_field("name", FieldValue::text("Springfield")).unwrap();
  assert_eq!(form.next_step().unwrap(), StepTransition::Moved { from: 0, to: 1 });
  form.edit_field("name", FieldValue::Empty).unwrap();
  assert_eq!(form.previous_step().unwrap(), StepTransition::Moved { from: 1, to: 0 });
  assert!(form.errors().is_empty());
  assert_eq!(form.previous_step().unwrap(), StepTransition::Unchanged);
}

#[test]
fn out_of_range_step_is_an_error() {
  let h = Harness::new();
  let mut form = h.open_city();
  match form.go_to_step(3) {
    Err(FormError::StepOutOfRange { target, count }) => assert_eq!((target, count), (3, 3)),
    other => panic!("expected out of range, got {:?}", other.map(|_| ())),
  }
}

#[test]
fn editing_clears_only_that_fields_errors() {
  let h = Harness::new();
  let mut form = h.open_city();
  form.edit_field("population", FieldValue::Number(-1.0)).unwrap();
  form.blur_field("population").unwrap();
  let _ = form.go_to_step(1).unwrap();
  assert!(form.errors().contains_key("name"));
  assert!(form.errors().contains_key("population"));
  form.edit_field("population", FieldValue::Number(10.0)).unwrap();
  assert!(!form.errors().contains_key("population"));
  assert!(form.errors().contains_key("name"));
}

#[test]
fn blur_validates_in_on_blur_mode_and_marks_touched() {
  let h = Harness::new();
  let mut form = h.open_city();
  form.edit_field("name", FieldValue::text("")).unwrap();
  assert!(form.errors().is_empty());
  let messages = form.blur_field("name").unwrap();
  assert_eq!(messages.len(), 1);
  assert!(form.session().touched.contains("name"));
}

#[test]
fn on_change_mode_validates_while_typing() {
  let h = Harness::new();
  let (mut form, _) = h.open(&h.meeting, FormMode::Create);
  form.edit_field("subject", FieldValue::text("ab")).unwrap();
  assert_eq!(form.field_errors("subject").len(), 1);
  form.edit_field("subject", FieldValue::text("abc")).unwrap();
  assert!(form.field_errors("subject").is_empty());
}

#[test]
fn unknown_field_is_rejected() {
  let h = Harness::new();
  let mut form = h.open_city();
  assert!(matches!(form.edit_field("mayor", FieldValue::text("x")), Err(FormError::UnknownField(_))));
  assert!(matches!(form.blur_field("mayor"), Err(FormError::UnknownField(_))));
}

#[test]
fn changing_a_parent_relationship_clears_its_dependents() {
  let h = Harness::new();
  let mut form = h.open_city();
  form.edit_field("country", FieldValue::One(EntityId::from(1))).unwrap();
  form.edit_field("district", FieldValue::One(EntityId::from(7))).unwrap();

  // same value again: nothing to clear
  let cleared = form.edit_field("country", FieldValue::One(EntityId::from(1))).unwrap();
  assert!(cleared.is_empty());
  assert_eq!(form.values().value("district"), &FieldValue::One(EntityId::from(7)));

  let cleared = form.edit_field("country", FieldValue::One(EntityId::from(2))).unwrap();
  assert_eq!(cleared, vec!["district".to_string()]);
  assert_eq!(form.values().value("district"), &FieldValue::Empty);

  // the lowest level never clears anything
  let cleared = form.edit_field("district", FieldValue::One(EntityId::from(9))).unwrap();
  assert!(cleared.is_empty());
  assert_eq!(form.values().value("country"), &FieldValue::One(EntityId::from(2)));
}

#[test]
fn progress_reports_position() {
  let h = Harness::new();
  let mut form = h.open_city();
  let p = form.progress();
  assert_eq!((p.current, p.total, p.percent, p.is_first, p.is_last), (0, 3, 33, true, false));
  assert_eq!(p.step_id, "basic");
  form.edit_field("name", FieldValue::text("Springfield")).unwrap();
  form.go_to_step(2).unwrap();
  let p = form.progress();
  assert_eq!((p.current, p.percent, p.is_last), (2, 100, true));
  assert_eq!(p.step_id, "review");
}

#[test]
fn debounced_autosave_fires_once_after_the_last_edit() {
  let h = Harness::new();
  let mut form = h.open_city();
  form.edit_field("name", FieldValue::text("Spr")).unwrap();
  h.clock.advance(Duration::milliseconds(600));
  form.edit_field("name", FieldValue::text("Springfield")).unwrap();
  h.clock.advance(Duration::milliseconds(600));
  // the first deadline was replaced by the second edit
  assert_eq!(form.tick(), None);
  assert!(!h.key_exists("crm_form_city"));
  h.clock.advance(Duration::milliseconds(400));
  assert_eq!(form.tick(), Some(AutosaveOutcome::Written));
  assert!(!form.is_autosave_pending());
  assert_eq!(form.tick(), None);
}

#[test]
fn autosave_survives_a_reload() {
  let h = Harness::new();
  let mut form = h.open_city();
  form.edit_field("name", FieldValue::text("Springfield")).unwrap();
  form.edit_field("population", FieldValue::Number(30_000.0)).unwrap();
  form.next_step().unwrap();
  // navigation already wrote this exact state
  assert_eq!(form.handle_lifecycle(LifecycleEvent::BeforeUnload), Some(AutosaveOutcome::Unchanged));
  drop(form);

  let (reloaded, report) = h.open(&h.city, FormMode::Create);
  assert!(report.restored_from_autosave);
  assert_eq!(reloaded.current_step_index(), 1);
  assert_eq!(reloaded.values().value("name"), &FieldValue::text("Springfield"));
  assert_eq!(reloaded.values().value("population"), &FieldValue::Number(30_000.0));
  assert!(reloaded.has_unsaved_changes());
}

#[test]
fn non_finite_number_does_not_spoil_the_autosave() {
  let h = Harness::new();
  let mut form = h.open_city();
  form.edit_field("name", FieldValue::text("Springfield")).unwrap();
  form.edit_field("population", FieldValue::Number(f64::NAN)).unwrap();
  assert_eq!(form.save_form_state(), Some(AutosaveOutcome::Written));
  drop(form);

  let (mut reloaded, report) = h.open(&h.city, FormMode::Create);
  assert!(report.restored_from_autosave);
  assert_eq!(reloaded.values().value("name"), &FieldValue::text("Springfield"));
  assert!(matches!(reloaded.values().value("population"), FieldValue::Number(n) if n.is_nan()));
  // the value is kept but never passes validation
  assert!(matches!(reloaded.next_step().unwrap(), StepTransition::Blocked { step_index: 0, .. }));
  assert!(!reloaded.field_errors("population").is_empty());
}

#[test]
fn expired_autosave_is_not_restored() {
  let h = Harness::new();
  let mut form = h.open_city();
  form.edit_field("name", FieldValue::text("Springfield")).unwrap();
  form.save_form_state().unwrap();
  h.clock.advance(Duration::minutes(61));
  let (reloaded, report) = h.open(&h.city, FormMode::Create);
  assert!(!report.restored_from_autosave);
  assert_eq!(reloaded.values().value("name"), &FieldValue::Empty);
  assert!(!h.key_exists("crm_form_city"));
}

#[test]
fn lifecycle_events_follow_save_behavior() {
  let h = Harness::new();
  let mut form = h.open_city();
  // clean form: nothing to write
  assert_eq!(form.handle_lifecycle(LifecycleEvent::VisibilityHidden), None);
  form.edit_field("name", FieldValue::text("Springfield")).unwrap();
  assert!(form.is_autosave_pending());
  assert_eq!(form.handle_lifecycle(LifecycleEvent::Close), None);
  assert!(!form.is_autosave_pending());
  assert_eq!(form.handle_lifecycle(LifecycleEvent::VisibilityHidden), Some(AutosaveOutcome::Written));
  assert_eq!(form.handle_lifecycle(LifecycleEvent::AppSave), Some(AutosaveOutcome::Unchanged));
}

#[test]
fn edit_mode_uses_prefill_and_ignores_create_autosave() {
  let h = Harness::new();
  let mut create = h.open_city();
  create.edit_field("name", FieldValue::text("Draft city")).unwrap();
  create.save_form_state().unwrap();

  let mut prefill = FormValues::new();
  prefill.set("name", FieldValue::text("Shelbyville"));
  prefill.set("unknown", FieldValue::text("ignored"));
  let (mut edit, report) =
    h.factory.open(h.city.clone(), FormMode::Edit(EntityId::from(5)), Some(prefill)).unwrap();
  assert!(!report.restored_from_autosave);
  assert_eq!(edit.values().value("name"), &FieldValue::text("Shelbyville"));
  assert!(edit.values().get("unknown").is_none());

  edit.edit_field("name", FieldValue::text("Shelbyville Norte")).unwrap();
  edit.save_form_state().unwrap();
  assert!(h.key_exists("crm_form_city_edit_5"));
  // the create slot keeps its own snapshot
  let (again, _) = h.open(&h.city, FormMode::Create);
  assert_eq!(again.values().value("name"), &FieldValue::text("Draft city"));
}

#[test]
fn initialize_twice_is_an_invalid_state() {
  let h = Harness::new();
  let mut form = h.open_city();
  assert!(matches!(form.initialize(None), Err(FormError::InvalidState { .. })));
}
