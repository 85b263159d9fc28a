use chrono::NaiveDate;
use form_domain::{DomainStubs, EntityId, FieldValue, FormValues, ValidationAdapter};
use std::sync::Arc;

fn city_adapter() -> ValidationAdapter {
  ValidationAdapter::new(Arc::new(DomainStubs::city_config().unwrap()))
}

#[test]
fn required_field_fails_when_empty() {
  let adapter = city_adapter();
  let errors = adapter.validate_step(0, &FormValues::new());
  assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["name"]);
  assert!(errors["name"][0].contains("obligatorio"));
}

#[test]
fn step_errors_follow_declaration_order_not_alphabetical() {
  let adapter = city_adapter();
  let mut values = FormValues::new();
  // "population" and "isCapital" declared after "name"; alphabetical order
  // would place "isCapital" first
  values.set("population", FieldValue::Number(-3.5));
  values.set("isCapital", FieldValue::text("yes"));
  let errors = adapter.validate_step(0, &values);
  assert_eq!(errors.keys().map(String::as_str).collect::<Vec<_>>(), vec!["name", "population", "isCapital"]);
  // negative and fractional
  assert_eq!(errors["population"].len(), 2);
}

#[test]
fn text_constraints_and_formats() {
  let meeting = ValidationAdapter::new(Arc::new(DomainStubs::meeting_config().unwrap()));
  assert_eq!(meeting.validate_field("subject", &FieldValue::text("ab")).len(), 1);
  assert!(meeting.validate_field("subject", &FieldValue::text("abc")).is_empty());
  assert_eq!(meeting.validate_field("contactEmail", &FieldValue::text("nope")).len(), 1);
  assert!(meeting.validate_field("contactEmail", &FieldValue::text("a@b.io")).is_empty());
  // optional and empty passes
  assert!(meeting.validate_field("contactEmail", &FieldValue::Empty).is_empty());
  assert_eq!(meeting.validate_field("status", &FieldValue::text("other")).len(), 1);

  let district = ValidationAdapter::new(Arc::new(DomainStubs::district_config().unwrap()));
  assert_eq!(district.validate_field("code", &FieldValue::text("greene")).len(), 1);
  assert!(district.validate_field("code", &FieldValue::text("GC")).is_empty());
}

#[test]
fn date_bounds() {
  let adapter = city_adapter();
  let late = FieldValue::Date(NaiveDate::from_ymd_opt(2200, 1, 1).unwrap());
  let ok = FieldValue::Date(NaiveDate::from_ymd_opt(1850, 6, 1).unwrap());
  assert_eq!(adapter.validate_field("foundedOn", &late).len(), 1);
  assert!(adapter.validate_field("foundedOn", &ok).is_empty());
}

#[test]
fn relationship_cardinality_and_pending() {
  let meeting = ValidationAdapter::new(Arc::new(DomainStubs::meeting_config().unwrap()));
  let pending = FieldValue::Pending("party".into());
  assert_eq!(meeting.validate_field("participants", &pending).len(), 1);
  assert_eq!(meeting.validate_field("participants", &FieldValue::Many(vec![])).len(), 1);
  assert_eq!(meeting.validate_field("participants", &FieldValue::One(EntityId::from(1))).len(), 1);
  assert!(meeting.validate_field("participants", &FieldValue::Many(vec![EntityId::from(1)])).is_empty());
}

#[test]
fn validate_all_reports_first_failing_step() {
  let meeting = ValidationAdapter::new(Arc::new(DomainStubs::meeting_config().unwrap()));
  let mut values = FormValues::new();
  values.set("subject", FieldValue::text("Kickoff"));
  let failure = meeting.validate_all(&values).unwrap_err();
  assert_eq!(failure.step_index, 1);
  assert!(failure.errors.contains_key("participants"));

  // gated-only skips the participants step (validateOnNext = false)
  assert!(meeting.validate_steps(0..2, &values, true).is_ok());
}
