use form_domain::EntityId;
use form_workflow::config::parse_interval;
use form_workflow::{Debouncer, EngineSettings, FormMode};
use chrono::{Duration, TimeZone, Utc};

#[test]
fn form_mode_parses_and_formats() {
  assert_eq!("create".parse::<FormMode>().unwrap(), FormMode::Create);
  assert_eq!("NEW".parse::<FormMode>().unwrap(), FormMode::Create);
  assert_eq!("edit:42".parse::<FormMode>().unwrap(), FormMode::Edit(EntityId::from(42)));
  assert!("edit:".parse::<FormMode>().is_err());
  assert!("delete".parse::<FormMode>().is_err());
  assert_eq!(FormMode::Edit(EntityId::from(42)).to_string(), "edit:42");
  assert_eq!(FormMode::Create.route("city"), "/city/new");
  assert_eq!(FormMode::Edit(EntityId::from(3)).route("city"), "/city/3/edit");
  assert_eq!(FormMode::Edit(EntityId::from(3)).autosave_slot("city"), "city_edit_3");
}

#[test]
fn sweep_interval_must_be_positive() {
  assert_eq!(parse_interval(" 60 "), Some(60));
  assert_eq!(parse_interval("0"), None);
  assert_eq!(parse_interval("-5"), None);
  assert_eq!(parse_interval("cinco"), None);
  let defaults = EngineSettings::default();
  assert_eq!(defaults.user_scope, "anonymous");
  assert_eq!(defaults.sweep_interval, std::time::Duration::from_secs(300));
}

#[test]
fn debouncer_last_schedule_wins() {
  let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
  let mut d = Debouncer::new(1000);
  assert!(!d.fire_if_due(t0));
  d.schedule(t0);
  d.schedule(t0 + Duration::milliseconds(900));
  assert!(!d.fire_if_due(t0 + Duration::milliseconds(1000)));
  assert!(d.fire_if_due(t0 + Duration::milliseconds(1900)));
  assert!(!d.is_pending());
}
