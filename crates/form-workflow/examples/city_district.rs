// Clean example: city form creates a district inline using in-memory storage
use form_domain::{DomainStubs, FieldValue, EntityId};
use form_store::{InMemoryStorage, KeyValueStorage};
use form_workflow::stubs::InMemoryEntityApi;
use form_workflow::{EngineSettings, FormFactory, FormMode, NoopCallbacks, SubmitOutcome};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let storage: Arc<dyn KeyValueStorage> = Arc::new(InMemoryStorage::new());
    let factory = FormFactory::new(storage, &EngineSettings::default());
    let city_cfg = Arc::new(DomainStubs::city_config().expect("city config"));
    let district_cfg = Arc::new(DomainStubs::district_config().expect("district config"));
    let api = InMemoryEntityApi::starting_at(42);

    let (mut city, _) = factory.open(city_cfg.clone(), FormMode::Create, None).expect("open city");
    city.edit_field("name", FieldValue::text("Springfield")).expect("name");
    city.edit_field("country", FieldValue::One(EntityId::from(1))).expect("country");
    city.next_step().expect("next");
    let nav = city.start_related_creation("district").expect("handoff");
    println!("City -> {} (return to {})", nav.target_route, nav.return_url);
    drop(city);

    // the district form knows nothing about the city
    let (mut district, _) = factory.open(district_cfg, FormMode::Create, None).expect("open district");
    district.edit_field("name", FieldValue::text("Centro")).expect("name");
    if let SubmitOutcome::Submitted { entity_id, redirect } =
        district.submit(&api, &NoopCallbacks).await.expect("submit district")
    {
        println!("District {} created, redirect to {}", entity_id, redirect);
    }

    let (city, report) = factory.open(city_cfg, FormMode::Create, None).expect("reopen city");
    println!("Restored: {} | district = {:?} | step {}",
             report.restored_from_autosave,
             city.values().value("district"),
             city.current_step_index());
}
