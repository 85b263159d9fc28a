use chrono::NaiveDate;
use form_domain::{Cardinality, DomainStubs, EntityId, FieldKind, FieldValue, FormConfig};
use form_store::KeyValueStorage;
use form_workflow::stubs::InMemoryEntityApi;
use form_workflow::{run_expiry_sweeper, sweep_once, EngineSettings, EntityFormEngine, FormFactory, FormMode,
                    LifecycleEvent, NoopCallbacks, StepTransition, SubmitOutcome, SweepTarget};
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Pequeño menú interactivo para rellenar formularios de entidad (ciudad,
/// distrito, reunión) sobre el almacenamiento de `form-persistence`.
///
/// El servicio de entidades es el de memoria: los ids asignados sólo viven
/// mientras dura el proceso. El autosave, los borradores y el traspaso entre
/// entidades sí quedan en la base de datos configurada.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let settings = EngineSettings::from_env();
    // Inicializar almacenamiento (aplica migraciones embebidas)
    let storage: Arc<dyn KeyValueStorage> =
        Arc::new(form_persistence::new_from_env().map_err(|e| Box::new(e) as Box<dyn Error>)?);
    let factory = FormFactory::new(storage, &settings);
    let configs: Vec<Arc<FormConfig>> = vec![Arc::new(DomainStubs::city_config()?),
                                             Arc::new(DomainStubs::district_config()?),
                                             Arc::new(DomainStubs::meeting_config()?)];
    let api = InMemoryEntityApi::new();

    let targets: Vec<SweepTarget> = configs.iter()
                                           .map(|c| SweepTarget { store: Arc::new(factory.store_for(c)),
                                                                  bridge: Arc::new(factory.bridge_for(c)) })
                                           .collect();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(run_expiry_sweeper(targets.clone(), settings.sweep_interval, shutdown_rx));

    let mut form: Option<EntityFormEngine> = None;
    loop {
        if let Some(engine) = form.as_mut() {
            engine.tick();
        }
        println!("\n== Form CLI menu ==");
        match &form {
            Some(engine) => {
                let p = engine.progress();
                println!("Formulario: {} ({}) | paso {}/{} '{}' | {}%{}",
                         engine.config().entity(),
                         engine.mode(),
                         p.current + 1,
                         p.total,
                         p.title,
                         p.percent,
                         if engine.has_unsaved_changes() { " | cambios sin guardar" } else { "" });
            }
            None => println!("Ningún formulario abierto"),
        }
        println!("1) Abrir formulario");
        println!("2) Ver valores y errores");
        println!("3) Editar campo");
        println!("4) Paso siguiente");
        println!("5) Paso anterior");
        println!("6) Crear entidad relacionada");
        println!("7) Guardar borrador");
        println!("8) Listar / restaurar / borrar borradores");
        println!("9) Enviar");
        println!("10) Cancelar formulario");
        println!("11) Barrer expirados ahora");
        println!("12) Salir");
        let choice = prompt("Elige una opción: ")?;
        match choice.trim() {
            "1" => {
                let entity = prompt("Entidad (city/district/meeting): ")?;
                let Some(config) = configs.iter().find(|c| c.entity() == entity.trim()) else {
                    eprintln!("Entidad desconocida");
                    continue;
                };
                let mode_s = prompt("Modo (create | edit:ID): ")?;
                let mode = match mode_s.trim().parse::<FormMode>() {
                    Ok(m) => m,
                    Err(e) => { eprintln!("{}", e); continue; }
                };
                close_form(&mut form);
                match factory.open(config.clone(), mode, None) {
                    Ok((engine, report)) => {
                        if report.restored_from_autosave {
                            println!("Autosave restaurado");
                        }
                        if let Some(resolved) = report.auto_populated {
                            println!("{} = {} (creado en {})", resolved.relationship_name, resolved.entity_id,
                                     resolved.target_entity);
                        }
                        form = Some(engine);
                    }
                    Err(e) => eprintln!("Error abriendo formulario: {}", e),
                }
            }
            "2" => {
                let Some(engine) = form.as_ref() else { eprintln!("Abre un formulario primero"); continue; };
                let config = engine.config();
                for step in config.steps() {
                    println!("-- {} ({})", step.title, step.id);
                    for member in step.members() {
                        let label = config.label_of(member).unwrap_or(member);
                        println!("   {:<24} {:?}", label, engine.values().value(member));
                        for message in engine.field_errors(member) {
                            println!("   {:<24} ! {}", "", message);
                        }
                    }
                }
            }
            "3" => {
                let Some(engine) = form.as_mut() else { eprintln!("Abre un formulario primero"); continue; };
                let name = prompt("Campo: ")?;
                let raw = prompt("Valor (enter para vaciar): ")?;
                let value = match parse_input(engine.config(), name.trim(), raw.trim()) {
                    Ok(v) => v,
                    Err(e) => { eprintln!("{}", e); continue; }
                };
                match engine.edit_field(name.trim(), value) {
                    Ok(cleared) if !cleared.is_empty() => println!("Vaciados en cascada: {}", cleared.join(", ")),
                    Ok(_) => {}
                    Err(e) => { eprintln!("{}", e); continue; }
                }
                if let Err(e) = engine.blur_field(name.trim()) {
                    eprintln!("{}", e);
                }
            }
            "4" | "5" => {
                let Some(engine) = form.as_mut() else { eprintln!("Abre un formulario primero"); continue; };
                let moved = if choice.trim() == "4" { engine.next_step() } else { engine.previous_step() };
                match moved {
                    Ok(StepTransition::Blocked { step_index, errors }) => {
                        println!("No se puede avanzar: paso {} con errores", step_index + 1);
                        for (field, messages) in errors {
                            println!("  {}: {}", field, messages.join("; "));
                        }
                    }
                    Ok(_) => {}
                    Err(e) => eprintln!("{}", e),
                }
            }
            "6" => {
                let Some(engine) = form.as_mut() else { eprintln!("Abre un formulario primero"); continue; };
                let relationship = prompt("Relación: ")?;
                let creation = match engine.start_related_creation(relationship.trim()) {
                    Ok(c) => c,
                    Err(e) => { eprintln!("{}", e); continue; }
                };
                println!("Navegando a {} (volverá a {})", creation.target_route, creation.return_url);
                close_form(&mut form);
                match configs.iter().find(|c| c.entity() == creation.target_entity) {
                    Some(config) => match factory.open(config.clone(), FormMode::Create, None) {
                        Ok((engine, _)) => form = Some(engine),
                        Err(e) => eprintln!("Error abriendo formulario: {}", e),
                    },
                    None => println!("No hay formulario para '{}' en esta demo", creation.target_entity),
                }
            }
            "7" => {
                let Some(engine) = form.as_mut() else { eprintln!("Abre un formulario primero"); continue; };
                let label = prompt("Etiqueta (enter para automática): ")?;
                match engine.save_draft(Some(label.trim().to_string())) {
                    Ok(draft) => println!("Borrador guardado: {} ({})", draft.label, draft.id),
                    Err(e) => eprintln!("Error guardando borrador: {}", e),
                }
            }
            "8" => {
                let Some(engine) = form.as_mut() else { eprintln!("Abre un formulario primero"); continue; };
                let drafts = engine.list_drafts();
                if drafts.is_empty() {
                    println!("Sin borradores");
                    continue;
                }
                for d in &drafts {
                    println!("{} | {} | {}", d.id, d.snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"), d.label);
                }
                let action = prompt("r <id> restaurar, d <id> borrar, enter para volver: ")?;
                let Some((verb, id_s)) = action.trim().split_once(' ') else { continue; };
                let id = match Uuid::parse_str(id_s.trim()) {
                    Ok(u) => u,
                    Err(_) => { eprintln!("UUID inválido"); continue; }
                };
                let result = match verb {
                    "r" => engine.restore_draft(&id).map(|_| "Borrador restaurado"),
                    "d" => engine.delete_draft(&id).map(|existed| if existed { "Borrador eliminado" } else { "No existía" }),
                    _ => { eprintln!("Acción desconocida"); continue; }
                };
                match result {
                    Ok(msg) => println!("{}", msg),
                    Err(e) => eprintln!("{}", e),
                }
            }
            "9" => {
                let Some(engine) = form.as_mut() else { eprintln!("Abre un formulario primero"); continue; };
                match engine.submit(&api, &NoopCallbacks).await {
                    Ok(SubmitOutcome::Submitted { entity_id, redirect }) => {
                        println!("{} creado con id {}; redirigiendo a {}", engine.config().entity(), entity_id, redirect);
                        form = reopen_from_redirect(&factory, &configs, &redirect);
                    }
                    Ok(SubmitOutcome::Invalid { step_index, errors }) => {
                        println!("Formulario inválido (paso {}): {} campos con errores", step_index + 1, errors.len());
                    }
                    Ok(SubmitOutcome::Failed { error }) => eprintln!("Envío fallido: {}", error),
                    Err(e) => eprintln!("{}", e),
                }
            }
            "10" => {
                let Some(engine) = form.as_mut() else { eprintln!("Abre un formulario primero"); continue; };
                match engine.cancel_form() {
                    Ok(Some(return_url)) => {
                        println!("Volviendo a {}", return_url);
                        form = reopen_from_redirect(&factory, &configs, &return_url);
                    }
                    Ok(None) => {
                        println!("Formulario descartado");
                        form = None;
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            "11" => {
                for target in &targets {
                    let report = sweep_once(target);
                    println!("{}: {} revisadas, {} eliminadas",
                             target.store.settings().storage_prefix,
                             report.scanned,
                             report.removed());
                }
            }
            "12" => {
                close_form(&mut form);
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    shutdown_tx.send(true).ok();
    let removed = sweeper.await?;
    println!("Barrido en segundo plano: {} claves eliminadas", removed);
    Ok(())
}

/// Cierra el formulario actual guardando su estado como al abandonar la
/// página.
fn close_form(form: &mut Option<EntityFormEngine>) {
    if let Some(mut engine) = form.take() {
        engine.handle_lifecycle(LifecycleEvent::BeforeUnload);
        engine.handle_lifecycle(LifecycleEvent::Close);
    }
}

/// Abre el formulario al que apunta una ruta `/{entity}/new` o
/// `/{entity}/{id}/edit` (con o sin query string).
fn reopen_from_redirect(factory: &FormFactory, configs: &[Arc<FormConfig>], url: &str) -> Option<EntityFormEngine> {
    let path = url.split('?').next().unwrap_or_default();
    let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
    let (entity, mode) = match parts.as_slice() {
        [entity, "new"] => (*entity, FormMode::Create),
        [entity, id, "edit"] => (*entity, FormMode::Edit(EntityId::new(*id))),
        _ => return None,
    };
    let config = configs.iter().find(|c| c.entity() == entity)?;
    match factory.open(config.clone(), mode, None) {
        Ok((engine, report)) => {
            if let Some(resolved) = report.auto_populated {
                println!("{} = {} aplicado", resolved.relationship_name, resolved.entity_id);
            }
            Some(engine)
        }
        Err(e) => {
            eprintln!("Error reabriendo {}: {}", entity, e);
            None
        }
    }
}

/// Interpreta la entrada de texto según el tipo declarado del campo.
fn parse_input(config: &FormConfig, name: &str, raw: &str) -> Result<FieldValue, String> {
    if raw.is_empty() {
        return Ok(FieldValue::Empty);
    }
    if let Some(def) = config.field(name) {
        return match &def.kind {
            FieldKind::Text { .. } | FieldKind::Select { .. } => Ok(FieldValue::text(raw)),
            FieldKind::Number { .. } => raw.parse::<f64>()
                                           .map(FieldValue::Number)
                                           .map_err(|_| format!("'{}' no es un número", raw)),
            FieldKind::Boolean => match raw.to_lowercase().as_str() {
                "si" | "sí" | "s" | "true" | "1" => Ok(FieldValue::Bool(true)),
                "no" | "n" | "false" | "0" => Ok(FieldValue::Bool(false)),
                _ => Err(format!("'{}' no es sí/no", raw)),
            },
            FieldKind::Date { .. } => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| format!("'{}' no es una fecha AAAA-MM-DD", raw)),
        };
    }
    match config.relationship(name) {
        Some(def) if def.cardinality == Cardinality::Multiple => {
            Ok(FieldValue::Many(raw.split(',').map(|s| EntityId::new(s.trim())).filter(|id| !id.as_str().is_empty()).collect()))
        }
        Some(_) => Ok(FieldValue::One(EntityId::new(raw))),
        None => Err(format!("Campo no declarado: {}", name)),
    }
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
