// Archivo: sweeper.rs
// Propósito: barrido periódico de snapshots y traspasos caducados,
// independiente de cualquier formulario abierto.
use form_store::{CrossEntityBridge, PersistenceStore, SweepReport};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Almacén y puente que barre el proceso.
#[derive(Clone)]
pub struct SweepTarget {
    pub store: Arc<PersistenceStore>,
    pub bridge: Arc<CrossEntityBridge>,
}

/// Una pasada: snapshots bajo el prefijo del almacén con su
/// `sessionTimeoutMinutes`, y el traspaso activo con el mismo TTL.
pub fn sweep_once(target: &SweepTarget) -> SweepReport {
    let settings = target.store.settings();
    let ttl = settings.session_timeout_minutes;
    let mut report = match target.store.sweep_expired(&[settings.storage_prefix.as_str()], ttl) {
        Ok(report) => report,
        Err(e) => {
            warn!("barrido de {} fallido: {}", settings.storage_prefix, e);
            SweepReport::default()
        }
    };
    if target.bridge.sweep_expired(ttl) {
        report.expired.push(target.bridge.keys().relationship_info_key.clone());
    }
    report
}

/// Tarea periódica de expiración. La primera pasada es inmediata; termina
/// cuando `shutdown` pasa a `true` o se cierra el emisor. Devuelve el total
/// de claves eliminadas.
pub async fn run_expiry_sweeper(targets: Vec<SweepTarget>,
                                every: Duration,
                                mut shutdown: watch::Receiver<bool>)
                                -> usize {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut removed = 0;
    loop {
        tokio::select! {
            biased;
            _ = interval.tick() => {
                for target in &targets {
                    let report = sweep_once(target);
                    if report.removed() > 0 {
                        debug!("barrido: {} revisadas, {} eliminadas", report.scanned, report.removed());
                    }
                    removed += report.removed();
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("barrido detenido ({} eliminadas en total)", removed);
    removed
}
