// autosave.rs
use chrono::{DateTime, Duration, Utc};

/// Eventos del ciclo de vida de la página/aplicación que fuerzan (o no) un
/// guardado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
  BeforeUnload,
  VisibilityHidden,
  /// Guardado explícito pedido por la aplicación.
  AppSave,
  Close,
}

/// Temporizador de autosave por plazos: cada `schedule` desplaza el plazo,
/// así que sólo la última edición de una ráfaga produce escritura.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
  delay: Duration,
  deadline: Option<DateTime<Utc>>,
}

impl Debouncer {
  pub fn new(delay_ms: u64) -> Self {
    let delay = Duration::milliseconds(i64::try_from(delay_ms).unwrap_or(i64::MAX));
    Debouncer { delay, deadline: None }
  }

  pub fn schedule(&mut self, now: DateTime<Utc>) {
    self.deadline = Some(now.checked_add_signed(self.delay).unwrap_or(DateTime::<Utc>::MAX_UTC));
  }

  pub fn cancel(&mut self) {
    self.deadline = None;
  }

  pub fn is_pending(&self) -> bool {
    self.deadline.is_some()
  }

  pub fn deadline(&self) -> Option<DateTime<Utc>> {
    self.deadline
  }

  /// `true` (y se consume el plazo) si el plazo ya venció en `now`.
  pub fn fire_if_due(&mut self, now: DateTime<Utc>) -> bool {
    match self.deadline {
      Some(deadline) if now >= deadline => {
        self.deadline = None;
        true
      }
      _ => false,
    }
  }
}
