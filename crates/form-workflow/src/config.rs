use log::warn;
use std::time::Duration;

pub const DEFAULT_USER_SCOPE: &str = "anonymous";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Ajustes del proceso que no forman parte de la configuración de cada
/// formulario.
///
/// - `FORM_USER_SCOPE`: ámbito de usuario con el que se etiquetan los
///   borradores.
/// - `FORM_SWEEP_INTERVAL_SECS`: periodo del barrido de expiración.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
  pub user_scope: String,
  pub sweep_interval: Duration,
}

impl Default for EngineSettings {
  fn default() -> Self {
    EngineSettings { user_scope: DEFAULT_USER_SCOPE.to_string(),
                     sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS) }
  }
}

impl EngineSettings {
  /// Lee los ajustes del entorno (cargando `.env` si existe). Los valores
  /// ausentes o inválidos caen en los valores por defecto.
  pub fn from_env() -> Self {
    dotenvy::dotenv().ok();
    let user_scope = std::env::var("FORM_USER_SCOPE").ok()
                                                      .map(|s| s.trim().to_string())
                                                      .filter(|s| !s.is_empty())
                                                      .unwrap_or_else(|| DEFAULT_USER_SCOPE.to_string());
    let sweep_secs = match std::env::var("FORM_SWEEP_INTERVAL_SECS") {
      Ok(raw) => parse_interval(&raw).unwrap_or_else(|| {
                                        warn!("FORM_SWEEP_INTERVAL_SECS inválido ({}); se usa {}",
                                              raw, DEFAULT_SWEEP_INTERVAL_SECS);
                                        DEFAULT_SWEEP_INTERVAL_SECS
                                      }),
      Err(_) => DEFAULT_SWEEP_INTERVAL_SECS,
    };
    EngineSettings { user_scope, sweep_interval: Duration::from_secs(sweep_secs) }
  }
}

/// Segundos estrictamente positivos.
pub fn parse_interval(raw: &str) -> Option<u64> {
  raw.trim().parse::<u64>().ok().filter(|s| *s > 0)
}
