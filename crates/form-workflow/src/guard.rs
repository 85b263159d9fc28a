// Archivo: guard.rs
// Propósito: protección ante abandono con cambios sin guardar (cierre de
// pestaña, enlaces internos, navegación atrás del historial).
use log::debug;

/// Modificadores de teclado activos al hacer clic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.ctrl || self.meta || self.shift || self.alt
    }
}

/// Clic sobre un enlace, tal como lo ve el manejador global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkClick {
    pub href: String,
    pub target_blank: bool,
    pub modifiers: Modifiers,
    /// 0 = botón principal.
    pub button: u8,
    pub default_prevented: bool,
}

impl LinkClick {
    pub fn primary(href: impl Into<String>) -> Self {
        LinkClick { href: href.into(),
                    target_blank: false,
                    modifiers: Modifiers::default(),
                    button: 0,
                    default_prevented: false }
    }
}

/// Decisión del guardia sobre un intento de salida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// La navegación sigue su curso.
    Allow,
    /// Navegación retenida: se muestra el diálogo de confirmación.
    Prompt { destination: String },
}

/// Efecto de un evento `popstate` (atrás/adelante del historial).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopStateAction {
    Allow,
    /// Se vuelve a apilar la URL actual y se pregunta.
    RepushAndPrompt { current_url: String },
}

/// Guardia de cambios sin guardar.
///
/// Sólo actúa mientras hay cambios pendientes y no se está enviando.
/// Confirmar la salida limpia el indicador de cambios antes de liberar la
/// navegación retenida. Con `with_origin`, los enlaces absolutos a ese mismo
/// origen cuentan como internos; sin origen, todo enlace absoluto es externo.
#[derive(Debug, Clone, Default)]
pub struct UnsavedChangesGuard {
    origin: Option<String>,
    has_unsaved_changes: bool,
    is_submitting: bool,
    pending_destination: Option<String>,
}

impl UnsavedChangesGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Origen de la aplicación, p.ej. `https://crm.example.com`.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        self.origin = Some(origin.trim().trim_end_matches('/').to_string());
        self
    }

    /// Sincroniza el guardia con el estado del formulario.
    pub fn update(&mut self, has_unsaved_changes: bool, is_submitting: bool) {
        self.has_unsaved_changes = has_unsaved_changes;
        self.is_submitting = is_submitting;
        if !has_unsaved_changes {
            self.pending_destination = None;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.has_unsaved_changes && !self.is_submitting
    }

    pub fn pending_destination(&self) -> Option<&str> {
        self.pending_destination.as_deref()
    }

    /// Cierre o recarga de la pestaña: `true` si hay que pedir el aviso
    /// nativo del navegador.
    pub fn on_before_unload(&self) -> bool {
        self.is_armed()
    }

    pub fn on_link_click(&mut self, current_url: &str, click: &LinkClick) -> GuardDecision {
        if !self.is_armed() || !is_interceptable(self.origin.as_deref(), current_url, click) {
            return GuardDecision::Allow;
        }
        debug!("navegación retenida hacia {}", click.href);
        self.pending_destination = Some(click.href.clone());
        GuardDecision::Prompt { destination: click.href.clone() }
    }

    pub fn on_pop_state(&mut self, current_url: &str, destination: &str) -> PopStateAction {
        if !self.is_armed() {
            return PopStateAction::Allow;
        }
        self.pending_destination = Some(destination.to_string());
        PopStateAction::RepushAndPrompt { current_url: current_url.to_string() }
    }

    /// El usuario confirma la salida: limpia los cambios pendientes y
    /// devuelve el destino retenido.
    pub fn confirm_leave(&mut self) -> Option<String> {
        let destination = self.pending_destination.take()?;
        self.has_unsaved_changes = false;
        Some(destination)
    }

    /// El usuario decide quedarse.
    pub fn cancel_leave(&mut self) {
        self.pending_destination = None;
    }
}

/// Sólo se interceptan clics primarios sin modificadores sobre enlaces
/// internos que abren en la misma pestaña hacia otra URL.
fn is_interceptable(origin: Option<&str>, current_url: &str, click: &LinkClick) -> bool {
    if click.default_prevented || click.button != 0 || click.modifiers.any() || click.target_blank {
        return false;
    }
    let href = click.href.trim();
    if href.is_empty() || href.starts_with('#') {
        return false;
    }
    let Some(target) = internal_path(origin, href) else {
        return false;
    };
    let current = internal_path(origin, current_url.trim()).unwrap_or(current_url.trim());
    strip_fragment(target) != strip_fragment(current)
}

/// Ruta local de `url`, o `None` si sale de la aplicación.
fn internal_path<'a>(origin: Option<&str>, url: &'a str) -> Option<&'a str> {
    let lower = url.to_ascii_lowercase();
    if ["mailto:", "tel:", "javascript:"].iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }
    let absolute = lower.starts_with("http://") || lower.starts_with("https://");
    let protocol_relative = lower.starts_with("//");
    if !absolute && !protocol_relative {
        return Some(url);
    }
    let origin = origin?;
    let expected = if protocol_relative {
        origin.find("://").map_or(origin, |at| &origin[at + 1..])
    } else {
        origin
    };
    let head = url.get(..expected.len())?;
    if !head.eq_ignore_ascii_case(expected) {
        return None;
    }
    match &url[expected.len()..] {
        "" => Some("/"),
        rest if rest.starts_with(['/', '?', '#']) => Some(rest),
        _ => None,
    }
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}
