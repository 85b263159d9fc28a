use form_domain::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Modo del formulario: alta de una entidad nueva o edición de una
/// existente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "id")]
pub enum FormMode {
    Create,
    Edit(EntityId),
}

impl FormMode {
    /// Ruta del formulario para `entity` en este modo.
    pub fn route(&self, entity: &str) -> String {
        match self {
            FormMode::Create => format!("/{}/new", entity),
            FormMode::Edit(id) => format!("/{}/{}/edit", entity, id),
        }
    }

    /// Ranura de autosave: la edición de cada registro tiene la suya para
    /// no pisar el autosave del alta.
    pub fn autosave_slot(&self, entity: &str) -> String {
        match self {
            FormMode::Create => entity.to_string(),
            FormMode::Edit(id) => format!("{}_edit_{}", entity, id),
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, FormMode::Edit(_))
    }
}

impl fmt::Display for FormMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormMode::Create => write!(f, "create"),
            FormMode::Edit(id) => write!(f, "edit:{}", id),
        }
    }
}

impl FromStr for FormMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "create" | "new" => Ok(FormMode::Create),
            _ => match s.trim().split_once(':') {
                Some((mode, id)) if mode.eq_ignore_ascii_case("edit") && !id.trim().is_empty() => {
                    Ok(FormMode::Edit(EntityId::new(id.trim())))
                }
                _ => Err(format!("modo de formulario desconocido: {}", s)),
            },
        }
    }
}

impl Default for FormMode {
    fn default() -> Self {
        FormMode::Create
    }
}
