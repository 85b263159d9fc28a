// validation.rs
use crate::config::{Cardinality, FieldDefinition, FieldKind, FormConfig, RelationshipDefinition, TextFormat};
use crate::values::{FieldValue, FormValues};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("regex de email"));
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("regex de url"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]{6,20}$").expect("regex de teléfono"));

/// Errores por campo, en orden de declaración dentro del paso.
pub type FieldErrors = IndexMap<String, Vec<String>>;

/// Primer paso que no supera la validación.
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
  pub step_index: usize,
  pub errors: FieldErrors,
}

/// Validación por campo y por paso derivada de la `FormConfig`.
#[derive(Debug, Clone)]
pub struct ValidationAdapter {
  config: Arc<FormConfig>,
  patterns: HashMap<String, Regex>,
}

impl ValidationAdapter {
  pub fn new(config: Arc<FormConfig>) -> Self {
    // Los patrones ya se comprobaron al cargar la configuración.
    let patterns = config.fields()
                         .iter()
                         .filter_map(|(name, def)| match &def.kind {
                           FieldKind::Text { pattern: Some(p), .. } => Regex::new(p).ok().map(|re| (name.clone(), re)),
                           _ => None,
                         })
                         .collect();
    Self { config, patterns }
  }

  pub fn config(&self) -> &Arc<FormConfig> {
    &self.config
  }

  /// Mensajes de error de un campo o relación; vacío si es válido o si el
  /// nombre no está declarado.
  pub fn validate_field(&self, name: &str, value: &FieldValue) -> Vec<String> {
    if let Some(def) = self.config.field(name) {
      self.check_field(name, def, value)
    } else if let Some(def) = self.config.relationship(name) {
      check_relationship(def, value)
    } else {
      Vec::new()
    }
  }

  /// Valida todos los miembros del paso `index`.
  pub fn validate_step(&self, index: usize, values: &FormValues) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let Some(step) = self.config.step(index) else {
      return errors;
    };
    for member in step.members() {
      let messages = self.validate_field(member, values.value(member));
      if !messages.is_empty() {
        errors.insert(member.to_string(), messages);
      }
    }
    errors
  }

  /// Valida los pasos del rango en orden y se detiene en el primero que
  /// falla. Con `gated_only` sólo cuentan los pasos con `validateOnNext`.
  pub fn validate_steps(&self, range: Range<usize>, values: &FormValues, gated_only: bool) -> Result<(), StepFailure> {
    for index in range {
      let Some(step) = self.config.step(index) else {
        break;
      };
      if gated_only && !step.validation.validate_on_next {
        continue;
      }
      let errors = self.validate_step(index, values);
      if !errors.is_empty() {
        return Err(StepFailure { step_index: index, errors });
      }
    }
    Ok(())
  }

  /// Validación completa previa al envío: todos los pasos.
  pub fn validate_all(&self, values: &FormValues) -> Result<(), StepFailure> {
    self.validate_steps(0..self.config.step_count(), values, false)
  }

  fn check_field(&self, name: &str, def: &FieldDefinition, value: &FieldValue) -> Vec<String> {
    let label = &def.label;
    if value.is_empty() {
      return if def.required { vec![format!("{} es obligatorio", label)] } else { Vec::new() };
    }

    let mut out = Vec::new();
    match (&def.kind, value) {
      (FieldKind::Text { format, min_length, max_length, .. }, FieldValue::Text(s)) => {
        let len = s.chars().count();
        if let Some(min) = min_length {
          if len < *min {
            out.push(format!("{} debe tener al menos {} caracteres", label, min));
          }
        }
        if let Some(max) = max_length {
          if len > *max {
            out.push(format!("{} no puede superar {} caracteres", label, max));
          }
        }
        if let Some(re) = self.patterns.get(name) {
          if !re.is_match(s) {
            out.push(format!("{} tiene un formato inválido", label));
          }
        }
        let invalid_format = match format {
          TextFormat::Email if !EMAIL_RE.is_match(s.trim()) => Some("email"),
          TextFormat::Url if !URL_RE.is_match(s.trim()) => Some("url"),
          TextFormat::Phone if !PHONE_RE.is_match(s.trim()) => Some("teléfono"),
          _ => None,
        };
        if let Some(kind) = invalid_format {
          out.push(format!("{} no es un {} válido", label, kind));
        }
      }
      (FieldKind::Number { min, max, integer }, FieldValue::Number(n)) => {
        if !n.is_finite() {
          out.push(format!("{} debe ser un número", label));
        } else {
          if *integer && n.fract() != 0.0 {
            out.push(format!("{} debe ser un número entero", label));
          }
          if let Some(min) = min {
            if n < min {
              out.push(format!("{} debe ser mayor o igual que {}", label, min));
            }
          }
          if let Some(max) = max {
            if n > max {
              out.push(format!("{} debe ser menor o igual que {}", label, max));
            }
          }
        }
      }
      (FieldKind::Boolean, FieldValue::Bool(_)) => {}
      (FieldKind::Date { min, max }, FieldValue::Date(d)) => {
        if let Some(min) = min {
          if d < min {
            out.push(format!("{} no puede ser anterior a {}", label, min));
          }
        }
        if let Some(max) = max {
          if d > max {
            out.push(format!("{} no puede ser posterior a {}", label, max));
          }
        }
      }
      (FieldKind::Select { options }, FieldValue::Text(s)) => {
        if !options.iter().any(|o| o == s) {
          out.push(format!("{} tiene una opción no válida", label));
        }
      }
      _ => out.push(format!("{} tiene un tipo de valor inválido", label)),
    }
    out
  }
}

fn check_relationship(def: &RelationshipDefinition, value: &FieldValue) -> Vec<String> {
  let label = &def.label;
  match (def.cardinality, value) {
    (_, FieldValue::Pending(target)) => {
      if def.required {
        vec![format!("{} está pendiente de crear ({})", label, target)]
      } else {
        Vec::new()
      }
    }
    (_, v) if v.is_empty() => {
      if def.required {
        vec![format!("{} es obligatorio", label)]
      } else {
        Vec::new()
      }
    }
    (Cardinality::Single, FieldValue::One(_)) | (Cardinality::Multiple, FieldValue::Many(_)) => Vec::new(),
    _ => vec![format!("{} tiene un tipo de valor inválido", label)],
  }
}
