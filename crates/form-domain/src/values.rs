// values.rs
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

static EMPTY: FieldValue = FieldValue::Empty;

/// Identificador de una entidad del CRM tal como lo devuelve la API.
///
/// Se guarda como texto: la mayoría de entidades usan ids numéricos pero
/// algunas usan UUID. `as_number` permite recuperar el entero cuando aplica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn as_number(&self) -> Option<i64> {
    self.0.parse().ok()
  }
}

impl fmt::Display for EntityId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<i64> for EntityId {
  fn from(id: i64) -> Self {
    Self(id.to_string())
  }
}

impl From<&str> for EntityId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

impl From<String> for EntityId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

/// Valor actual de un campo o relación del formulario.
///
/// Las relaciones usan `One`/`Many`, o `Pending` mientras se espera la
/// creación de la entidad relacionada en otro formulario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
  #[default]
  Empty,
  Text(String),
  /// NaN e infinitos se guardan como texto (`"NaN"`, `"Infinity"`,
  /// `"-Infinity"`): JSON no los representa como número.
  Number(#[serde(with = "number_repr")] f64),
  Bool(bool),
  Date(NaiveDate),
  One(EntityId),
  Many(Vec<EntityId>),
  /// Marcador de relación pendiente: contiene el tipo de entidad destino.
  Pending(String),
}

impl FieldValue {
  pub fn text(s: impl Into<String>) -> Self {
    Self::Text(s.into())
  }

  /// Un texto vacío (o sólo espacios) y una lista vacía cuentan como vacío.
  pub fn is_empty(&self) -> bool {
    match self {
      FieldValue::Empty => true,
      FieldValue::Text(s) => s.trim().is_empty(),
      FieldValue::Many(ids) => ids.is_empty(),
      _ => false,
    }
  }

  pub fn is_pending(&self) -> bool {
    matches!(self, FieldValue::Pending(_))
  }

  pub fn contains_id(&self, id: &EntityId) -> bool {
    match self {
      FieldValue::One(current) => current == id,
      FieldValue::Many(ids) => ids.contains(id),
      _ => false,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      FieldValue::Text(s) => Some(s),
      _ => None,
    }
  }
}

mod number_repr {
  use serde::{de, Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if n.is_finite() {
      serializer.serialize_f64(*n)
    } else if n.is_nan() {
      serializer.serialize_str("NaN")
    } else if n.is_sign_positive() {
      serializer.serialize_str("Infinity")
    } else {
      serializer.serialize_str("-Infinity")
    }
  }

  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Repr {
    Finite(f64),
    Special(String),
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Repr::deserialize(deserializer)? {
      Repr::Finite(n) => Ok(n),
      Repr::Special(s) => match s.as_str() {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        other => Err(de::Error::custom(format!("número no válido: {}", other))),
      },
    }
  }
}

/// Valores del formulario indexados por nombre, en orden de inserción.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(IndexMap<String, FieldValue>);

impl FormValues {
  pub fn new() -> Self {
    Self(IndexMap::new())
  }

  pub fn get(&self, name: &str) -> Option<&FieldValue> {
    self.0.get(name)
  }

  /// Devuelve el valor o `FieldValue::Empty` si el campo no tiene valor.
  pub fn value(&self, name: &str) -> &FieldValue {
    self.0.get(name).unwrap_or(&EMPTY)
  }

  pub fn set(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
    self.0.insert(name.into(), value)
  }

  pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
    self.0.shift_remove(name)
  }

  pub fn contains_id(&self, name: &str, id: &EntityId) -> bool {
    self.value(name).contains_id(id)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl FromIterator<(String, FieldValue)> for FormValues {
  fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}
