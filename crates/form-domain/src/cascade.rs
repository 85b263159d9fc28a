// cascade.rs
//
// Grafo explícito padre -> hijos entre relaciones. Cambiar una relación
// vacía todas las relaciones alcanzables desde ella.
use crate::config::RelationshipDefinition;
use crate::errors::ConfigError;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeGraph {
  edges: IndexMap<String, Vec<String>>,
  priority: IndexMap<String, usize>,
}

impl CascadeGraph {
  /// Construye el grafo a partir de los `dependents` declarados en cada
  /// relación y de la jerarquía opcional (cada nivel es padre de todos los
  /// niveles inferiores). Rechaza referencias desconocidas y ciclos.
  pub fn build(relationships: &IndexMap<String, RelationshipDefinition>,
               hierarchy: &[String])
               -> Result<Self, ConfigError> {
    let mut edges: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut priority: IndexMap<String, usize> = IndexMap::new();

    for (level, name) in hierarchy.iter().enumerate() {
      if !relationships.contains_key(name) {
        return Err(ConfigError::UnknownRelationship(name.clone()));
      }
      if priority.insert(name.clone(), level).is_some() {
        return Err(ConfigError::CascadeCycle(format!("{} repetido en la jerarquía", name)));
      }
    }

    for (name, def) in relationships {
      let children = edges.entry(name.clone()).or_default();
      for dep in &def.dependents {
        if !relationships.contains_key(dep) {
          return Err(ConfigError::UnknownRelationship(dep.clone()));
        }
        if dep == name {
          return Err(ConfigError::CascadeCycle(name.clone()));
        }
        if !children.contains(dep) {
          children.push(dep.clone());
        }
      }
    }

    for (level, parent) in hierarchy.iter().enumerate() {
      let children = edges.entry(parent.clone()).or_default();
      for lower in &hierarchy[level + 1..] {
        if !children.contains(lower) {
          children.push(lower.clone());
        }
      }
    }

    let graph = CascadeGraph { edges, priority };
    graph.check_acyclic()?;
    Ok(graph)
  }

  fn check_acyclic(&self) -> Result<(), ConfigError> {
    // 0 = sin visitar, 1 = en pila, 2 = terminado
    let mut state: IndexMap<&str, u8> = self.edges.keys().map(|k| (k.as_str(), 0u8)).collect();
    for start in self.edges.keys() {
      if state.get(start.as_str()).copied() == Some(0) {
        let mut path = Vec::new();
        self.visit(start, &mut state, &mut path)?;
      }
    }
    Ok(())
  }

  fn visit<'a>(&'a self,
               node: &'a str,
               state: &mut IndexMap<&'a str, u8>,
               path: &mut Vec<&'a str>)
               -> Result<(), ConfigError> {
    state.insert(node, 1);
    path.push(node);
    for child in self.children(node) {
      match state.get(child.as_str()).copied().unwrap_or(0) {
        1 => {
          path.push(child);
          return Err(ConfigError::CascadeCycle(path.join(" -> ")));
        }
        0 => self.visit(child, state, path)?,
        _ => {}
      }
    }
    path.pop();
    state.insert(node, 2);
    Ok(())
  }

  pub fn children(&self, parent: &str) -> &[String] {
    self.edges.get(parent).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Todas las relaciones que deben vaciarse al cambiar `parent`: primero
  /// los niveles de la jerarquía de arriba abajo, luego el resto en orden
  /// de recorrido en anchura.
  pub fn dependents_of(&self, parent: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(parent);
    let mut queue: VecDeque<&str> = VecDeque::from([parent]);
    while let Some(current) = queue.pop_front() {
      for child in self.children(current) {
        if seen.insert(child.as_str()) {
          out.push(child.clone());
          queue.push_back(child.as_str());
        }
      }
    }
    out.sort_by_key(|name| self.priority(name));
    out
  }

  /// Posición en la jerarquía; las relaciones fuera de ella tienen la
  /// menor prioridad (valor más alto).
  pub fn priority(&self, name: &str) -> usize {
    self.priority.get(name).copied().unwrap_or(self.priority.len())
  }
}
