use serde::{Deserialize, Serialize};

/// A unique layer identifier within a board's layer stack.
pub type LayerId = u32;

/// What a layer physically is, which decides the checks that apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Copper,
    Courtyard,
    EdgeCuts,
    Silkscreen,
    Other,
}

/// Represents a board layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    /// Disabled layers are kept in the stack but ignored by checks.
    pub enabled: bool,
    pub description: String,
}

impl Layer {
    pub fn new(id: LayerId, name: &str, kind: LayerKind) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            enabled: true,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_copper(&self) -> bool {
        self.kind == LayerKind::Copper
    }
}

/// The ordered collection of layers of a board, top to bottom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// The usual two copper layer stack: F.Cu, B.Cu, both courtyards and the board edge.
    pub fn two_layer() -> Self {
        let mut stack = Self::new();
        stack.add_layer(Layer::new(0, "F.Cu", LayerKind::Copper));
        stack.add_layer(Layer::new(31, "B.Cu", LayerKind::Copper));
        stack.add_layer(Layer::new(40, "F.Courtyard", LayerKind::Courtyard));
        stack.add_layer(Layer::new(41, "B.Courtyard", LayerKind::Courtyard));
        stack.add_layer(Layer::new(44, "Edge.Cuts", LayerKind::EdgeCuts));
        stack
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn get_layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn get_layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name.eq_ignore_ascii_case(name))
    }

    pub fn layer_name(&self, id: LayerId) -> &str {
        self.get_layer(id).map(|l| l.name.as_str()).unwrap_or("?")
    }

    pub fn is_enabled(&self, id: LayerId) -> bool {
        self.get_layer(id).is_some_and(|l| l.enabled)
    }

    pub fn copper_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.is_copper())
    }

    /// Copper layers strictly between the outermost two.
    pub fn is_inner_copper(&self, id: LayerId) -> bool {
        let copper: Vec<LayerId> = self.copper_layers().map(|l| l.id).collect();
        copper.len() > 2 && copper[1..copper.len() - 1].contains(&id)
    }

    pub fn is_outer_copper(&self, id: LayerId) -> bool {
        let mut copper = self.copper_layers().map(|l| l.id);
        let first = copper.next();
        let last = copper.last().or(first);
        Some(id) == first || Some(id) == last
    }

    /// The courtyard layer on the same side as the given copper layer.
    pub fn courtyard_for(&self, copper: LayerId) -> Option<LayerId> {
        let mut courtyards = self.layers.iter().filter(|l| l.kind == LayerKind::Courtyard);
        let front = courtyards.next().map(|l| l.id);
        let back = courtyards.next().map(|l| l.id).or(front);
        let first_copper = self.copper_layers().next().map(|l| l.id);
        if Some(copper) == first_copper {
            front
        } else {
            back
        }
    }

    pub fn edge_layer(&self) -> Option<LayerId> {
        self.layers
            .iter()
            .find(|l| l.kind == LayerKind::EdgeCuts)
            .map(|l| l.id)
    }

    pub fn all_layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn set_enabled(&mut self, id: LayerId, enabled: bool) {
        if let Some(layer) = self.get_layer_mut(id) {
            layer.enabled = enabled;
        }
    }
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_layer_stack() {
        let stack = LayerStack::two_layer();
        assert_eq!(stack.copper_layers().count(), 2);
        assert!(stack.is_outer_copper(0));
        assert!(stack.is_outer_copper(31));
        assert!(!stack.is_inner_copper(0));
        assert_eq!(stack.get_layer_by_name("f.cu").map(|l| l.id), Some(0));
        assert_eq!(stack.courtyard_for(31), Some(41));
    }

    #[test]
    fn test_inner_layers() {
        let mut stack = LayerStack::new();
        stack.add_layer(Layer::new(0, "F.Cu", LayerKind::Copper));
        stack.add_layer(Layer::new(1, "In1.Cu", LayerKind::Copper));
        stack.add_layer(Layer::new(31, "B.Cu", LayerKind::Copper));
        assert!(stack.is_inner_copper(1));
        assert!(!stack.is_outer_copper(1));
    }

    #[test]
    fn test_disable_layer() {
        let mut stack = LayerStack::two_layer();
        stack.set_enabled(31, false);
        assert!(!stack.is_enabled(31));
        assert!(stack.is_enabled(0));
    }
}
