use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::geometry::{mm, Point};
use crate::item::{BoardItem, ItemId, ItemType, NetCode};
use crate::layer::{LayerId, LayerStack};

/// Name of the net class every net falls back to.
pub const DEFAULT_NETCLASS: &str = "Default";

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Item {0} is already on the board")]
    DuplicateItem(ItemId),

    #[error("Item references unknown layer {0}")]
    UnknownLayer(LayerId),

    #[error("Item references unknown net code {0}")]
    UnknownNet(NetCode),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    pub code: NetCode,
    pub name: String,
    /// `None` means the default class.
    pub netclass: Option<String>,
}

/// Per-class routing settings. These become implicit design rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetClass {
    pub name: String,
    pub clearance: f64,
    pub track_width: f64,
    pub via_diameter: f64,
    pub via_drill: f64,
}

impl NetClass {
    pub fn new(name: &str, clearance: f64, track_width: f64) -> Self {
        Self {
            name: name.to_string(),
            clearance,
            track_width,
            via_diameter: mm(0.6),
            via_drill: mm(0.3),
        }
    }
}

impl Default for NetClass {
    fn default() -> Self {
        Self::new(DEFAULT_NETCLASS, mm(0.2), mm(0.25))
    }
}

/// The design database: layers, nets, net classes and every placed item.
#[derive(Debug, Serialize, Deserialize)]
pub struct Board {
    /// Board identifier.
    pub id: Uuid,
    pub name: String,
    pub layer_stack: LayerStack,
    nets: Vec<Net>,
    net_classes: Vec<NetClass>,
    items: Vec<BoardItem>,
    /// Board edge outline, used for copper-to-edge checks.
    pub outline: Option<Vec<Point>>,
    #[serde(skip)]
    index: HashMap<ItemId, usize>,
}

impl Board {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            layer_stack: LayerStack::two_layer(),
            nets: Vec::new(),
            net_classes: vec![NetClass::default()],
            items: Vec::new(),
            outline: None,
            index: HashMap::new(),
        }
    }

    // ── Nets ─────────────────────────────────────────────────────────

    /// Add a net and return its code. Codes start at 1.
    pub fn add_net(&mut self, name: &str, netclass: Option<&str>) -> NetCode {
        let code = self.nets.len() as NetCode + 1;
        self.nets.push(Net {
            code,
            name: name.to_string(),
            netclass: netclass.map(str::to_string),
        });
        code
    }

    pub fn net(&self, code: NetCode) -> Option<&Net> {
        code.checked_sub(1).and_then(|i| self.nets.get(i as usize))
    }

    pub fn net_name(&self, code: Option<NetCode>) -> &str {
        code.and_then(|c| self.net(c)).map(|n| n.name.as_str()).unwrap_or("")
    }

    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    // ── Net classes ──────────────────────────────────────────────────

    /// Add or replace a net class.
    pub fn set_net_class(&mut self, class: NetClass) {
        match self.net_classes.iter_mut().find(|c| c.name == class.name) {
            Some(existing) => *existing = class,
            None => self.net_classes.push(class),
        }
    }

    pub fn net_classes(&self) -> &[NetClass] {
        &self.net_classes
    }

    pub fn net_class(&self, name: &str) -> Option<&NetClass> {
        self.net_classes.iter().find(|c| c.name == name)
    }

    /// Net class name of an item; unconnected items belong to the default class.
    pub fn net_class_name(&self, item: &BoardItem) -> &str {
        item.net
            .and_then(|c| self.net(c))
            .and_then(|n| n.netclass.as_deref())
            .unwrap_or(DEFAULT_NETCLASS)
    }

    // ── Items ────────────────────────────────────────────────────────

    pub fn add_item(&mut self, item: BoardItem) -> Result<ItemId, BoardError> {
        if self.index.contains_key(&item.id) {
            return Err(BoardError::DuplicateItem(item.id));
        }
        if let Some(layer) = item.layers().into_iter().find(|l| self.layer_stack.get_layer(*l).is_none()) {
            return Err(BoardError::UnknownLayer(layer));
        }
        if let Some(code) = item.net.filter(|c| self.net(*c).is_none()) {
            return Err(BoardError::UnknownNet(code));
        }
        let id = item.id;
        self.index.insert(id, self.items.len());
        self.items.push(item);
        Ok(id)
    }

    pub fn item(&self, id: &ItemId) -> Option<&BoardItem> {
        self.index.get(id).and_then(|&i| self.items.get(i))
    }

    pub fn items(&self) -> &[BoardItem] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn items_of_type(&self, item_type: ItemType) -> impl Iterator<Item = &BoardItem> {
        self.items.iter().filter(move |i| i.item_type() == item_type)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &BoardItem> {
        self.items_of_type(ItemType::Track)
    }

    pub fn vias(&self) -> impl Iterator<Item = &BoardItem> {
        self.items_of_type(ItemType::Via)
    }

    pub fn pads(&self) -> impl Iterator<Item = &BoardItem> {
        self.items_of_type(ItemType::Pad)
    }

    pub fn footprints(&self) -> impl Iterator<Item = &BoardItem> {
        self.items_of_type(ItemType::Footprint)
    }

    /// Reference designator of the footprint owning `item` (or of `item` itself).
    pub fn reference_of<'a>(&'a self, item: &'a BoardItem) -> Option<&'a str> {
        if let Some(fp) = item.as_footprint() {
            return Some(fp.reference.as_str());
        }
        item.parent
            .and_then(|p| self.item(&p))
            .and_then(|p| p.as_footprint())
            .map(|fp| fp.reference.as_str())
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut board: Board = serde_json::from_str(json)?;
        board.rebuild_index();
        Ok(board)
    }

    /// Rebuild the id lookup after deserialization.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id, i))
            .collect();
    }
}
