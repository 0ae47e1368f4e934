use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::footprint::Footprint;
use crate::geometry::{BBox, Point, Shape};
use crate::LayerId;

/// Stable identifier of a board item.
pub type ItemId = Uuid;

/// Index into the board's net table. Code 0 is "no net".
pub type NetCode = u32;

/// A straight copper segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub start: Point,
    pub end: Point,
    pub width: f64,
    pub layer: LayerId,
}

impl Track {
    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub fn is_degenerate(&self) -> bool {
        self.length() == 0.0
    }
}

/// A plated hole joining copper on several layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Via {
    pub position: Point,
    pub diameter: f64,
    pub drill: f64,
    /// Copper layers the via has an annulus on.
    pub layers: Vec<LayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadShape {
    Circle,
    Rect,
}

/// A footprint pad. Through-hole pads carry a drill and span several copper layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pad {
    pub number: String,
    pub position: Point,
    pub size_x: f64,
    pub size_y: f64,
    pub shape: PadShape,
    pub drill: Option<f64>,
    pub plated: bool,
    pub layers: Vec<LayerId>,
}

/// A copper pour bounded by an outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub outline: Vec<Point>,
    pub layer: LayerId,
}

/// Coarse item category, used by rule conditions and `disallow` constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemType {
    Track,
    Via,
    Pad,
    Zone,
    Footprint,
}

impl ItemType {
    pub const ALL: [ItemType; 5] = [
        ItemType::Track,
        ItemType::Via,
        ItemType::Pad,
        ItemType::Zone,
        ItemType::Footprint,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ItemType::Track => "Track",
            ItemType::Via => "Via",
            ItemType::Pad => "Pad",
            ItemType::Zone => "Zone",
            ItemType::Footprint => "Footprint",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    Track(Track),
    Via(Via),
    Pad(Pad),
    Zone(Zone),
    Footprint(Footprint),
}

/// Anything placed on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub net: Option<NetCode>,
    /// Owning footprint for pads.
    pub parent: Option<ItemId>,
}

impl BoardItem {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            net: None,
            parent: None,
        }
    }

    pub fn track(layer: LayerId, start: Point, end: Point, width: f64) -> Self {
        Self::new(ItemKind::Track(Track {
            start,
            end,
            width,
            layer,
        }))
    }

    pub fn via(position: Point, diameter: f64, drill: f64, layers: Vec<LayerId>) -> Self {
        Self::new(ItemKind::Via(Via {
            position,
            diameter,
            drill,
            layers,
        }))
    }

    pub fn smd_pad(number: &str, layer: LayerId, position: Point, size_x: f64, size_y: f64) -> Self {
        Self::new(ItemKind::Pad(Pad {
            number: number.to_string(),
            position,
            size_x,
            size_y,
            shape: PadShape::Rect,
            drill: None,
            plated: false,
            layers: vec![layer],
        }))
    }

    pub fn zone(name: &str, layer: LayerId, outline: Vec<Point>) -> Self {
        Self::new(ItemKind::Zone(Zone {
            name: name.to_string(),
            outline,
            layer,
        }))
    }

    pub fn footprint(footprint: Footprint) -> Self {
        Self::new(ItemKind::Footprint(footprint))
    }

    pub fn with_net(mut self, net: NetCode) -> Self {
        self.net = if net == 0 { None } else { Some(net) };
        self
    }

    pub fn with_parent(mut self, parent: ItemId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn item_type(&self) -> ItemType {
        match &self.kind {
            ItemKind::Track(_) => ItemType::Track,
            ItemKind::Via(_) => ItemType::Via,
            ItemKind::Pad(_) => ItemType::Pad,
            ItemKind::Zone(_) => ItemType::Zone,
            ItemKind::Footprint(_) => ItemType::Footprint,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.item_type().name()
    }

    pub fn as_track(&self) -> Option<&Track> {
        match &self.kind {
            ItemKind::Track(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_via(&self) -> Option<&Via> {
        match &self.kind {
            ItemKind::Via(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_footprint(&self) -> Option<&Footprint> {
        match &self.kind {
            ItemKind::Footprint(f) => Some(f),
            _ => None,
        }
    }

    pub fn layers(&self) -> Vec<LayerId> {
        match &self.kind {
            ItemKind::Track(t) => vec![t.layer],
            ItemKind::Via(v) => v.layers.clone(),
            ItemKind::Pad(p) => p.layers.clone(),
            ItemKind::Zone(z) => vec![z.layer],
            ItemKind::Footprint(f) => vec![f.courtyard_layer],
        }
    }

    pub fn is_on_layer(&self, layer: LayerId) -> bool {
        match &self.kind {
            ItemKind::Track(t) => t.layer == layer,
            ItemKind::Via(v) => v.layers.contains(&layer),
            ItemKind::Pad(p) => p.layers.contains(&layer),
            ItemKind::Zone(z) => z.layer == layer,
            ItemKind::Footprint(f) => f.courtyard_layer == layer,
        }
    }

    pub fn is_copper(&self) -> bool {
        !matches!(self.kind, ItemKind::Footprint(_))
    }

    /// Outline of the item on `layer`, or `None` if it has nothing there.
    pub fn shape_on_layer(&self, layer: LayerId) -> Option<Shape> {
        if !self.is_on_layer(layer) {
            return None;
        }
        match &self.kind {
            ItemKind::Track(t) => Some(Shape::Segment {
                start: t.start,
                end: t.end,
                width: t.width,
            }),
            ItemKind::Via(v) => Some(Shape::Circle {
                center: v.position,
                radius: v.diameter / 2.0,
            }),
            ItemKind::Pad(p) => Some(match p.shape {
                PadShape::Circle => Shape::Circle {
                    center: p.position,
                    radius: p.size_x.max(p.size_y) / 2.0,
                },
                PadShape::Rect => Shape::Rect {
                    bbox: BBox::new(
                        p.position.translate(-p.size_x / 2.0, -p.size_y / 2.0),
                        p.position.translate(p.size_x / 2.0, p.size_y / 2.0),
                    ),
                },
            }),
            ItemKind::Zone(z) => Some(Shape::Polygon {
                points: z.outline.clone(),
            }),
            ItemKind::Footprint(f) => f
                .courtyard_outline()
                .map(|points| Shape::Polygon { points }),
        }
    }

    /// The drilled hole, for vias and through-hole pads.
    pub fn hole(&self) -> Option<Shape> {
        match &self.kind {
            ItemKind::Via(v) => Some(Shape::Circle {
                center: v.position,
                radius: v.drill / 2.0,
            }),
            ItemKind::Pad(p) => p.drill.map(|d| Shape::Circle {
                center: p.position,
                radius: d / 2.0,
            }),
            _ => None,
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        self.layers()
            .into_iter()
            .filter_map(|l| self.shape_on_layer(l).and_then(|s| s.bbox()))
            .reduce(|a, b| a.union(&b))
    }

    /// A representative point used to anchor violation markers.
    pub fn anchor(&self) -> Point {
        match &self.kind {
            ItemKind::Track(t) => Point::new((t.start.x + t.end.x) / 2.0, (t.start.y + t.end.y) / 2.0),
            ItemKind::Via(v) => v.position,
            ItemKind::Pad(p) => p.position,
            ItemKind::Zone(z) => z.outline.first().copied().unwrap_or(Point::new(0.0, 0.0)),
            ItemKind::Footprint(f) => f.position(),
        }
    }

    pub fn width(&self) -> Option<f64> {
        self.as_track().map(|t| t.width)
    }

    pub fn diameter(&self) -> Option<f64> {
        match &self.kind {
            ItemKind::Via(v) => Some(v.diameter),
            ItemKind::Pad(p) if p.shape == PadShape::Circle => Some(p.size_x.max(p.size_y)),
            _ => None,
        }
    }

    pub fn drill(&self) -> Option<f64> {
        match &self.kind {
            ItemKind::Via(v) => Some(v.drill),
            ItemKind::Pad(p) => p.drill,
            _ => None,
        }
    }

    pub fn is_plated(&self) -> bool {
        match &self.kind {
            ItemKind::Via(_) => true,
            ItemKind::Pad(p) => p.drill.is_some() && p.plated,
            _ => false,
        }
    }
}
