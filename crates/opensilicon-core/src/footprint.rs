use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, Point};
use crate::LayerId;

/// Placement of a footprint on the board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation offset.
    pub offset: Point,
    /// Rotation in degrees, counter-clockwise.
    pub rotation: f64,
    /// Mirrored about the X axis (footprint flipped to the back side).
    pub mirror_x: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset: Point::new(0.0, 0.0),
            rotation: 0.0,
            mirror_x: false,
        }
    }
}

impl Transform {
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            offset: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn apply(&self, point: &Point) -> Point {
        let mut p = *point;

        if self.mirror_x {
            p.y = -p.y;
        }

        let rad = self.rotation.to_radians();
        let cos_r = rad.cos();
        let sin_r = rad.sin();
        let rx = p.x * cos_r - p.y * sin_r;
        let ry = p.x * sin_r + p.y * cos_r;

        Point::new(rx + self.offset.x, ry + self.offset.y)
    }
}

/// A placed component. Pads are separate board items whose `parent` is the footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// Reference designator, e.g. `U1`.
    pub reference: String,
    pub value: String,
    pub transform: Transform,
    /// Courtyard outline in footprint-local coordinates.
    pub courtyard: Option<Vec<Point>>,
    /// Courtyard layer matching the side the footprint is placed on.
    pub courtyard_layer: LayerId,
}

impl Footprint {
    pub fn new(reference: &str, courtyard_layer: LayerId, transform: Transform) -> Self {
        Self {
            reference: reference.to_string(),
            value: String::new(),
            transform,
            courtyard: None,
            courtyard_layer,
        }
    }

    /// Attach a rectangular courtyard of `width` x `height` centred on the origin.
    pub fn with_rect_courtyard(mut self, width: f64, height: f64) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        self.courtyard = Some(vec![
            Point::new(-hw, -hh),
            Point::new(hw, -hh),
            Point::new(hw, hh),
            Point::new(-hw, hh),
        ]);
        self
    }

    pub fn position(&self) -> Point {
        self.transform.offset
    }

    /// Courtyard outline in board coordinates.
    pub fn courtyard_outline(&self) -> Option<Vec<Point>> {
        self.courtyard
            .as_ref()
            .filter(|outline| outline.len() >= 3)
            .map(|outline| outline.iter().map(|p| self.transform.apply(p)).collect())
    }

    pub fn courtyard_bbox(&self) -> Option<BBox> {
        self.courtyard_outline().and_then(|o| BBox::from_points(&o))
    }
}
