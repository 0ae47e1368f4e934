//! R-tree over board item bounding boxes, for neighbour searches in checks.
//!
//! Queries return indices into [`Board::items`]. Each entry remembers the
//! layers its item occupies so a search can be narrowed to one layer
//! without touching the item.

use rstar::{RTree, RTreeObject, AABB};

use crate::board::Board;
use crate::geometry::{BBox, Point};
use crate::item::BoardItem;
use crate::layer::LayerId;

struct IndexedItem {
    index: usize,
    envelope: AABB<[f64; 2]>,
    layers: Vec<LayerId>,
}

impl RTreeObject for IndexedItem {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope_of(bbox: &BBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min.x, bbox.min.y], [bbox.max.x, bbox.max.y])
}

pub struct SpatialIndex {
    tree: RTree<IndexedItem>,
}

impl SpatialIndex {
    /// Index every board item accepted by `filter` that has a bounding box.
    pub fn from_board(board: &Board, filter: impl Fn(&BoardItem) -> bool) -> Self {
        let entries = board
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| filter(item))
            .filter_map(|(index, item)| {
                item.bbox().map(|bbox| IndexedItem {
                    index,
                    envelope: envelope_of(&bbox),
                    layers: item.layers(),
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Items whose bounding box intersects `region`.
    pub fn near<'a>(&'a self, region: &BBox) -> impl Iterator<Item = usize> + 'a {
        self.tree
            .locate_in_envelope_intersecting(&envelope_of(region))
            .map(|entry| entry.index)
    }

    /// Items on `layer` whose bounding box intersects `region`.
    pub fn near_on_layer<'a>(&'a self, region: &BBox, layer: LayerId) -> impl Iterator<Item = usize> + 'a {
        self.tree
            .locate_in_envelope_intersecting(&envelope_of(region))
            .filter(move |entry| entry.layers.contains(&layer))
            .map(|entry| entry.index)
    }

    /// Items on `layer` whose bounding box contains `point`.
    pub fn at_point<'a>(&'a self, point: &Point, layer: LayerId) -> impl Iterator<Item = usize> + 'a {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([point.x, point.y]))
            .filter(move |entry| entry.layers.contains(&layer))
            .map(|entry| entry.index)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
