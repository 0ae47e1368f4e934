//! # OpenSilicon Core
//!
//! Board database for the OpenSilicon PCB tools: layer stack, nets and net
//! classes, placed items (tracks, vias, pads, zones, footprints), geometry
//! primitives, R-tree spatial indexing and connectivity.
//!
//! Design rule checking consumes this crate read-only.

pub mod geometry;
pub mod layer;
pub mod item;
pub mod footprint;
pub mod board;
pub mod spatial;
pub mod connectivity;

pub use board::{Board, BoardError, Net, NetClass, DEFAULT_NETCLASS};
pub use connectivity::{Connectivity, RatsnestEdge};
pub use footprint::{Footprint, Transform};
pub use geometry::{mm, mil, to_mm, BBox, Point, Shape};
pub use item::{BoardItem, ItemId, ItemKind, ItemType, NetCode, Pad, PadShape, Track, Via, Zone};
pub use layer::{Layer, LayerId, LayerKind, LayerStack};
pub use spatial::SpatialIndex;
