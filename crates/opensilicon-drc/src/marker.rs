use std::collections::HashMap;

use indexmap::IndexMap;
use opensilicon_core::LayerId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::settings::DrcSettings;
use crate::violation::{DrcItem, ErrorCode, Severity};

/// A violation stored with the design document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: Uuid,
    pub item: DrcItem,
    #[serde(default)]
    pub excluded: bool,
}

impl Marker {
    pub fn new(item: DrcItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            item,
            excluded: false,
        }
    }

    /// Severity shown to the user: exclusions win, then a per-code override
    /// from the settings, then the severity recorded when the marker was made.
    pub fn effective_severity(&self, settings: &DrcSettings) -> Severity {
        if self.excluded {
            return Severity::Exclusion;
        }
        settings
            .severity_override(self.item.error_code)
            .unwrap_or(self.item.severity)
    }
}

/// Exact part of [`DrcItem::same_violation`]; locations are compared within each bucket.
type ViolationKey = (ErrorCode, Vec<Uuid>, Option<LayerId>);

fn violation_key(item: &DrcItem) -> ViolationKey {
    let mut ids = item.items.clone();
    ids.sort();
    (item.error_code, ids, item.layer)
}

/// The board's marker list, in insertion order. Marker ids are unique within it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Marker>", into = "Vec<Marker>")]
pub struct MarkerList {
    markers: IndexMap<Uuid, Marker>,
}

impl TryFrom<Vec<Marker>> for MarkerList {
    type Error = String;

    fn try_from(markers: Vec<Marker>) -> Result<Self, Self::Error> {
        let mut list = MarkerList::default();
        for marker in markers {
            let id = marker.id;
            if !list.insert(marker) {
                return Err(format!("duplicate marker id {id}"));
            }
        }
        Ok(list)
    }
}

impl From<MarkerList> for Vec<Marker> {
    fn from(list: MarkerList) -> Self {
        list.markers.into_values().collect()
    }
}

impl MarkerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a marker. Returns `false` (and drops it) if its id is already present.
    pub fn insert(&mut self, marker: Marker) -> bool {
        if self.markers.contains_key(&marker.id) {
            return false;
        }
        self.markers.insert(marker.id, marker);
        true
    }

    /// Insert `marker`, or replace in place the marker that already has its id.
    pub fn upsert(&mut self, marker: Marker) {
        self.markers.insert(marker.id, marker);
    }

    pub fn get(&self, id: &Uuid) -> Option<&Marker> {
        self.markers.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Marker> {
        self.markers.get_mut(id)
    }

    /// Remove a marker, keeping the order of the rest.
    pub fn remove(&mut self, id: &Uuid) -> Option<Marker> {
        self.markers.shift_remove(id)
    }

    pub fn set_excluded(&mut self, id: &Uuid, excluded: bool) -> bool {
        match self.get_mut(id) {
            Some(marker) => {
                marker.excluded = excluded;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// Replace the markers with the results of a fresh run.
    ///
    /// A new violation matching an excluded marker inherits that marker's id
    /// and exclusion, so user exclusions survive re-running DRC.
    pub fn replace_with_run(&mut self, items: impl IntoIterator<Item = DrcItem>) {
        let mut excluded: HashMap<ViolationKey, Vec<Marker>> = HashMap::new();
        for marker in std::mem::take(&mut self.markers).into_values() {
            if marker.excluded {
                excluded.entry(violation_key(&marker.item)).or_default().push(marker);
            }
        }
        for item in items {
            let inherited = excluded.get_mut(&violation_key(&item)).and_then(|bucket| {
                let pos = bucket.iter().position(|m| m.item.same_violation(&item))?;
                Some(bucket.remove(pos))
            });
            let marker = match inherited {
                Some(old) => Marker {
                    id: old.id,
                    item,
                    excluded: true,
                },
                None => Marker::new(item),
            };
            self.upsert(marker);
        }
    }
}
