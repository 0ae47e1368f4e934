//! Filtered, severity-aware views over stored violations, used by violation
//! browsers.
//!
//! Each adapter keeps an authoritative store and a filtered view rebuilt by
//! [`RcItemsProvider::set_severities`]. Indices passed to `item` and
//! `delete_item` refer to the filtered view.

use std::ops::BitOr;

use opensilicon_core::{Board, Connectivity};
use uuid::Uuid;

use crate::marker::MarkerList;
use crate::provider::unconnected_item;
use crate::settings::DrcSettings;
use crate::violation::{DrcItem, ErrorCode, Severity};

/// Set of severities shown by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeverityMask(u8);

impl SeverityMask {
    pub const NONE: SeverityMask = SeverityMask(0);
    pub const ERRORS: SeverityMask = SeverityMask(1);
    pub const WARNINGS: SeverityMask = SeverityMask(1 << 1);
    pub const EXCLUSIONS: SeverityMask = SeverityMask(1 << 2);
    pub const ALL: SeverityMask = SeverityMask(0b111);

    pub fn of(severity: Severity) -> SeverityMask {
        match severity {
            Severity::Error => Self::ERRORS,
            Severity::Warning => Self::WARNINGS,
            Severity::Exclusion => Self::EXCLUSIONS,
            Severity::Ignore => Self::NONE,
        }
    }

    pub fn contains(self, severity: Severity) -> bool {
        let bit = Self::of(severity).0;
        bit != 0 && self.0 & bit == bit
    }
}

impl BitOr for SeverityMask {
    type Output = SeverityMask;

    fn bitor(self, rhs: SeverityMask) -> SeverityMask {
        SeverityMask(self.0 | rhs.0)
    }
}

pub trait RcItemsProvider {
    /// Rebuild the filtered view to hold the items whose severity is in `mask`.
    fn set_severities(&mut self, mask: SeverityMask);

    /// Size of the filtered view, or with `Some(severity)` the number of
    /// stored items of that severity whether shown or not.
    fn count(&self, severity: Option<Severity>) -> usize;

    /// Item `index` of the filtered view, with its effective severity.
    fn item(&self, index: usize) -> Option<DrcItem>;

    /// Drop item `index` from the view; with `deep` also from the store.
    fn delete_item(&mut self, index: usize, deep: bool);

    /// Empty both the view and the store.
    fn delete_all_items(&mut self);
}

// ── Board markers ────────────────────────────────────────────────────

/// View over the markers stored with a board.
pub struct BoardMarkersProvider<'a> {
    markers: &'a mut MarkerList,
    settings: &'a DrcSettings,
    mask: SeverityMask,
    filtered: Vec<Uuid>,
}

impl<'a> BoardMarkersProvider<'a> {
    pub fn new(markers: &'a mut MarkerList, settings: &'a DrcSettings) -> Self {
        Self {
            markers,
            settings,
            mask: SeverityMask::NONE,
            filtered: Vec::new(),
        }
    }

    pub fn mask(&self) -> SeverityMask {
        self.mask
    }
}

impl RcItemsProvider for BoardMarkersProvider<'_> {
    fn set_severities(&mut self, mask: SeverityMask) {
        self.mask = mask;
        self.filtered = self
            .markers
            .iter()
            .filter(|m| mask.contains(m.effective_severity(self.settings)))
            .map(|m| m.id)
            .collect();
    }

    fn count(&self, severity: Option<Severity>) -> usize {
        match severity {
            None => self.filtered.len(),
            Some(s) => self
                .markers
                .iter()
                .filter(|m| m.effective_severity(self.settings) == s)
                .count(),
        }
    }

    fn item(&self, index: usize) -> Option<DrcItem> {
        let marker = self.markers.get(self.filtered.get(index)?)?;
        let severity = marker.effective_severity(self.settings);
        Some(marker.item.clone().with_severity(severity))
    }

    fn delete_item(&mut self, index: usize, deep: bool) {
        if index >= self.filtered.len() {
            return;
        }
        let id = self.filtered.remove(index);
        if deep {
            self.markers.remove(&id);
        }
    }

    fn delete_all_items(&mut self) {
        self.markers.clear();
        self.filtered.clear();
    }
}

// ── Plain vector ─────────────────────────────────────────────────────

/// View over an owned list of violations, such as a report being browsed.
#[derive(Debug, Default)]
pub struct VectorItemsProvider {
    items: Vec<DrcItem>,
    filtered: Vec<usize>,
}

impl VectorItemsProvider {
    pub fn new(items: Vec<DrcItem>) -> Self {
        Self {
            items,
            filtered: Vec::new(),
        }
    }

    pub fn items(&self) -> &[DrcItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<DrcItem> {
        self.items
    }
}

impl RcItemsProvider for VectorItemsProvider {
    fn set_severities(&mut self, mask: SeverityMask) {
        self.filtered = (0..self.items.len())
            .filter(|&i| mask.contains(self.items[i].severity))
            .collect();
    }

    fn count(&self, severity: Option<Severity>) -> usize {
        match severity {
            None => self.filtered.len(),
            Some(s) => self.items.iter().filter(|i| i.severity == s).count(),
        }
    }

    fn item(&self, index: usize) -> Option<DrcItem> {
        self.filtered.get(index).map(|&i| self.items[i].clone())
    }

    fn delete_item(&mut self, index: usize, deep: bool) {
        if index >= self.filtered.len() {
            return;
        }
        let removed = self.filtered.remove(index);
        if deep {
            self.items.remove(removed);
            for i in &mut self.filtered {
                if *i > removed {
                    *i -= 1;
                }
            }
        }
    }

    fn delete_all_items(&mut self) {
        self.items.clear();
        self.filtered.clear();
    }
}

// ── Ratsnest ─────────────────────────────────────────────────────────

/// View over the unconnected-items violations derived from connectivity.
///
/// A ratsnest edge cannot be removed without editing copper, so a deep
/// delete only marks the item deleted for the life of this provider. The next
/// connectivity rebuild reports it again.
#[derive(Debug, Default)]
pub struct RatsnestItemsProvider {
    items: Vec<DrcItem>,
    deleted: Vec<bool>,
    filtered: Vec<usize>,
}

impl RatsnestItemsProvider {
    pub fn new(board: &Board, settings: &DrcSettings) -> Self {
        let severity = settings.severity(ErrorCode::UnconnectedItems);
        let items: Vec<DrcItem> = Connectivity::build(board)
            .ratsnest(board)
            .iter()
            .map(|edge| unconnected_item(board, edge, severity))
            .collect();
        Self::from_items(items)
    }

    pub fn from_items(items: Vec<DrcItem>) -> Self {
        let deleted = vec![false; items.len()];
        Self {
            items,
            deleted,
            filtered: Vec::new(),
        }
    }

    fn live(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.items.len()).filter(|&i| !self.deleted[i])
    }
}

impl RcItemsProvider for RatsnestItemsProvider {
    fn set_severities(&mut self, mask: SeverityMask) {
        self.filtered = self.live().filter(|&i| mask.contains(self.items[i].severity)).collect();
    }

    fn count(&self, severity: Option<Severity>) -> usize {
        match severity {
            None => self.filtered.len(),
            Some(s) => self.live().filter(|&i| self.items[i].severity == s).count(),
        }
    }

    fn item(&self, index: usize) -> Option<DrcItem> {
        self.filtered.get(index).map(|&i| self.items[i].clone())
    }

    fn delete_item(&mut self, index: usize, deep: bool) {
        if index >= self.filtered.len() {
            return;
        }
        let removed = self.filtered.remove(index);
        if deep {
            log::debug!("Ratsnest item {removed} hidden; the board is unchanged");
            self.deleted[removed] = true;
        }
    }

    fn delete_all_items(&mut self) {
        self.deleted.iter_mut().for_each(|d| *d = true);
        self.filtered.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;
    use opensilicon_core::{mm, BoardItem, Point};

    fn sample() -> Vec<DrcItem> {
        vec![
            DrcItem::new(ErrorCode::Clearance).with_severity(Severity::Error),
            DrcItem::new(ErrorCode::TrackAngle).with_severity(Severity::Warning),
            DrcItem::new(ErrorCode::TrackWidth).with_severity(Severity::Error),
        ]
    }

    #[test]
    fn test_mask_membership() {
        let mask = SeverityMask::ERRORS | SeverityMask::EXCLUSIONS;
        assert!(mask.contains(Severity::Error));
        assert!(mask.contains(Severity::Exclusion));
        assert!(!mask.contains(Severity::Warning));
        assert!(!SeverityMask::ALL.contains(Severity::Ignore));
    }

    #[test]
    fn test_vector_filter_and_count() {
        let mut provider = VectorItemsProvider::new(sample());
        provider.set_severities(SeverityMask::ERRORS);
        assert_eq!(provider.count(None), 2);
        assert_eq!(provider.count(Some(Severity::Warning)), 1);
        assert_eq!(provider.item(1).unwrap().error_code, ErrorCode::TrackWidth);
        assert!(provider.item(2).is_none());
    }

    #[test]
    fn test_vector_shallow_delete_keeps_store() {
        let mut provider = VectorItemsProvider::new(sample());
        provider.set_severities(SeverityMask::ALL);
        provider.delete_item(0, false);
        assert_eq!(provider.count(None), 2);
        provider.set_severities(SeverityMask::ALL);
        assert_eq!(provider.count(None), 3);
    }

    #[test]
    fn test_vector_deep_delete() {
        let mut provider = VectorItemsProvider::new(sample());
        provider.set_severities(SeverityMask::ERRORS);
        provider.delete_item(0, true);
        assert_eq!(provider.count(None), 1);
        assert_eq!(provider.item(0).unwrap().error_code, ErrorCode::TrackWidth);

        provider.set_severities(SeverityMask::ALL);
        assert_eq!(provider.count(None), 2);
        assert!(provider.items().iter().all(|i| i.error_code != ErrorCode::Clearance));
    }

    #[test]
    fn test_board_markers_use_effective_severity() {
        let mut markers = MarkerList::new();
        for item in sample() {
            markers.insert(Marker::new(item));
        }
        let excluded = markers.iter().next().unwrap().id;
        markers.set_excluded(&excluded, true);
        let mut settings = DrcSettings::default();
        settings.set_severity(ErrorCode::TrackAngle, Severity::Error);

        let mut provider = BoardMarkersProvider::new(&mut markers, &settings);
        provider.set_severities(SeverityMask::ERRORS);
        assert_eq!(provider.count(None), 2);
        assert_eq!(provider.count(Some(Severity::Exclusion)), 1);
        assert_eq!(provider.item(0).unwrap().error_code, ErrorCode::TrackAngle);
        assert_eq!(provider.item(0).unwrap().severity, Severity::Error);
    }

    #[test]
    fn test_board_markers_deep_delete() {
        let mut markers = MarkerList::new();
        for item in sample() {
            markers.insert(Marker::new(item));
        }
        let settings = DrcSettings::default();
        {
            let mut provider = BoardMarkersProvider::new(&mut markers, &settings);
            provider.set_severities(SeverityMask::ALL);
            provider.delete_item(1, true);
            assert_eq!(provider.count(None), 2);
            provider.set_severities(SeverityMask::ALL);
            assert_eq!(provider.count(None), 2);
            assert_eq!(provider.count(Some(Severity::Warning)), 0);
        }
        assert_eq!(markers.len(), 2);
    }

    #[test]
    fn test_ratsnest_deep_delete_is_logical() {
        let mut board = Board::new("t");
        let net = board.add_net("SIG", None);
        for x in [0.0, 10.0, 20.0] {
            board
                .add_item(BoardItem::smd_pad("1", 0, Point::new(mm(x), 0.0), mm(1.0), mm(1.0)).with_net(net))
                .unwrap();
        }
        let mut provider = RatsnestItemsProvider::new(&board, &DrcSettings::default());
        provider.set_severities(SeverityMask::ALL);
        assert_eq!(provider.count(None), 2);
        assert!(provider.item(0).unwrap().detail.contains("SIG"));

        provider.delete_item(0, true);
        provider.set_severities(SeverityMask::ALL);
        assert_eq!(provider.count(None), 1);

        // The board still has the missing connection.
        let fresh = RatsnestItemsProvider::new(&board, &DrcSettings::default());
        assert_eq!(fresh.count(Some(Severity::Error)), 2);
    }
}
